//! End-to-end pool scenarios against a local keep-alive HTTP server.

use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use moblast::{BlasterPool, Destination, Outcome, PoolError, QpsMonitor};

/// Minimal HTTP/1.1 gateway that answers every request with 200 OK and keeps
/// the connection open, since blasters reuse one connection for their whole
/// lifetime.
struct MockGateway {
    url: String,
    stop: Arc<AtomicBool>,
    accept_thread: Option<thread::JoinHandle<()>>,
}

impl MockGateway {
    fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock gateway");
        let addr = listener.local_addr().expect("mock gateway addr");
        listener.set_nonblocking(true).expect("set_nonblocking");

        let stop = Arc::new(AtomicBool::new(false));
        let accept_stop = stop.clone();
        let accept_thread = thread::spawn(move || {
            while !accept_stop.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let stop = accept_stop.clone();
                        thread::spawn(move || serve_connection(stream, &stop));
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            url: format!("http://{addr}/driver-container/incomingMessages/USSybase1/sms"),
            stop,
            accept_thread: Some(accept_thread),
        }
    }

    fn destination(&self) -> Destination {
        Destination {
            url: self.url.clone(),
            shortcodes: vec![90001],
            messages: vec!["Hello".into(), "Ciao".into()],
        }
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.accept_thread.take() {
            drop(handle.join());
        }
    }
}

fn serve_connection(mut stream: TcpStream, stop: &AtomicBool) {
    // the listener is non-blocking; accepted sockets must not inherit that
    drop(stream.set_nonblocking(false));
    drop(stream.set_read_timeout(Some(Duration::from_millis(100))));
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !stop.load(Ordering::Relaxed) {
        if let Some(request_len) = full_request_len(&buf) {
            buf.drain(..request_len);
            if stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK").is_err() {
                return;
            }
            continue;
        }
        match stream.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) => {}
            Err(_) => return,
        }
    }
}

/// Length of the first complete request in `buf`, once fully received.
fn full_request_len(buf: &[u8]) -> Option<usize> {
    let headers_end = buf.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
    let headers = String::from_utf8_lossy(&buf[..headers_end]);
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    (buf.len() >= headers_end + content_length).then_some(headers_end + content_length)
}

async fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

#[tokio::test(flavor = "multi_thread")]
async fn blasters_send_and_record_outcomes() {
    let gateway = MockGateway::spawn();
    let monitor = Arc::new(QpsMonitor::new());
    let mut pool = BlasterPool::new([gateway.destination()], monitor.clone());

    pool.start(2);
    assert_eq!(pool.live(), 2);

    assert!(
        wait_until(Duration::from_secs(10), || monitor.total_hits() >= 2).await,
        "expected both blasters to record outcomes"
    );
    let stats = monitor.touch();
    assert!(
        stats
            .by_outcome
            .iter()
            .any(|(outcome, count)| *outcome == Outcome::Status(200) && *count >= 2),
        "expected 200 outcomes, got {:?}",
        stats.by_outcome
    );

    pool.shutdown().await;
    assert_eq!(pool.live(), 0);
    assert_eq!(monitor.total_hits(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_all_is_fire_and_forget() {
    let gateway = MockGateway::spawn();
    let monitor = Arc::new(QpsMonitor::new());
    let mut pool = BlasterPool::new([gateway.destination()], monitor.clone());

    pool.start(3);
    assert!(wait_until(Duration::from_secs(10), || monitor.total_hits() > 0).await);

    pool.stop_all();
    assert_eq!(pool.live(), 0);

    // workers observe the stop at the next loop head; traffic dies out shortly
    let mut settled = false;
    for _ in 0..50 {
        let before = monitor.total_hits();
        tokio::time::sleep(Duration::from_millis(100)).await;
        if monitor.total_hits() == before {
            settled = true;
            break;
        }
    }
    assert!(settled, "traffic should stop after stop_all");
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_stop_leaves_remainder_and_monitor_untouched() {
    let gateway = MockGateway::spawn();
    let monitor = Arc::new(QpsMonitor::new());
    let mut pool = BlasterPool::new([gateway.destination()], monitor.clone());

    pool.start(10);
    assert_eq!(pool.live(), 10);
    assert!(wait_until(Duration::from_secs(10), || monitor.total_hits() > 0).await);

    assert_eq!(
        pool.stop_some(11),
        Err(PoolError::NotEnoughBlasters { requested: 11, live: 10 })
    );
    assert_eq!(pool.live(), 10);

    let hits_before = monitor.total_hits();
    pool.stop_some(3).expect("enough blasters running");
    assert_eq!(pool.live(), 7);
    assert!(monitor.total_hits() >= hits_before, "partial stop must not reset the monitor");

    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_failures_are_recorded_not_fatal() {
    // grab a port with no listener behind it
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let monitor = Arc::new(QpsMonitor::new());
    let dest = Destination {
        url: format!("http://127.0.0.1:{port}/sms"),
        shortcodes: vec![90001],
        messages: vec!["Hello".into()],
    };
    let mut pool = BlasterPool::new([dest], monitor.clone());

    pool.start(1);
    // more than one recorded failure proves the worker survives errors
    assert!(
        wait_until(Duration::from_secs(10), || monitor.total_hits() >= 3).await,
        "expected the worker to keep looping through failures"
    );
    let stats = monitor.touch();
    assert!(
        stats
            .by_outcome
            .iter()
            .all(|(outcome, _)| matches!(outcome, Outcome::TransportError(_))),
        "expected only transport errors, got {:?}",
        stats.by_outcome
    );

    pool.shutdown().await;
}
