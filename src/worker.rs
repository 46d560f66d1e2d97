//! A single blaster: one task, one persistent connection, one destination.

use std::sync::Arc;

use reqwest::Client;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{config::Destination, monitor::QpsMonitor, outcome::Outcome, payload};

/// Form field carrying the XML document, as the gateway expects it.
const FORM_FIELD: &str = "XmlMsg";

/// Handle to one running blaster, owned by the pool. Cancelling the token is
/// the only cross-task signal into the worker; it is observed at the top of
/// the next send iteration, never mid-request.
pub(crate) struct Blaster {
    destination: Arc<Destination>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Blaster {
    /// Spawns the send loop. Non-blocking; the worker runs until
    /// [`stop`](Self::stop).
    pub(crate) fn spawn(id: u64, destination: Arc<Destination>, monitor: Arc<QpsMonitor>) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(id, destination.clone(), monitor, cancel.clone()));
        Self { destination, cancel, task }
    }

    /// Requests a cooperative stop: the worker finishes its in-flight
    /// request/response cycle and exits before starting the next one.
    pub(crate) fn stop(&self) {
        debug!(url = %self.destination.url, "stop requested");
        self.cancel.cancel();
    }

    /// Waits for the worker task to finish its final cycle and exit.
    pub(crate) async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}

async fn run(id: u64, dest: Arc<Destination>, monitor: Arc<QpsMonitor>, cancel: CancellationToken) {
    let client = match Client::builder().pool_max_idle_per_host(1).pool_idle_timeout(None).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(worker = id, error = %e, "failed to build http client");
            return;
        }
    };
    debug!(worker = id, url = %dest.url, "blaster started");

    while !cancel.is_cancelled() {
        let body = payload::incoming_mo(&dest, &mut rand::thread_rng());
        let outcome = send(&client, &dest, &body).await;
        if let Outcome::TransportError(tag) = &outcome {
            debug!(worker = id, url = %dest.url, %tag, "request failed");
        }
        monitor.note(outcome);
    }
    debug!(worker = id, url = %dest.url, "blaster stopped");
}

/// Issues one POST and classifies the result. Transport failures become
/// tagged outcomes so the loop keeps running at full speed.
async fn send(client: &Client, dest: &Destination, body: &str) -> Outcome {
    let response = match client.post(&dest.url).form(&[(FORM_FIELD, body)]).send().await {
        Ok(response) => response,
        Err(e) => return Outcome::TransportError(error_tag(e)),
    };
    let status = response.status();
    // drain the body so the connection can be reused for the next request
    match response.bytes().await {
        Ok(_) => Outcome::from(status),
        Err(e) => Outcome::TransportError(error_tag(e)),
    }
}

/// Short, stable tag keeping the per-outcome counter map low-cardinality.
fn error_tag(e: reqwest::Error) -> String {
    if e.is_timeout() {
        "timeout".into()
    } else if e.is_connect() {
        "connection error".into()
    } else if e.is_body() || e.is_decode() {
        "response read error".into()
    } else {
        e.without_url().to_string()
    }
}
