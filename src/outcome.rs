//! This module provides the result classification for a single request.
use std::fmt;

use serde::Serialize;

/// The result of one request/response cycle, as reported to the QPS monitor.
///
/// Every completed cycle produces exactly one outcome: the HTTP status code
/// the gateway answered with, or a transport-level error tag when the request
/// never produced a response.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Outcome {
    /// The gateway responded with this HTTP status code.
    Status(u16),
    /// The request failed below the HTTP layer (connect, timeout, read).
    TransportError(String),
}

impl Outcome {
    /// Returns true for a 2xx response.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Status(code) if (200..300).contains(code))
    }

    /// Returns true for a 4xx response.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Outcome::Status(code) if (400..500).contains(code))
    }

    /// Returns true for a 5xx response.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Outcome::Status(code) if (500..600).contains(code))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Status(code) => write!(f, "{code}"),
            Outcome::TransportError(tag) => f.write_str(tag),
        }
    }
}

impl From<reqwest::StatusCode> for Outcome {
    fn from(status: reqwest::StatusCode) -> Self {
        Outcome::Status(status.as_u16())
    }
}
