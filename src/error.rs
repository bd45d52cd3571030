use std::time::Duration;
use thiserror::Error;

use crate::runtime::ExceptionDetails;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum CdpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inbound frame carried neither an `id` nor a `method`.
    #[error("Message has neither an `id` nor a `method`")]
    UnroutableFrame,

    /// The browser answered the command with an error response.
    #[error("Chrome returned an error (code {code}): {message}")]
    Protocol { code: i64, message: String },

    /// An evaluation completed, but the script threw.
    #[error("JavaScript exception: {}", .0.description())]
    JavaScript(Box<ExceptionDetails>),

    #[error("Command {method} timed out after {timeout:?}")]
    CommandTimeout { method: String, timeout: Duration },

    #[error("No debuggable target found at host: {0}")]
    NoTarget(String),

    #[error("Internal communication error: {0}")]
    Internal(String),

    #[error("Connection closed")]
    ConnectionClosed,
}

pub type CdpResult<T> = Result<T, CdpError>;
