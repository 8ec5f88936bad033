//! # Sidecar Errors
//!
//! Request-level failures and the single function that turns them into
//! responses. Startup failures are kept separate: they go back to whoever
//! started the server, never to an HTTP caller.

use std::io;
use std::time::Duration;

use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::observability::Logger;
use crate::reader::ReaderError;

/// Result type for request handling
pub type SidecarResult<T> = Result<T, SidecarError>;

/// Request handling errors
#[derive(Debug, Error)]
pub enum SidecarError {
    /// Request body was not a valid read request
    #[error("decode body: {0}")]
    Decode(String),

    /// Lookup or scan failed in the reader
    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// Prefix scan returned more rows than allowed
    #[error("max row count ({0}) exceeded")]
    RowLimitExceeded(usize),

    /// Ledger latency query failed
    #[error("get ledger latency: {0}")]
    LedgerLatency(ReaderError),

    /// Ledger latency query failed during a health probe
    #[error("healthcheck: {0}")]
    Healthcheck(ReaderError),

    /// Response body could not be serialized
    #[error("encode response: {0}")]
    Encode(String),

    /// Handler did not finish within the write deadline
    #[error("request deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl SidecarError {
    /// HTTP status for this error. Every request failure is a 500; the
    /// lookup miss is not an error and answers 404 on its own.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SidecarError::Decode(_)
            | SidecarError::Reader(_)
            | SidecarError::RowLimitExceeded(_)
            | SidecarError::LedgerLatency(_)
            | SidecarError::Healthcheck(_)
            | SidecarError::Encode(_)
            | SidecarError::DeadlineExceeded(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for SidecarError {
    fn from(err: serde_json::Error) -> Self {
        SidecarError::Decode(err.to_string())
    }
}

impl IntoResponse for SidecarError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Finish a request.
///
/// A successful handler has already built its full response. A failure is
/// logged once with the request URL and answered with its status and message.
pub fn finalize(uri: &Uri, result: SidecarResult<Response>) -> Response {
    match result {
        Ok(response) => response,
        Err(err) => {
            let message = err.to_string();
            let url = uri.to_string();
            Logger::error(
                "REQUEST_FAILED",
                &[("err", message.as_str()), ("url", url.as_str())],
            );
            err.into_response()
        }
    }
}

/// Errors starting or running the server
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration rejected before binding
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Listener could not be bound
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Server stopped with an error
    #[error("listen and serve: {0}")]
    Serve(#[source] io::Error),
}
