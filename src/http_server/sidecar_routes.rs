//! Sidecar HTTP Routes
//!
//! Point lookups, prefix scans, ledger latency and the health probes.
//! Every handler times itself and hands its result to [`finalize`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;

use super::config::SidecarConfig;
use super::errors::{finalize, SidecarError, SidecarResult};
use super::key::ReadRequest;
use crate::observability::{ApiOperation, LatencyObservation, LatencyRecorder};
use crate::reader::{Reader, Row, RowCursor};

/// Header set on a lookup miss so callers can tell it from an unknown route
pub const NOT_FOUND_HEADER: &str = "x-ctlstore";
pub const NOT_FOUND_VALUE: &str = "Not Found";

/// Largest request body accepted
const MAX_BODY_BYTES: usize = 1024 * 1024;

// ==================
// Shared State
// ==================

/// State shared by every request. Read-only after construction.
pub struct SidecarState<R: Reader> {
    reader: R,
    max_rows: usize,
    read_timeout: Duration,
    write_timeout: Duration,
    latency: Arc<dyn LatencyRecorder>,
}

impl<R: Reader> SidecarState<R> {
    pub fn new(reader: R, config: &SidecarConfig, latency: Arc<dyn LatencyRecorder>) -> Self {
        Self {
            reader,
            max_rows: config.max_rows,
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            latency,
        }
    }

    fn observe_api_latency(&self, op: ApiOperation, headers: &HeaderMap) -> LatencyObservation {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        LatencyObservation::start(self.latency.clone(), op, user_agent)
    }

    /// Run a handler under the write deadline. Past the deadline the handler
    /// is dropped, which abandons any reader call in flight.
    async fn within_deadline<F>(&self, handler: F) -> SidecarResult<Response>
    where
        F: Future<Output = SidecarResult<Response>>,
    {
        tokio::time::timeout(self.write_timeout, handler)
            .await
            .unwrap_or_else(|_| Err(SidecarError::DeadlineExceeded(self.write_timeout)))
    }

    async fn read_request(&self, body: Body) -> SidecarResult<ReadRequest> {
        let bytes = tokio::time::timeout(self.read_timeout, to_bytes(body, MAX_BODY_BYTES))
            .await
            .map_err(|_| SidecarError::Decode("request body read timed out".to_string()))?
            .map_err(|e| SidecarError::Decode(e.to_string()))?;

        Ok(ReadRequest::from_slice(&bytes)?)
    }

    async fn get_row_by_key(&self, family: &str, table: &str, body: Body) -> SidecarResult<Response> {
        let request = self.read_request(body).await?;
        let key = request.positional_args();

        match self.reader.get_row_by_key(family, table, &key).await? {
            Some(row) => json_response(&row),
            None => Ok((
                StatusCode::NOT_FOUND,
                [(NOT_FOUND_HEADER, NOT_FOUND_VALUE)],
            )
                .into_response()),
        }
    }

    async fn get_rows_by_key_prefix(
        &self,
        family: &str,
        table: &str,
        body: Body,
    ) -> SidecarResult<Response> {
        let request = self.read_request(body).await?;
        let key = request.positional_args();

        let cursor = self.reader.get_rows_by_key_prefix(family, table, &key).await?;
        let rows = self.collect_rows(cursor)?;
        json_response(&rows)
    }

    /// Drain a scan cursor, enforcing the row ceiling.
    ///
    /// The ceiling is checked after each row is appended, so the row past the
    /// ceiling is fetched before the scan is rejected. The cursor is consumed
    /// here and released on every return path.
    fn collect_rows(&self, cursor: RowCursor) -> SidecarResult<Vec<Row>> {
        let mut rows = Vec::new();
        for row in cursor {
            rows.push(row?);
            if self.max_rows > 0 && rows.len() > self.max_rows {
                return Err(SidecarError::RowLimitExceeded(self.max_rows));
            }
        }
        Ok(rows)
    }

    async fn get_ledger_latency(&self) -> SidecarResult<Response> {
        let latency = self
            .reader
            .get_ledger_latency()
            .await
            .map_err(SidecarError::LedgerLatency)?;

        json_response(&LedgerLatencyResponse {
            value: latency.as_secs_f64(),
            unit: "seconds",
        })
    }

    async fn healthcheck(&self) -> SidecarResult<Response> {
        self.reader
            .get_ledger_latency()
            .await
            .map_err(SidecarError::Healthcheck)?;
        Ok(StatusCode::OK.into_response())
    }

    async fn ping(&self) -> SidecarResult<Response> {
        // Same as the healthcheck until ping needs its own semantics
        self.healthcheck().await
    }
}

// ==================
// Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct LedgerLatencyResponse {
    pub value: f64,
    pub unit: &'static str,
}

fn json_response<T: Serialize>(value: &T) -> SidecarResult<Response> {
    let body = serde_json::to_vec(value).map_err(|e| SidecarError::Encode(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response())
}

// ==================
// Sidecar Routes
// ==================

/// Create the sidecar routes
pub fn sidecar_routes<R: Reader>(state: Arc<SidecarState<R>>) -> Router {
    Router::new()
        .route("/get-row-by-key/:family/:table", post(get_row_by_key::<R>))
        .route(
            "/get-rows-by-key-prefix/:family/:table",
            post(get_rows_by_key_prefix::<R>),
        )
        .route("/get-ledger-latency", get(get_ledger_latency::<R>))
        .route("/healthcheck", get(healthcheck::<R>))
        .route("/ping", get(ping::<R>))
        .with_state(state)
}

async fn get_row_by_key<R: Reader>(
    State(state): State<Arc<SidecarState<R>>>,
    Path((family, table)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let _latency = state.observe_api_latency(ApiOperation::GetRowByKey, &headers);
    let response = state.within_deadline(state.get_row_by_key(&family, &table, body));
    finalize(&uri, response.await)
}

async fn get_rows_by_key_prefix<R: Reader>(
    State(state): State<Arc<SidecarState<R>>>,
    Path((family, table)): Path<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let _latency = state.observe_api_latency(ApiOperation::GetRowsByKeyPrefix, &headers);
    let response = state.within_deadline(state.get_rows_by_key_prefix(&family, &table, body));
    finalize(&uri, response.await)
}

async fn get_ledger_latency<R: Reader>(
    State(state): State<Arc<SidecarState<R>>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let _latency = state.observe_api_latency(ApiOperation::GetLedgerLatency, &headers);
    let response = state.within_deadline(state.get_ledger_latency());
    finalize(&uri, response.await)
}

async fn healthcheck<R: Reader>(
    State(state): State<Arc<SidecarState<R>>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let _latency = state.observe_api_latency(ApiOperation::Healthcheck, &headers);
    let response = state.within_deadline(state.healthcheck());
    finalize(&uri, response.await)
}

async fn ping<R: Reader>(
    State(state): State<Arc<SidecarState<R>>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let _latency = state.observe_api_latency(ApiOperation::Ping, &headers);
    let response = state.within_deadline(state.ping());
    finalize(&uri, response.await)
}
