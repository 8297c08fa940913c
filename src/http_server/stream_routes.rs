//! Stream HTTP Routes
//!
//! `POST /stream` runs one query and streams its rows back as NDJSON or an
//! Arrow IPC stream. Validation and cursor-open failures produce a JSON error
//! response; anything after the first byte can only truncate the body.

use std::num::NonZeroUsize;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use super::config::StreamSettings;
use super::errors::{ApiError, ApiResult};
use crate::observability::{log_event_with_fields, Event, StreamMetrics};
use crate::source::RowSource;
use crate::stream::{is_source_failure, ChannelSink, StreamDriver, StreamFormat, StreamOptions};

/// Response header carrying the stream id used in log lines
pub const STREAM_ID_HEADER: &str = "x-stream-id";

// ==================
// Shared State
// ==================

/// Stream state shared across handlers
pub struct StreamState<S> {
    pub source: S,
    pub settings: StreamSettings,
    pub metrics: Arc<StreamMetrics>,
}

impl<S: RowSource> StreamState<S> {
    pub fn new(source: S) -> Self {
        Self::with_settings(source, StreamSettings::default())
    }

    pub fn with_settings(source: S, settings: StreamSettings) -> Self {
        Self {
            source,
            settings,
            metrics: Arc::new(StreamMetrics::new()),
        }
    }

    /// Share an existing metrics registry
    pub fn with_metrics(mut self, metrics: Arc<StreamMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

// ==================
// Request Types
// ==================

#[derive(Debug, Clone, Deserialize)]
pub struct StreamRequest {
    pub query: String,
    #[serde(default)]
    pub format: StreamFormat,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

impl StreamRequest {
    /// Validate against `settings` and produce the driver options.
    ///
    /// With `max_limit` configured, a request without a limit is capped at it.
    pub fn options(&self, settings: &StreamSettings) -> ApiResult<StreamOptions> {
        if self.query.trim().is_empty() {
            return Err(ApiError::InvalidRequest("query must not be empty".to_string()));
        }

        let requested = self.batch_size.unwrap_or(settings.default_batch_size);
        let batch_capacity = NonZeroUsize::new(requested)
            .filter(|size| size.get() <= settings.max_batch_size)
            .ok_or(ApiError::InvalidBatchSize {
                requested,
                max: settings.max_batch_size,
            })?;

        let limit = match (self.limit, settings.max_limit) {
            (Some(limit), Some(max)) if limit > max => {
                return Err(ApiError::LimitExceeded(limit, max))
            }
            (None, max) => max,
            (limit, _) => limit,
        };

        Ok(StreamOptions::new(self.format)
            .with_limit(limit)
            .with_batch_capacity(batch_capacity)
            .with_schema_policy(settings.schema_policy))
    }
}

// ==================
// Stream Routes
// ==================

/// Create stream routes
pub fn stream_routes<S>(state: Arc<StreamState<S>>) -> Router
where
    S: RowSource + 'static,
{
    Router::new()
        .route("/stream", post(stream_handler::<S>))
        .with_state(state)
}

async fn stream_handler<S>(
    State(state): State<Arc<StreamState<S>>>,
    payload: Result<Json<StreamRequest>, JsonRejection>,
) -> Response
where
    S: RowSource + 'static,
{
    match start_stream(&state, payload).await {
        Ok(response) => response,
        Err(err) => {
            state.metrics.increment_rejected();
            let status = err.status_code().as_u16().to_string();
            log_event_with_fields(
                Event::RequestRejected,
                &[("status", status.as_str()), ("reason", err.to_string().as_str())],
            );
            err.into_response()
        }
    }
}

async fn start_stream<S>(
    state: &StreamState<S>,
    payload: Result<Json<StreamRequest>, JsonRejection>,
) -> ApiResult<Response>
where
    S: RowSource + 'static,
{
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let options = request.options(&state.settings)?;
    let cursor = state.source.open(&request.query, options.limit).await?;

    let driver = StreamDriver::new(options).with_metrics(Arc::clone(&state.metrics));
    let stream_id = driver.id().to_string();
    let (mut sink, receiver) = ChannelSink::channel(1);

    tokio::spawn(async move {
        if let Err(err) = driver.drive(cursor, &mut sink).await {
            let id = driver.id().to_string();
            let kind = if is_source_failure(&err) { "source" } else { "encoding" };
            log_event_with_fields(
                Event::StreamAborted,
                &[("stream_id", id.as_str()), ("kind", kind)],
            );
            sink.abort(err.to_string()).await;
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, options.format.content_type())
        .header(STREAM_ID_HEADER, stream_id)
        .body(Body::from_stream(receiver.into_stream()))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
