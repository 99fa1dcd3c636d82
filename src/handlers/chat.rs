//! Streaming chat relay handler
//!
//! Handles `POST /api/chat`. The response body is the raw concatenation of
//! upstream text deltas, flushed as they arrive. It is labelled
//! `text/event-stream` for client compatibility but carries no SSE framing.

use crate::error::AppError;
use crate::handlers::AppState;
use crate::handlers::extractor::RelayJson;
use crate::metrics::{Endpoint, Outcome};
use crate::middleware::RequestId;
use crate::pipeline::{ChatRequest, StreamRelay};
use axum::{
    Extension,
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

/// Content type announced for streamed chat responses
pub const STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// POST /api/chat handler
///
/// Success: `200` with a streamed text body.
/// Failure before streaming starts: `500` with `{ "error": "..." }`.
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    RelayJson(request): RelayJson<ChatRequest>,
) -> Result<Response, AppError> {
    tracing::debug!(
        request_id = %request_id,
        model = ?request.model,
        messages_count = request.messages.len(),
        use_search = request.use_search,
        "Received chat request"
    );

    match state.pipeline().chat(request).await {
        Ok(relay) => {
            // The relay records the outcome once the stream ends
            tracing::info!(request_id = %request_id, "Streaming chat response");
            Ok(stream_response(relay))
        }
        Err(e) => {
            state.metrics().record_request(Endpoint::Chat, Outcome::Error);
            if matches!(e, AppError::Upstream { .. }) {
                state.metrics().upstream_error(Endpoint::Chat);
            }
            tracing::error!(
                request_id = %request_id,
                error = %e,
                kind = e.kind(),
                "Chat request failed"
            );
            Err(e)
        }
    }
}

fn stream_response(relay: StreamRelay) -> Response {
    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(relay),
    )
        .into_response()
}
