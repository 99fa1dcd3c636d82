//! Image generation handler
//!
//! Handles `POST /api/image`, returning a single displayable image reference.

use crate::error::AppError;
use crate::handlers::AppState;
use crate::handlers::extractor::RelayJson;
use crate::metrics::{Endpoint, Outcome};
use crate::middleware::RequestId;
use crate::pipeline::ImageRequest;
use axum::{Extension, Json, extract::State};
use serde::Serialize;

/// `status` value of a successful image response
pub const SUCCESS_STATUS: &str = "success";

/// Successful image response
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    /// `data:image/png;base64,...` URI or provider URL
    pub image: String,
    pub status: &'static str,
}

/// POST /api/image handler
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    RelayJson(request): RelayJson<ImageRequest>,
) -> Result<Json<ImageResponse>, AppError> {
    match state.pipeline().image(request).await {
        Ok(image) => {
            state
                .metrics()
                .record_request(Endpoint::Image, Outcome::Success);
            tracing::info!(
                request_id = %request_id,
                inline = image.starts_with("data:"),
                "Image generated"
            );
            Ok(Json(ImageResponse {
                image,
                status: SUCCESS_STATUS,
            }))
        }
        Err(e) => {
            state
                .metrics()
                .record_request(Endpoint::Image, Outcome::Error);
            if matches!(e, AppError::Upstream { .. }) {
                state.metrics().upstream_error(Endpoint::Image);
            }
            tracing::error!(
                request_id = %request_id,
                error = %e,
                kind = e.kind(),
                "Image request failed"
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_response_shape() {
        let body = serde_json::to_value(ImageResponse {
            image: "https://cdn.example.com/a.png".to_string(),
            status: SUCCESS_STATUS,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"image": "https://cdn.example.com/a.png", "status": "success"})
        );
    }
}
