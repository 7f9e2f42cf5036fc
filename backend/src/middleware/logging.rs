use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::error::ErrorCode;
use crate::models::user::CurrentUser;

/// Logs every 4xx/5xx response with its machine-readable error code.
///
/// The code comes from the [`ErrorCode`] extension `AppError` attaches, so the
/// body is never buffered. Responses produced outside `AppError` (role gates,
/// extractor rejections) log without a code.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let uri = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let latency_ms = start.elapsed().as_millis() as u64;
    let code = response
        .extensions()
        .get::<ErrorCode>()
        .map(|code| code.0)
        .unwrap_or("-");
    let user_id = response
        .extensions()
        .get::<CurrentUser>()
        .map(|user| user.id.to_string())
        .unwrap_or_else(|| "-".to_string());

    if status.is_server_error() {
        tracing::error!(
            status = status.as_u16(),
            method = %method,
            uri = %uri,
            latency_ms,
            code,
            user_id = %user_id,
            "Request completed with error status"
        );
    } else {
        tracing::warn!(
            status = status.as_u16(),
            method = %method,
            uri = %uri,
            latency_ms,
            code,
            user_id = %user_id,
            "Request completed with error status"
        );
    }
    response
}
