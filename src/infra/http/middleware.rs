use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, Level, error, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const TARGET: &str = "folio::http::response";

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Tag the request with an id, run it inside a span carrying that id and echo
/// the id back in `x-request-id`.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4().to_string());
    request.extensions_mut().insert(request_id.clone());

    // Only the path: confirmation tokens travel in the query string.
    let span = info_span!(
        "http.request",
        request_id = %request_id.0,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

/// Log 4xx as `warn` and 5xx as `error`, with the error report the handler attached.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let level = if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else {
        return response;
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let ErrorReport {
        source, messages, ..
    } = response
        .extensions_mut()
        .remove::<ErrorReport>()
        .unwrap_or_else(|| ErrorReport::from_message("unknown", status, "no diagnostic available"));
    let cause = messages.last().cloned().unwrap_or_default();

    if level == Level::ERROR {
        error!(
            target: TARGET,
            status = status.as_u16(),
            %method,
            %path,
            %request_id,
            elapsed_ms,
            source,
            %cause,
            chain = ?messages,
            "request failed"
        );
    } else {
        warn!(
            target: TARGET,
            status = status.as_u16(),
            %method,
            %path,
            %request_id,
            elapsed_ms,
            source,
            %cause,
            "request rejected"
        );
    }

    response
}
