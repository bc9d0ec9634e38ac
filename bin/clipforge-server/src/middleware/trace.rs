use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::BodyExt;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Largest JSON body echoed into the log.
const MAX_LOGGED_BODY: usize = 1024;

/// Run each request in an `http_request` span keyed by a trace id.
///
/// The id is taken from `x-trace-id` when it holds a UUID, generated
/// otherwise, and echoed on the response.  Small JSON bodies are logged;
/// anything else (clip downloads) streams through untouched.
pub async fn trace_middleware(req: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");
        let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

        let (parts, body) = req.into_parts();
        let body = log_json_body("request", &parts.headers, body).await;
        let mut req = Request::from_parts(parts, body);
        if let Some(value) = &header_value {
            req.headers_mut().insert(X_TRACE_ID, value.clone());
        }

        let response = next.run(req).await;

        let (parts, body) = response.into_parts();
        let body = log_json_body("response", &parts.headers, body).await;
        let mut response = Response::from_parts(parts, body);
        if let Some(value) = header_value {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );
        response
    }
    .instrument(span)
    .await
}

async fn log_json_body(direction: &str, headers: &HeaderMap, body: Body) -> Body {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    if !is_json {
        return body;
    }

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    };
    if bytes.len() < MAX_LOGGED_BODY {
        if let Ok(text) = std::str::from_utf8(&bytes) {
            info!("{} body: {}", direction, text);
        }
    } else {
        info!("{} body: [skipped: size={}]", direction, bytes.len());
    }
    Body::from(bytes)
}
