//! Admission middleware: per-client rate limiting and job concurrency caps.

use std::sync::Arc;

use async_stream::stream;
use axum::{
    body::Body, extract::State, http::Request, middleware::Next, response::Response,
};
use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::warn;
use viddl_core::ClientKey;
use viddl_telemetry::AdmissionGate;

use crate::http::client::client_key;
use crate::http::errors::ApiError;
use crate::http::rate_limit::insert_rate_limit_headers;
use crate::state::ApiState;

/// Spend one token for the calling client; refused requests never reach a handler.
pub(crate) async fn rate_gate(
    State(state): State<Arc<ApiState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&req, state.settings.trust_forwarded_for);
    let decision = state.rate.evaluate(&key, Instant::now());
    if !decision.allowed {
        state.telemetry.inc_admission_rejection(AdmissionGate::Rate);
        warn!(
            client = %key,
            retry_after_ms = u64::try_from(decision.retry_after.as_millis()).unwrap_or(u64::MAX),
            "rate limit exceeded"
        );
        return Err(
            ApiError::too_many_requests("rate limit exceeded; try again later")
                .with_rate_limit_headers(decision.limit, 0, Some(decision.retry_after)),
        );
    }

    req.extensions_mut().insert(key);
    let mut response = next.run(req).await;
    insert_rate_limit_headers(
        response.headers_mut(),
        decision.limit,
        decision.remaining,
        None,
    );
    Ok(response)
}

/// Hold a concurrency slot from admission until the response body is finished
/// or dropped, so a slow download keeps counting against its client.
pub(crate) async fn concurrency_gate(
    State(state): State<Arc<ApiState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let key = req
        .extensions()
        .get::<ClientKey>()
        .cloned()
        .unwrap_or_else(|| client_key(&req, state.settings.trust_forwarded_for));
    let Some(permit) = state.concurrency.try_acquire(key.clone()) else {
        state
            .telemetry
            .inc_admission_rejection(AdmissionGate::Concurrency);
        warn!(
            client = %key,
            max = state.concurrency.max_per_client(),
            "concurrent job limit reached"
        );
        return Err(ApiError::too_many_jobs(
            "too many concurrent downloads; wait for one to finish",
        ));
    };

    let (parts, body) = next.run(req).await.into_parts();
    let mut data = body.into_data_stream();
    let guarded = stream! {
        let _permit = permit;
        while let Some(chunk) = data.next().await {
            yield chunk;
        }
    };
    Ok(Response::from_parts(parts, Body::from_stream(guarded)))
}
