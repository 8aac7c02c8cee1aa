//! Optional shared-secret gate for the `/api` surface.

use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::http::constants::{HEADER_API_KEY, QUERY_API_KEY};
use crate::http::errors::ApiError;
use crate::state::ApiState;

pub(crate) async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.settings.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let presented = extract_api_key(&req)
        .ok_or_else(|| ApiError::unauthorized("missing API key header or query parameter"))?;
    if !bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        debug!("api key mismatch");
        return Err(ApiError::unauthorized("invalid API key"));
    }

    Ok(next.run(req).await)
}

pub(crate) fn extract_api_key(req: &Request<Body>) -> Option<String> {
    let header_value = req
        .headers()
        .get(HEADER_API_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(value) = header_value {
        return Some(value.to_string());
    }

    req.uri().query()?.split('&').find_map(|pair| {
        pair.split_once('=')
            .filter(|(name, value)| *name == QUERY_API_KEY && !value.is_empty())
            .map(|(_, value)| value.to_string())
    })
}
