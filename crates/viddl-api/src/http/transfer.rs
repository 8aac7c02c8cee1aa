//! Streaming a finished artifact back to the client.

use std::fmt::Write as _;

use async_stream::stream;
use axum::{
    body::{Body, Bytes},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::Response,
};
use tokio::io::AsyncReadExt;
use tracing::error;
use viddl_core::Artifact;

use crate::http::constants::{
    FALLBACK_DOWNLOAD_NAME, HEADER_CONTENT_DESCRIPTION, TRANSFER_CHUNK_BYTES,
};
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Schedule the artifact's removal, then stream it in fixed-size chunks.
///
/// Removal is scheduled before the first byte is sent; on unix an open file
/// outlives its directory entry, so a slow client still receives every byte.
pub(crate) async fn serve_artifact(
    state: &ApiState,
    artifact: &Artifact,
) -> Result<Response, ApiError> {
    state
        .store
        .schedule_removal(artifact.path.clone(), state.settings.removal_delay);

    let mut file = tokio::fs::File::open(&artifact.path).await.map_err(|err| {
        error!(error = %err, path = %artifact.path.display(), "failed to open artifact");
        ApiError::internal("artifact unavailable")
    })?;

    let body = Body::from_stream(stream! {
        let mut buffer = vec![0_u8; TRANSFER_CHUNK_BYTES];
        loop {
            match file.read(&mut buffer).await {
                Ok(0) => break,
                Ok(read) => yield Ok(Bytes::copy_from_slice(&buffer[..read])),
                Err(err) => {
                    error!(error = %err, "artifact read failed mid-transfer");
                    yield Err(err);
                    break;
                }
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, artifact.content_type)
        .header(CONTENT_LENGTH, artifact.size)
        .header(CONTENT_DISPOSITION, content_disposition(&artifact.display_name))
        .header(HEADER_CONTENT_DESCRIPTION, "File Transfer")
        .body(body)
        .map_err(|err| {
            error!(error = %err, "failed to build transfer response");
            ApiError::internal("failed to build transfer response")
        })
}

/// `attachment` disposition with an ASCII `filename` and an RFC 5987
/// `filename*` carrying the original UTF-8 name.
fn content_disposition(display_name: &str) -> HeaderValue {
    let ascii: String = display_name
        .chars()
        .map(|ch| {
            if ch == ' ' || (ch.is_ascii_graphic() && ch != '"' && ch != '\\') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let ascii = ascii.trim();
    let ascii = if ascii.is_empty() || ascii.chars().all(|ch| ch == '_') {
        FALLBACK_DOWNLOAD_NAME
    } else {
        ascii
    };

    let mut value = format!("attachment; filename=\"{ascii}\"");
    if !display_name.is_empty() && ascii != display_name {
        value.push_str("; filename*=UTF-8''");
        for byte in display_name.bytes() {
            if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
                value.push(char::from(byte));
            } else {
                let _ = write!(value, "%{byte:02X}");
            }
        }
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
