//! Rate-limit response headers.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, header::RETRY_AFTER};

use crate::http::constants::{
    HEADER_RATE_LIMIT_LIMIT, HEADER_RATE_LIMIT_REMAINING, HEADER_RATE_LIMIT_RESET,
};

/// Stamp limit and remaining counts, plus a whole-second retry hint when the
/// request was refused. Partial seconds round up so clients never retry early.
pub(crate) fn insert_rate_limit_headers(
    headers: &mut HeaderMap,
    limit: u32,
    remaining: u32,
    retry_after: Option<Duration>,
) {
    headers.insert(HEADER_RATE_LIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(HEADER_RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
    if let Some(wait) = retry_after {
        let seconds = if wait.subsec_nanos() > 0 {
            wait.as_secs().saturating_add(1)
        } else {
            wait.as_secs().max(1)
        };
        let value = HeaderValue::from(seconds);
        headers.insert(RETRY_AFTER, value.clone());
        headers.insert(HEADER_RATE_LIMIT_RESET, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).and_then(|value| value.to_str().ok())
    }

    #[test]
    fn retry_hint_rounds_up_to_whole_seconds() {
        let mut headers = HeaderMap::new();
        insert_rate_limit_headers(&mut headers, 10, 0, Some(Duration::from_millis(19_200)));
        assert_eq!(header(&headers, "retry-after"), Some("20"));
        assert_eq!(header(&headers, "x-ratelimit-reset"), Some("20"));

        let mut headers = HeaderMap::new();
        insert_rate_limit_headers(&mut headers, 10, 0, Some(Duration::ZERO));
        assert_eq!(header(&headers, "retry-after"), Some("1"));
    }

    #[test]
    fn admitted_requests_carry_counts_only() {
        let mut headers = HeaderMap::new();
        insert_rate_limit_headers(&mut headers, 10, 7, None);
        assert_eq!(header(&headers, "x-ratelimit-limit"), Some("10"));
        assert_eq!(header(&headers, "x-ratelimit-remaining"), Some("7"));
        assert!(headers.get("retry-after").is_none());
    }
}
