//! Target URL and format identifier validation.

use std::fmt::{self, Display, Formatter};

use url::Url;

use crate::error::{JobError, JobResult};

/// Longest target URL accepted.
pub const MAX_URL_LEN: usize = 2048;
/// Longest format identifier accepted.
pub const MAX_FORMAT_ID_LEN: usize = 20;

/// A target URL that passed scheme and domain allow-listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    url: Url,
    host: String,
}

impl TargetUrl {
    /// Validate a raw URL against the allowed domain list.
    ///
    /// The host matches when, after dropping a leading `www.`, it equals an
    /// allowed domain or is a subdomain of one.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidInput`] for over-long, malformed, non-HTTP, or
    /// disallowed targets.
    pub fn parse(raw: &str, allowed_domains: &[String]) -> JobResult<Self> {
        let raw = raw.trim();
        if raw.len() > MAX_URL_LEN {
            return Err(JobError::invalid_input("url", "URL too long", None));
        }
        let url = Url::parse(raw)
            .map_err(|_| JobError::invalid_input("url", "invalid URL format", Some(raw)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(JobError::invalid_input(
                "url",
                "invalid protocol",
                Some(url.scheme()),
            ));
        }
        let host = url
            .host_str()
            .map(|host| host.to_ascii_lowercase())
            .ok_or_else(|| JobError::invalid_input("url", "invalid URL format", Some(raw)))?;
        let bare = host.strip_prefix("www.").unwrap_or(&host).to_string();
        let allowed = allowed_domains.iter().any(|domain| {
            bare == *domain
                || bare
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        });
        if !allowed {
            return Err(JobError::invalid_input(
                "url",
                "domain not allowed",
                Some(&bare),
            ));
        }
        Ok(Self { url, host: bare })
    }

    /// Full URL text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Lowercase host without a leading `www.`.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// True when the host is `domain` or one of its subdomains.
    #[must_use]
    pub fn host_matches(&self, domain: &str) -> bool {
        self.host == domain
            || self
                .host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    /// True when the URL carries a list marker (`list=` query or `/playlist` path).
    #[must_use]
    pub fn names_list(&self) -> bool {
        self.url.path().contains("/playlist")
            || self.url.query_pairs().any(|(key, _)| key == "list")
    }
}

impl Display for TargetUrl {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.url.as_str())
    }
}

pub(crate) fn validate_format_id(value: &str) -> JobResult<()> {
    let valid = !value.is_empty()
        && value.len() <= MAX_FORMAT_ID_LEN
        && value.chars().all(|ch| ch.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(JobError::invalid_input(
            "format",
            "invalid format",
            Some(value),
        ))
    }
}
