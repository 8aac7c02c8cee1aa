//! Environment parsing and validation.
//!
//! # Design
//! - `from_lookup` takes any variable source so tests never touch the process env.
//! - Every value is validated up front; a bad variable fails bootstrap instead of
//!   surfacing as a runtime error later.
//! - Lists are comma separated, trimmed, and empty items are dropped.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AdmissionConfig, AppConfig, ExtractorConfig, HttpConfig, LifecycleConfig, LogOutput,
    LoggingSettings,
};

static FILESIZE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?[KkMmGg]?$").ok());

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when any variable fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when any variable fails validation.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };
        Ok(Self {
            http: env.http()?,
            admission: env.admission()?,
            lifecycle: env.lifecycle()?,
            extractor: env.extractor()?,
            logging: env.logging()?,
        })
    }
}

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn http(&self) -> ConfigResult<HttpConfig> {
        let bind_raw = self
            .get("BIND_ADDR")
            .unwrap_or_else(|| defaults::BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::invalid("BIND_ADDR", &bind_raw, "not_an_ip_address"))?;

        let port = match self.get("PORT") {
            Some(raw) => {
                let port = raw
                    .parse::<u16>()
                    .map_err(|_| ConfigError::invalid("PORT", &raw, "out_of_range"))?;
                if port == 0 {
                    return Err(ConfigError::invalid("PORT", &raw, "zero"));
                }
                port
            }
            None => defaults::PORT,
        };

        let mut allowed_origins: Vec<String> = defaults::ALLOWED_ORIGINS
            .iter()
            .map(ToString::to_string)
            .collect();
        for origin in self.list("ALLOWED_ORIGINS").into_iter().flatten() {
            let origin = normalize_origin(&origin);
            if !allowed_origins.contains(&origin) {
                allowed_origins.push(origin);
            }
        }

        Ok(HttpConfig {
            bind_addr,
            port,
            allowed_origins,
            api_key: self.get("API_KEY"),
            trust_forwarded_for: env_flag_value(self.get("TRUST_PROXY").as_deref()),
        })
    }

    fn admission(&self) -> ConfigResult<AdmissionConfig> {
        Ok(AdmissionConfig {
            rate_burst: self.bounded_u32(
                "RATE_LIMIT_BURST",
                defaults::RATE_LIMIT_BURST,
                1,
                u32::MAX,
            )?,
            refill_interval: self.seconds("RATE_LIMIT_REFILL_SECS", defaults::RATE_LIMIT_REFILL_SECS)?,
            idle_ttl: self.seconds("RATE_LIMIT_IDLE_SECS", defaults::RATE_LIMIT_IDLE_SECS)?,
            evict_interval: self.seconds("RATE_LIMIT_EVICT_SECS", defaults::RATE_LIMIT_EVICT_SECS)?,
            max_concurrent_per_client: self.bounded_u32(
                "MAX_CONCURRENT_DOWNLOADS",
                defaults::MAX_CONCURRENT_DOWNLOADS,
                1,
                u32::MAX,
            )?,
        })
    }

    fn lifecycle(&self) -> ConfigResult<LifecycleConfig> {
        Ok(LifecycleConfig {
            tmp_dir: PathBuf::from(
                self.get("TMP_DIR")
                    .unwrap_or_else(|| defaults::TMP_DIR.to_string()),
            ),
            removal_delay: self.seconds("CLEANUP_DELAY_SECS", defaults::CLEANUP_DELAY_SECS)?,
            sweep_interval: self.seconds("CLEANUP_INTERVAL_SECS", defaults::CLEANUP_INTERVAL_SECS)?,
            max_age: self.seconds("CLEANUP_MAX_AGE_SECS", defaults::CLEANUP_MAX_AGE_SECS)?,
        })
    }

    fn extractor(&self) -> ConfigResult<ExtractorConfig> {
        let max_filesize = self
            .get("MAX_DOWNLOAD_SIZE")
            .unwrap_or_else(|| defaults::MAX_DOWNLOAD_SIZE.to_string());
        let valid_size = FILESIZE_PATTERN
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(&max_filesize));
        if !valid_size {
            return Err(ConfigError::invalid(
                "MAX_DOWNLOAD_SIZE",
                &max_filesize,
                "not_a_size",
            ));
        }

        let allowed_domains = self.list("ALLOWED_DOMAINS").map_or_else(
            || defaults::ALLOWED_DOMAINS.iter().map(ToString::to_string).collect(),
            |domains| {
                domains
                    .into_iter()
                    .map(|domain| domain.to_ascii_lowercase())
                    .collect()
            },
        );
        let single_item_hosts = self.list("SINGLE_ITEM_HOSTS").map_or_else(
            || {
                defaults::SINGLE_ITEM_HOSTS
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            },
            |hosts| {
                hosts
                    .into_iter()
                    .map(|host| host.to_ascii_lowercase())
                    .collect()
            },
        );

        Ok(ExtractorConfig {
            binary: self
                .get("YTDLP_BIN")
                .unwrap_or_else(|| defaults::YTDLP_BIN.to_string()),
            cookies_file: self.get("YTDLP_COOKIES").map(PathBuf::from),
            max_filesize,
            allowed_domains,
            job_timeout: self.seconds("DOWNLOAD_TIMEOUT_SECS", defaults::DOWNLOAD_TIMEOUT_SECS)?,
            probe_timeout: self.seconds("PROBE_TIMEOUT_SECS", defaults::PROBE_TIMEOUT_SECS)?,
            max_attempts: self.bounded_u32(
                "DOWNLOAD_MAX_ATTEMPTS",
                defaults::DOWNLOAD_MAX_ATTEMPTS,
                1,
                defaults::DOWNLOAD_MAX_ATTEMPTS_LIMIT,
            )?,
            initial_backoff: Duration::from_millis(defaults::RETRY_INITIAL_BACKOFF_MS),
            single_item_hosts,
        })
    }

    fn logging(&self) -> ConfigResult<LoggingSettings> {
        let format = match self.get("LOG_FORMAT") {
            None => None,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "json" => Some(LogOutput::Json),
                "pretty" => Some(LogOutput::Pretty),
                _ => return Err(ConfigError::invalid("LOG_FORMAT", &raw, "unknown_format")),
            },
        };
        Ok(LoggingSettings {
            level: self
                .get("LOG_LEVEL")
                .unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
            format,
        })
    }

    fn list(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(ToString::to_string)
                .collect()
        })
    }

    fn seconds(&self, name: &'static str, default: u64) -> ConfigResult<Duration> {
        let Some(raw) = self.get(name) else {
            return Ok(Duration::from_secs(default));
        };
        let secs = raw
            .parse::<u64>()
            .map_err(|_| ConfigError::invalid(name, &raw, "not_a_number"))?;
        if secs == 0 {
            return Err(ConfigError::invalid(name, &raw, "zero"));
        }
        Ok(Duration::from_secs(secs))
    }

    fn bounded_u32(
        &self,
        name: &'static str,
        default: u32,
        min: u32,
        max: u32,
    ) -> ConfigResult<u32> {
        let Some(raw) = self.get(name) else {
            return Ok(default);
        };
        let value = raw
            .parse::<u32>()
            .map_err(|_| ConfigError::invalid(name, &raw, "not_a_number"))?;
        if !(min..=max).contains(&value) {
            return Err(ConfigError::invalid(name, &raw, "out_of_range"));
        }
        Ok(value)
    }
}

fn normalize_origin(origin: &str) -> String {
    let trimmed = origin.trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

fn env_flag_value(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}
