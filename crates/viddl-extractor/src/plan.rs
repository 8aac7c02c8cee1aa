//! Invocation plans: argument lists for every tool call a job makes.
//!
//! # Design
//! - A plan is immutable. Retries rebuild it from the same inputs and a
//!   fallback rebuilds it with the default format; nothing is patched in place.
//! - Provider quirks live in a rule table keyed by domain rather than being
//!   scattered through the builders.
//! - The target URL is always the final argument.

use std::path::{Path, PathBuf};
use std::time::Duration;

use viddl_core::{FormatChoice, JobKind, TargetUrl};

use crate::formats::SizeHeuristic;

/// Format expression used for best-quality and fallback downloads.
pub const DEFAULT_FORMAT_EXPRESSION: &str = "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/bv*+ba/b";

/// One tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPlan {
    /// Arguments passed after the executable name.
    pub args: Vec<String>,
    /// Output template for producing plans.
    pub output_template: Option<PathBuf>,
    /// Wall-clock budget for this invocation.
    pub timeout: Duration,
}

/// `--extractor-args` values, chosen by whether cookies are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorArgs {
    /// Used when a cookies file is configured.
    pub with_cookies: String,
    /// Used otherwise.
    pub without_cookies: String,
}

/// Per-provider adjustments applied to every plan for matching hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRule {
    /// Domains the rule applies to (subdomains included).
    pub domains: Vec<String>,
    /// Format expression that replaces whatever the client asked for.
    pub format_override: Option<String>,
    /// Extra extractor arguments.
    pub extractor_args: Option<ExtractorArgs>,
    /// How missing format sizes are estimated.
    pub size_heuristic: SizeHeuristic,
}

impl ProviderRule {
    /// Rules for providers with known quirks.
    #[must_use]
    pub fn builtin() -> Vec<Self> {
        vec![
            Self {
                domains: vec!["youtube.com".into(), "youtu.be".into()],
                format_override: None,
                extractor_args: Some(ExtractorArgs {
                    with_cookies: "youtube:player_client=default,web_safari".into(),
                    without_cookies: "youtube:player_client=web_safari".into(),
                }),
                size_heuristic: SizeHeuristic::Resolution,
            },
            // H.264 baseline first so the file plays on every handset.
            Self {
                domains: vec!["instagram.com".into()],
                format_override: Some("1/best[vcodec^=avc]/best[ext=mp4]/best".into()),
                extractor_args: None,
                size_heuristic: SizeHeuristic::Duration,
            },
        ]
    }

    fn applies_to(&self, target: &TargetUrl) -> bool {
        self.domains.iter().any(|domain| target.host_matches(domain))
    }
}

/// Inputs shared by every plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSettings {
    /// Value for `--max-filesize`.
    pub max_filesize: String,
    /// Cookies file passed with `--cookies` when set.
    pub cookies_file: Option<PathBuf>,
    /// Hosts that only ever serve one item unless the URL names a list.
    pub single_item_hosts: Vec<String>,
}

/// Builds [`JobPlan`]s for a configured tool.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    settings: PlanSettings,
    rules: Vec<ProviderRule>,
}

impl PlanBuilder {
    /// Builder using `rules` for provider quirks.
    #[must_use]
    pub const fn new(settings: PlanSettings, rules: Vec<ProviderRule>) -> Self {
        Self { settings, rules }
    }

    fn rule_for(&self, target: &TargetUrl) -> Option<&ProviderRule> {
        self.rules.iter().find(|rule| rule.applies_to(target))
    }

    /// Format expression for `format` against `target`.
    #[must_use]
    pub fn format_expression(&self, target: &TargetUrl, format: &FormatChoice) -> String {
        if let Some(expr) = self
            .rule_for(target)
            .and_then(|rule| rule.format_override.as_ref())
        {
            return expr.clone();
        }
        match format {
            FormatChoice::Best => DEFAULT_FORMAT_EXPRESSION.to_string(),
            FormatChoice::Specific(id) => format!("{id}+ba/{id}"),
        }
    }

    /// Size heuristic for formats of `target`.
    #[must_use]
    pub fn size_heuristic(&self, target: &TargetUrl) -> SizeHeuristic {
        self.rule_for(target)
            .map_or(SizeHeuristic::Resolution, |rule| rule.size_heuristic)
    }

    /// True when the multi-item listing call can be skipped for `target`.
    #[must_use]
    pub fn skips_listing(&self, target: &TargetUrl) -> bool {
        !target.names_list()
            && self
                .settings
                .single_item_hosts
                .iter()
                .any(|host| target.host_matches(host))
    }

    /// Flat listing of a possibly multi-item target.
    #[must_use]
    pub fn listing_plan(&self, target: &TargetUrl, timeout: Duration) -> JobPlan {
        let mut args = strings(&["--flat-playlist", "--dump-json", "--no-warnings"]);
        self.push_cookies(&mut args);
        args.push(target.as_str().to_string());
        JobPlan {
            args,
            output_template: None,
            timeout,
        }
    }

    /// Full metadata for a single item.
    #[must_use]
    pub fn metadata_plan(&self, target: &TargetUrl, timeout: Duration) -> JobPlan {
        let mut args = strings(&["--dump-json", "--no-playlist", "--no-warnings"]);
        self.push_extractor_args(target, &mut args);
        self.push_cookies(&mut args);
        args.push(target.as_str().to_string());
        JobPlan {
            args,
            output_template: None,
            timeout,
        }
    }

    /// Download or audio extraction writing to `template`.
    ///
    /// [`JobKind::Probe`] produces a video plan.
    #[must_use]
    pub fn media_plan(
        &self,
        target: &TargetUrl,
        kind: JobKind,
        format: &FormatChoice,
        item_index: Option<u32>,
        template: &Path,
        timeout: Duration,
    ) -> JobPlan {
        let template_arg = template.to_string_lossy().into_owned();
        let mut args = match kind {
            JobKind::Audio(codec) => {
                let mut args = strings(&["-x", "--audio-format", codec.as_str(), "-o"]);
                args.push(template_arg);
                args
            }
            JobKind::Video | JobKind::Probe => {
                let mut args = vec!["-f".to_string(), self.format_expression(target, format)];
                args.push("-o".into());
                args.push(template_arg);
                args.extend(strings(&["--merge-output-format", "mp4"]));
                args
            }
        };
        args.extend(strings(&["--no-warnings", "--restrict-filenames"]));
        self.push_extractor_args(target, &mut args);
        match item_index {
            Some(index) => {
                args.push("--playlist-items".into());
                args.push(index.to_string());
            }
            None => args.push("--no-playlist".into()),
        }
        args.push("--max-filesize".into());
        args.push(self.settings.max_filesize.clone());
        self.push_cookies(&mut args);
        args.push(target.as_str().to_string());
        JobPlan {
            args,
            output_template: Some(template.to_path_buf()),
            timeout,
        }
    }

    /// Version query used as a liveness probe.
    #[must_use]
    pub fn version_plan(timeout: Duration) -> JobPlan {
        JobPlan {
            args: strings(&["--version"]),
            output_template: None,
            timeout,
        }
    }

    fn push_extractor_args(&self, target: &TargetUrl, args: &mut Vec<String>) {
        if let Some(extra) = self
            .rule_for(target)
            .and_then(|rule| rule.extractor_args.as_ref())
        {
            let value = if self.settings.cookies_file.is_some() {
                &extra.with_cookies
            } else {
                &extra.without_cookies
            };
            args.push("--extractor-args".into());
            args.push(value.clone());
        }
    }

    fn push_cookies(&self, args: &mut Vec<String>) {
        if let Some(cookies) = &self.settings.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.to_string_lossy().into_owned());
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use viddl_core::AudioCodec;

    fn allowed() -> Vec<String> {
        ["youtube.com", "youtu.be", "instagram.com", "vimeo.com"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn target(raw: &str) -> Result<TargetUrl> {
        Ok(TargetUrl::parse(raw, &allowed())?)
    }

    fn builder(cookies: Option<&str>) -> PlanBuilder {
        PlanBuilder::new(
            PlanSettings {
                max_filesize: "2G".into(),
                cookies_file: cookies.map(PathBuf::from),
                single_item_hosts: vec!["youtube.com".into(), "youtu.be".into()],
            },
            ProviderRule::builtin(),
        )
    }

    #[test]
    fn video_plan_for_generic_host() -> Result<()> {
        let url = target("https://vimeo.com/123")?;
        let plan = builder(None).media_plan(
            &url,
            JobKind::Video,
            &FormatChoice::Best,
            None,
            Path::new("/tmp/s_%(title).80s.%(ext)s"),
            Duration::from_secs(600),
        );
        assert_eq!(
            plan.args,
            strings(&[
                "-f",
                DEFAULT_FORMAT_EXPRESSION,
                "-o",
                "/tmp/s_%(title).80s.%(ext)s",
                "--merge-output-format",
                "mp4",
                "--no-warnings",
                "--restrict-filenames",
                "--no-playlist",
                "--max-filesize",
                "2G",
                "https://vimeo.com/123",
            ])
        );
        assert_eq!(
            plan.output_template.as_deref(),
            Some(Path::new("/tmp/s_%(title).80s.%(ext)s"))
        );
        Ok(())
    }

    #[test]
    fn specific_format_merges_best_audio() -> Result<()> {
        let url = target("https://vimeo.com/123")?;
        let expr = builder(None).format_expression(&url, &FormatChoice::Specific("137".into()));
        assert_eq!(expr, "137+ba/137");
        Ok(())
    }

    #[test]
    fn instagram_override_wins_over_requested_format() -> Result<()> {
        let url = target("https://www.instagram.com/reel/abc/")?;
        let plans = builder(None);
        let expr = plans.format_expression(&url, &FormatChoice::Specific("137".into()));
        assert_eq!(expr, "1/best[vcodec^=avc]/best[ext=mp4]/best");
        assert_eq!(plans.size_heuristic(&url), SizeHeuristic::Duration);
        Ok(())
    }

    #[test]
    fn youtube_extractor_args_follow_cookies() -> Result<()> {
        let url = target("https://youtu.be/xyz")?;
        let without = builder(None).metadata_plan(&url, Duration::from_secs(60));
        assert!(
            without
                .args
                .windows(2)
                .any(|pair| pair == ["--extractor-args", "youtube:player_client=web_safari"])
        );
        assert!(!without.args.contains(&"--cookies".to_string()));

        let with = builder(Some("/etc/cookies.txt")).metadata_plan(&url, Duration::from_secs(60));
        assert!(with.args.windows(2).any(
            |pair| pair == ["--extractor-args", "youtube:player_client=default,web_safari"]
        ));
        assert!(
            with.args
                .windows(2)
                .any(|pair| pair == ["--cookies", "/etc/cookies.txt"])
        );
        assert_eq!(with.args.last().map(String::as_str), Some("https://youtu.be/xyz"));
        Ok(())
    }

    #[test]
    fn audio_plan_selects_item_and_codec() -> Result<()> {
        let url = target("https://vimeo.com/album/9")?;
        let plan = builder(None).media_plan(
            &url,
            JobKind::Audio(AudioCodec::Flac),
            &FormatChoice::Best,
            Some(4),
            Path::new("/tmp/t"),
            Duration::from_secs(1),
        );
        assert_eq!(&plan.args[..4], strings(&["-x", "--audio-format", "flac", "-o"]).as_slice());
        assert!(!plan.args.contains(&"-f".to_string()));
        assert!(plan.args.windows(2).any(|pair| pair == ["--playlist-items", "4"]));
        assert!(!plan.args.contains(&"--no-playlist".to_string()));
        Ok(())
    }

    #[test]
    fn listing_is_skipped_only_for_single_item_urls() -> Result<()> {
        let plans = builder(None);
        assert!(plans.skips_listing(&target("https://www.youtube.com/watch?v=abc")?));
        assert!(!plans.skips_listing(&target("https://www.youtube.com/watch?v=abc&list=PL1")?));
        assert!(!plans.skips_listing(&target("https://youtube.com/playlist?list=PL1")?));
        assert!(!plans.skips_listing(&target("https://vimeo.com/123")?));
        Ok(())
    }

    #[test]
    fn listing_plan_has_no_provider_args() -> Result<()> {
        let url = target("https://youtube.com/playlist?list=PL1")?;
        let plan = builder(Some("c.txt")).listing_plan(&url, Duration::from_secs(60));
        assert_eq!(
            plan.args,
            strings(&[
                "--flat-playlist",
                "--dump-json",
                "--no-warnings",
                "--cookies",
                "c.txt",
                "https://youtube.com/playlist?list=PL1",
            ])
        );
        assert!(plan.output_template.is_none());
        Ok(())
    }
}
