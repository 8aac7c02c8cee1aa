//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, warn};
use viddl_telemetry::build_sha;

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::auth::require_api_key;
use crate::http::constants::{
    CORS_MAX_AGE_SECS, HEADER_API_KEY, HEADER_REQUEST_ID, SECURITY_HEADERS,
};
use crate::http::gates::{concurrency_gate, rate_gate};
use crate::http::health::{health, metrics};
use crate::http::jobs::{download, extract_audio, media_info};
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::{ApiDependencies, ApiState};

/// Axum router wrapper that hosts the viddl API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Assemble routes, admission middleware, and the tracing stack.
    #[must_use]
    pub fn new(deps: ApiDependencies) -> Self {
        let state = Arc::new(ApiState::from(deps));
        let cors_layer = cors_layer(&state.settings.allowed_origins);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(viddl_telemetry::set_request_id_layer())
            .layer(viddl_telemetry::propagate_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(state.telemetry.clone()));

        let router = SECURITY_HEADERS.iter().fold(
            Self::build_router(&state),
            |router, &(name, value)| {
                router.layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                ))
            },
        );
        let router = router
            .layer(cors_layer)
            .layer(layered)
            .with_state(state);

        Self { router }
    }

    /// `/api/*` runs behind the API key check, then the rate gate; jobs that
    /// produce files also pass the concurrency gate. Probe responses are
    /// compressed, file transfers are not.
    fn build_router(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let probe = Router::new()
            .route("/api/info", post(media_info))
            .layer(CompressionLayer::new());
        let transfers = Router::new()
            .route("/api/download", post(download))
            .route("/api/audio", post(extract_audio))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                concurrency_gate,
            ));
        let api = probe
            .merge(transfers)
            .route_layer(middleware::from_fn_with_state(state.clone(), rate_gate))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_api_key,
            ));

        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .merge(api)
    }

    /// Serve the API on `addr` until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] when the listener cannot be bound and
    /// [`ApiServerError::Serve`] when the server loop exits with an error.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(addr = %addr, "API listener bound");
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(origin = %origin, error = %err, "ignoring unusable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_API_KEY)])
        .allow_credentials(true)
        .expose_headers([CONTENT_DISPOSITION])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{ConcurrencyAdmission, RateAdmission, RateSettings};
    use crate::state::ApiSettings;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::http::{Response, StatusCode};
    use serde_json::{Value, json};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use viddl_core::{
        Artifact, ClientKey, FormatOption, JobError, JobKind, JobOutcome, JobRequest, JobResult,
        JobRunner, MediaEntry, MediaInfo, MultiItemSummary,
    };
    use viddl_fsops::ArtifactStore;
    use viddl_telemetry::{Metrics, current_request_id, current_route};

    const PEER: &str = "192.0.2.10:40000";

    /// Request id and route each job observed, in call order.
    type SeenContexts = Arc<Mutex<Vec<(Option<String>, Option<String>)>>>;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        MultiItem,
        Fail,
        ToolMissing,
    }

    struct FakeRunner {
        behavior: Behavior,
        root: PathBuf,
        contexts: SeenContexts,
    }

    #[async_trait]
    impl JobRunner for FakeRunner {
        async fn run(&self, request: JobRequest) -> JobResult<JobOutcome> {
            if let Ok(mut contexts) = self.contexts.lock() {
                contexts.push((current_request_id(), current_route()));
            }
            match (self.behavior, request.kind()) {
                (Behavior::Fail, _) => Err(JobError::ExtractionFailed {
                    operation: "video",
                    attempts: 3,
                }),
                (Behavior::ToolMissing, _) => Err(JobError::ToolUnavailable {
                    binary: "yt-dlp".into(),
                    source: None,
                }),
                (Behavior::MultiItem, JobKind::Probe) => {
                    Ok(JobOutcome::MultiItem(MultiItemSummary::new(vec![
                        MediaEntry {
                            index: 1,
                            title: "first".into(),
                            thumbnail: String::new(),
                            duration: Some(10.0),
                        },
                        MediaEntry {
                            index: 2,
                            title: "second".into(),
                            thumbnail: String::new(),
                            duration: None,
                        },
                    ])))
                }
                (_, JobKind::Probe) => Ok(JobOutcome::Info(MediaInfo {
                    title: "Clip".into(),
                    thumbnail: "https://img.test/t.jpg".into(),
                    duration: Some(42.0),
                    uploader: "someone".into(),
                    formats: vec![FormatOption {
                        format_id: "137".into(),
                        ext: "mp4".into(),
                        quality: "1080p".into(),
                        filesize: 1024,
                        size_estimated: false,
                    }],
                })),
                (_, kind) => {
                    let (name, content_type) = match kind {
                        JobKind::Audio(codec) => (
                            format!("Clip.{}", codec.as_str()),
                            codec.content_type(),
                        ),
                        _ => ("Clip.mp4".to_string(), "video/mp4"),
                    };
                    let path = self.root.join(format!("session_{name}"));
                    let bytes = vec![7_u8; 200_000];
                    tokio::fs::write(&path, &bytes)
                        .await
                        .map_err(|err| JobError::io("test.write", &path, err))?;
                    Ok(JobOutcome::Artifact(Artifact {
                        path,
                        size: 200_000,
                        content_type,
                        display_name: name,
                    }))
                }
            }
        }

        async fn tool_version(&self) -> JobResult<String> {
            match self.behavior {
                Behavior::ToolMissing => Err(JobError::ToolUnavailable {
                    binary: "yt-dlp".into(),
                    source: None,
                }),
                _ => Ok("2024.10.07".into()),
            }
        }
    }

    struct Harness {
        server: ApiServer,
        contexts: SeenContexts,
        concurrency: Arc<ConcurrencyAdmission>,
        telemetry: Metrics,
        tmp: TempDir,
    }

    fn harness(behavior: Behavior, burst: u32, api_key: Option<&str>) -> Result<Harness> {
        let tmp = TempDir::new()?;
        let telemetry = Metrics::new()?;
        let store = ArtifactStore::new(tmp.path(), telemetry.clone());
        let concurrency = Arc::new(ConcurrencyAdmission::new(2));
        let contexts = Arc::new(Mutex::new(Vec::new()));
        let server = ApiServer::new(ApiDependencies {
            runner: Arc::new(FakeRunner {
                behavior,
                root: tmp.path().to_path_buf(),
                contexts: Arc::clone(&contexts),
            }),
            store,
            rate: Arc::new(RateAdmission::new(
                RateSettings {
                    burst,
                    refill_interval: Duration::from_secs(20),
                    idle_ttl: Duration::from_secs(1800),
                },
                telemetry.clone(),
            )),
            concurrency: Arc::clone(&concurrency),
            telemetry: telemetry.clone(),
            settings: ApiSettings {
                allowed_domains: vec!["youtube.com".into(), "vimeo.com".into()],
                allowed_origins: vec!["https://app.viddl.test".into()],
                api_key: api_key.map(str::to_string),
                trust_forwarded_for: false,
                removal_delay: Duration::from_millis(50),
            },
        });
        Ok(Harness {
            server,
            contexts,
            concurrency,
            telemetry,
            tmp,
        })
    }

    fn post_json(path: &str, body: &Value) -> Result<Request<Body>> {
        let mut req = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body)?))?;
        req.extensions_mut().insert(ConnectInfo(PEER.parse::<SocketAddr>()?));
        Ok(req)
    }

    fn get_request(path: &str) -> Result<Request<Body>> {
        let mut req = Request::builder().uri(path).body(Body::empty())?;
        req.extensions_mut().insert(ConnectInfo(PEER.parse::<SocketAddr>()?));
        Ok(req)
    }

    async fn send(server: &ApiServer, req: Request<Body>) -> Result<Response<Body>> {
        Ok(server.router().clone().oneshot(req).await?)
    }

    async fn json_body(response: Response<Body>) -> Result<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn header<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    #[tokio::test]
    async fn info_returns_metadata_with_rate_and_security_headers() -> Result<()> {
        let harness = harness(Behavior::Succeed, 5, None)?;
        let response = send(
            &harness.server,
            post_json(
                "/api/info",
                &json!({"url": "https://www.youtube.com/watch?v=abc"}),
            )?,
        )
        .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-limit"), Some("5"));
        assert_eq!(header(&response, "x-ratelimit-remaining"), Some("4"));
        assert_eq!(header(&response, "x-frame-options"), Some("DENY"));
        assert_eq!(header(&response, "x-content-type-options"), Some("nosniff"));
        assert!(header(&response, "x-request-id").is_some());

        let body = json_body(response).await?;
        assert_eq!(body["title"], json!("Clip"));
        assert_eq!(body["is_multi_video"], json!(false));
        assert_eq!(body["formats"][0]["quality"], json!("1080p"));
        Ok(())
    }

    #[tokio::test]
    async fn caller_request_id_is_echoed_and_visible_to_jobs() -> Result<()> {
        let harness = harness(Behavior::Succeed, 5, None)?;
        let mut req = post_json("/api/info", &json!({"url": "https://vimeo.com/1"}))?;
        req.headers_mut()
            .insert(HEADER_REQUEST_ID, HeaderValue::from_static("req-abc"));
        let response = send(&harness.server, req).await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-request-id"), Some("req-abc"));
        let contexts = harness
            .contexts
            .lock()
            .map_err(|_| anyhow!("context log poisoned"))?
            .clone();
        assert_eq!(
            contexts,
            vec![(Some("req-abc".to_string()), Some("/api/info".to_string()))]
        );
        Ok(())
    }

    #[tokio::test]
    async fn unknown_paths_are_counted_under_one_label() -> Result<()> {
        let harness = harness(Behavior::Succeed, 5, None)?;
        let response = send(&harness.server, get_request("/wp-login.php")?).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(header(&response, "x-request-id").is_some());

        let rendered = harness.telemetry.render()?;
        assert!(rendered.contains(r#"route="unmatched""#));
        assert!(!rendered.contains("wp-login"));
        Ok(())
    }

    #[tokio::test]
    async fn info_reports_multi_item_targets() -> Result<()> {
        let harness = harness(Behavior::MultiItem, 5, None)?;
        let response = send(
            &harness.server,
            post_json(
                "/api/info",
                &json!({"url": "https://www.youtube.com/playlist?list=PL1"}),
            )?,
        )
        .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["is_multi_video"], json!(true));
        assert_eq!(body["title"], json!("Multiple videos (2)"));
        assert_eq!(body["multi_videos"][1]["index"], json!(2));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_input_is_a_problem_document() -> Result<()> {
        let harness = harness(Behavior::Succeed, 10, None)?;

        let foreign = send(
            &harness.server,
            post_json("/api/info", &json!({"url": "https://evil.test/x"}))?,
        )
        .await?;
        assert_eq!(foreign.status(), StatusCode::BAD_REQUEST);
        let body = json_body(foreign).await?;
        assert_eq!(body["type"], json!("https://viddl.dev/problems/bad-request"));
        assert_eq!(body["invalid_params"][0]["pointer"], json!("/url"));

        let missing = send(&harness.server, post_json("/api/download", &json!({}))?).await?;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(missing).await?["detail"], json!("URL is required"));

        let bad_format = send(
            &harness.server,
            post_json(
                "/api/download",
                &json!({"url": "https://vimeo.com/1", "format": "137;rm -rf"}),
            )?,
        )
        .await?;
        assert_eq!(bad_format.status(), StatusCode::BAD_REQUEST);

        let malformed = Request::builder()
            .method(Method::POST)
            .uri("/api/info")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))?;
        let response = send(&harness.server, malformed).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_bucket_returns_429_with_retry_hint() -> Result<()> {
        let harness = harness(Behavior::Succeed, 2, None)?;
        let body = json!({"url": "https://vimeo.com/1"});
        for _ in 0..2 {
            let ok = send(&harness.server, post_json("/api/info", &body)?).await?;
            assert_eq!(ok.status(), StatusCode::OK);
        }

        let refused = send(&harness.server, post_json("/api/info", &body)?).await?;
        assert_eq!(refused.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&refused, "retry-after"), Some("20"));
        assert_eq!(header(&refused, "x-ratelimit-remaining"), Some("0"));
        let problem = json_body(refused).await?;
        assert_eq!(
            problem["type"],
            json!("https://viddl.dev/problems/rate-limited")
        );
        assert_eq!(harness.telemetry.snapshot().rate_rejections_total, 1);

        let health = send(&harness.server, get_request("/health")?).await?;
        assert_eq!(health.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn busy_client_is_refused_before_the_job_runs() -> Result<()> {
        let harness = harness(Behavior::Succeed, 10, None)?;
        let key = ClientKey::new("192.0.2.10");
        let held: Vec<_> = (0..2)
            .filter_map(|_| harness.concurrency.try_acquire(key.clone()))
            .collect();
        assert_eq!(held.len(), 2);

        let refused = send(
            &harness.server,
            post_json("/api/download", &json!({"url": "https://vimeo.com/1"}))?,
        )
        .await?;
        assert_eq!(refused.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            json_body(refused).await?["type"],
            json!("https://viddl.dev/problems/concurrency-limited")
        );
        assert_eq!(harness.telemetry.snapshot().concurrency_rejections_total, 1);

        let probe = send(
            &harness.server,
            post_json("/api/info", &json!({"url": "https://vimeo.com/1"}))?,
        )
        .await?;
        assert_eq!(probe.status(), StatusCode::OK);

        drop(held);
        assert_eq!(harness.concurrency.in_flight(&key), 0);
        Ok(())
    }

    #[tokio::test]
    async fn download_streams_artifact_and_releases_slot() -> Result<()> {
        let harness = harness(Behavior::Succeed, 10, None)?;
        let key = ClientKey::new("192.0.2.10");
        let response = send(
            &harness.server,
            post_json(
                "/api/download",
                &json!({"url": "https://vimeo.com/1", "format": "137"}),
            )?,
        )
        .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "content-type"), Some("video/mp4"));
        assert_eq!(header(&response, "content-length"), Some("200000"));
        assert_eq!(
            header(&response, "content-disposition"),
            Some("attachment; filename=\"Clip.mp4\"")
        );
        assert_eq!(header(&response, "content-description"), Some("File Transfer"));
        assert_eq!(harness.concurrency.in_flight(&key), 1);

        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(bytes.len(), 200_000);
        assert_eq!(harness.concurrency.in_flight(&key), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!harness.tmp.path().join("session_Clip.mp4").exists());
        Ok(())
    }

    #[tokio::test]
    async fn audio_uses_requested_codec_or_mp3() -> Result<()> {
        let harness = harness(Behavior::Succeed, 10, None)?;
        let opus = send(
            &harness.server,
            post_json(
                "/api/audio",
                &json!({"url": "https://vimeo.com/1", "audio_format": "opus"}),
            )?,
        )
        .await?;
        assert_eq!(opus.status(), StatusCode::OK);
        assert_eq!(header(&opus, "content-type"), Some("audio/opus"));

        let fallback = send(
            &harness.server,
            post_json(
                "/api/audio",
                &json!({"url": "https://vimeo.com/1", "audio_format": "exe"}),
            )?,
        )
        .await?;
        assert_eq!(header(&fallback, "content-type"), Some("audio/mpeg"));
        Ok(())
    }

    #[tokio::test]
    async fn extraction_failures_hide_tool_diagnostics() -> Result<()> {
        let harness = harness(Behavior::Fail, 10, None)?;
        let response = send(
            &harness.server,
            post_json("/api/download", &json!({"url": "https://vimeo.com/1"}))?,
        )
        .await?;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await?;
        assert_eq!(body["detail"], json!("operation failed"));
        assert_eq!(
            harness
                .concurrency
                .in_flight(&ClientKey::new("192.0.2.10")),
            0
        );
        Ok(())
    }

    #[tokio::test]
    async fn api_key_guards_jobs_but_not_health() -> Result<()> {
        let harness = harness(Behavior::Succeed, 10, Some("s3cret"))?;
        let body = json!({"url": "https://vimeo.com/1"});

        let anonymous = send(&harness.server, post_json("/api/info", &body)?).await?;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let mut wrong = post_json("/api/info", &body)?;
        wrong
            .headers_mut()
            .insert(HEADER_API_KEY, HeaderValue::from_static("nope"));
        let wrong = send(&harness.server, wrong).await?;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let mut keyed = post_json("/api/info", &body)?;
        keyed
            .headers_mut()
            .insert(HEADER_API_KEY, HeaderValue::from_static("s3cret"));
        let keyed = send(&harness.server, keyed).await?;
        assert_eq!(keyed.status(), StatusCode::OK);

        let queried = send(&harness.server, post_json("/api/info?api_key=s3cret", &body)?).await?;
        assert_eq!(queried.status(), StatusCode::OK);

        let health = send(&harness.server, get_request("/health")?).await?;
        assert_eq!(health.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn health_reports_tool_version_or_unavailability() -> Result<()> {
        let healthy = harness(Behavior::Succeed, 10, None)?;
        let response = send(&healthy.server, get_request("/health")?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["version"], json!("2024.10.07"));

        let broken = harness(Behavior::ToolMissing, 10, None)?;
        let response = send(&broken.server, get_request("/health")?).await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await?;
        assert_eq!(body["status"], json!("unhealthy"));
        assert_eq!(body["error"], json!("yt-dlp not available"));
        Ok(())
    }

    #[tokio::test]
    async fn metrics_endpoint_exposes_prometheus_text() -> Result<()> {
        let harness = harness(Behavior::Succeed, 10, None)?;
        let _ = send(
            &harness.server,
            post_json("/api/info", &json!({"url": "https://vimeo.com/1"}))?,
        )
        .await?;
        let response = send(&harness.server, get_request("/metrics")?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header(&response, "content-type"),
            Some("text/plain; version=0.0.4")
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let text = String::from_utf8(bytes.to_vec()).map_err(|err| anyhow!(err))?;
        assert!(text.contains("http_requests_total"));
        Ok(())
    }
}
