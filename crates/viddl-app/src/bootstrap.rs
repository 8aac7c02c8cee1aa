use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use viddl_api::{
    ApiDependencies, ApiServer, ApiSettings, ConcurrencyAdmission, RateAdmission, RateSettings,
};
use viddl_config::{AppConfig, LogOutput};
use viddl_extractor::{
    JobOrchestrator, OrchestratorSettings, PlanBuilder, PlanSettings, ProcessRunner,
    ProviderRule, RetryPolicy,
};
use viddl_fsops::ArtifactStore;
use viddl_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, build_sha};

use crate::error::{AppError, AppResult};

/// Wired services ready to serve, plus the background tasks they depend on.
pub(crate) struct Services {
    api: ApiServer,
    addr: SocketAddr,
    background: Vec<JoinHandle<()>>,
}

/// Load configuration from the environment, install logging, and serve until
/// the listener fails or the process is interrupted.
///
/// # Errors
///
/// Returns an [`AppError`] when configuration, logging, the artifact directory,
/// or the listener fails.
pub async fn run_app() -> AppResult<()> {
    let config = AppConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
    let format = match config.logging.format {
        Some(LogOutput::Json) => LogFormat::Json,
        Some(LogOutput::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    };
    viddl_telemetry::init_logging(&LoggingConfig {
        level: &config.logging.level,
        format,
        build_sha: build_sha(),
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("bootstrap");

    info!("viddl bootstrap starting");
    let telemetry = Metrics::new().map_err(|err| AppError::telemetry("metrics.new", err))?;
    let Services {
        api,
        addr,
        background,
    } = assemble(&config, telemetry)?;

    info!(addr = %addr, "Launching API listener");
    let serve_result = tokio::select! {
        result = api.serve(addr) => result,
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
            Ok(())
        }
    };

    for task in background {
        task.abort();
    }
    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

/// Build every service from `config` and start the background sweepers.
pub(crate) fn assemble(config: &AppConfig, telemetry: Metrics) -> AppResult<Services> {
    let store = ArtifactStore::new(config.lifecycle.tmp_dir.clone(), telemetry.clone());
    store
        .ensure_dir()
        .map_err(|err| AppError::storage("store.ensure_dir", err))?;
    let sweeper =
        store.start_periodic_sweep(config.lifecycle.sweep_interval, config.lifecycle.max_age);

    let admission = &config.admission;
    let rate = Arc::new(RateAdmission::new(
        RateSettings {
            burst: admission.rate_burst,
            refill_interval: admission.refill_interval,
            idle_ttl: admission.idle_ttl,
        },
        telemetry.clone(),
    ));
    let evictor = rate.spawn_evictor(admission.evict_interval);
    let concurrency = Arc::new(ConcurrencyAdmission::new(
        admission.max_concurrent_per_client,
    ));

    let extractor = &config.extractor;
    let plans = PlanBuilder::new(
        PlanSettings {
            max_filesize: extractor.max_filesize.clone(),
            cookies_file: extractor.cookies_file.clone(),
            single_item_hosts: extractor.single_item_hosts.clone(),
        },
        ProviderRule::builtin(),
    );
    let orchestrator = JobOrchestrator::new(
        Arc::new(ProcessRunner::new(extractor.binary.clone())),
        store.clone(),
        plans,
        OrchestratorSettings {
            binary: extractor.binary.clone(),
            job_timeout: extractor.job_timeout,
            probe_timeout: extractor.probe_timeout,
            retry: RetryPolicy {
                max_attempts: extractor.max_attempts,
                initial_backoff: extractor.initial_backoff,
            },
        },
        telemetry.clone(),
    );

    let api = ApiServer::new(ApiDependencies {
        runner: Arc::new(orchestrator),
        store,
        rate,
        concurrency,
        telemetry,
        settings: ApiSettings {
            allowed_domains: extractor.allowed_domains.clone(),
            allowed_origins: config.http.allowed_origins.clone(),
            api_key: config.http.api_key.clone(),
            trust_forwarded_for: config.http.trust_forwarded_for,
            removal_delay: config.lifecycle.removal_delay,
        },
    });
    info!(
        tmp_dir = %config.lifecycle.tmp_dir.display(),
        binary = %extractor.binary,
        max_concurrent = admission.max_concurrent_per_client,
        auth = config.http.api_key.is_some(),
        "services assembled"
    );

    Ok(Services {
        api,
        addr: SocketAddr::new(config.http.bind_addr, config.http.port),
        background: vec![sweeper, evictor],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn config_for(tmp: &TempDir) -> Result<AppConfig> {
        let tmp_dir = tmp.path().join("artifacts").display().to_string();
        Ok(AppConfig::from_lookup(|name| match name {
            "TMP_DIR" => Some(tmp_dir.clone()),
            "PORT" => Some("5055".into()),
            "BIND_ADDR" => Some("127.0.0.1".into()),
            _ => None,
        })?)
    }

    #[tokio::test]
    async fn assemble_prepares_storage_and_background_tasks() -> Result<()> {
        let tmp = TempDir::new()?;
        let config = config_for(&tmp)?;
        let services = assemble(&config, Metrics::new()?)?;

        assert!(tmp.path().join("artifacts").is_dir());
        assert_eq!(services.addr, "127.0.0.1:5055".parse()?);
        assert_eq!(services.background.len(), 2);
        for task in &services.background {
            assert!(!task.is_finished());
            task.abort();
        }
        Ok(())
    }

    #[tokio::test]
    async fn unusable_tmp_dir_fails_bootstrap() -> Result<()> {
        let tmp = TempDir::new()?;
        let blocker = tmp.path().join("artifacts");
        std::fs::write(&blocker, b"not a directory")?;
        let config = config_for(&tmp)?;

        let err = assemble(&config, Metrics::new()?)
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected storage failure"))?;
        assert!(matches!(err, AppError::Storage { .. }));
        Ok(())
    }
}
