use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use seedpull_config::DaemonConfig;
use seedpull_fsops::{FsOpsService, SystemCommandRunner};
use seedpull_state::JsonFileStore;
use seedpull_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, build_sha};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::error::{AppError, AppResult};
use crate::orchestrator::{Orchestrator, OrchestratorDeps};

/// Entry point for the daemon: parse arguments, load configuration and run.
///
/// # Errors
///
/// Returns an error if configuration or telemetry setup fails, or when
/// `--once` was given and the single cycle failed.
pub async fn run_app() -> AppResult<()> {
    run_with(Cli::parse()).await
}

/// Boot sequence driven by already parsed arguments.
pub(crate) async fn run_with(cli: Cli) -> AppResult<()> {
    let config = load_config(&cli.config)?;
    let logging = LoggingConfig {
        level: &config.log_level,
        format: LogFormat::from_label(config.log_format.as_deref()),
        build_sha: build_sha(),
    };
    seedpull_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(if cli.once { "once" } else { "daemon" });

    info!(
        config = %cli.config.display(),
        client = config.client.label(),
        watch_dirs = config.watch_dirs.len(),
        poll_interval_secs = config.poll_interval.as_secs(),
        "seedpull starting"
    );

    let orchestrator = build_orchestrator(&config)?;
    if cli.once {
        orchestrator.run_cycle().await?;
        return Ok(());
    }
    orchestrator
        .run_until(config.poll_interval, shutdown_signal())
        .await;
    info!("seedpull stopped");
    Ok(())
}

fn load_config(path: &Path) -> AppResult<DaemonConfig> {
    seedpull_config::load_from_path(path).map_err(|err| AppError::config("config.load", err))
}

pub(crate) fn build_orchestrator(config: &DaemonConfig) -> AppResult<Orchestrator> {
    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let client = seedpull_torrent_rpc::connect(&config.client)
        .map_err(|err| AppError::torrent("torrent_client.connect", err))?;
    let fsops = FsOpsService::new(
        Arc::new(SystemCommandRunner),
        config.sftp.clone(),
        config.transfer,
        config.chmod,
        metrics.clone(),
    );
    Ok(Orchestrator::new(OrchestratorDeps {
        client,
        store: Arc::new(JsonFileStore::new(config.state_json.clone())),
        fsops,
        metrics,
        watch_dirs: config.watch_dirs.clone(),
        metrics_textfile: config.metrics_textfile.clone(),
    }))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(err) = result {
                            warn!(error = %err, "failed to listen for ctrl-c");
                        }
                    }
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(err) => warn!(error = %err, "failed to install SIGTERM handler"),
        }
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
