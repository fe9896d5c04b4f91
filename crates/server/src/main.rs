use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dashcoder_core::{
    install_shutdown_handler, load_config, load_config_from_env, validate_config, Config,
    EncodeOrchestrator, FfmpegTranscoder, HostIdentity, JobStore, LogFormat, OrchestratorConfig,
    OutputSink, S3Store, SanitizedConfig, Transcoder,
};
use dashcoder_server::api::create_router;
use dashcoder_server::state::AppState;

/// Environment variable naming the config file.
const CONFIG_PATH_VAR: &str = "DASHCODER_CONFIG";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // The subscriber may not be installed yet.
        eprintln!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = read_config()?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(config.logging.format);
    info!(
        config = %serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default(),
        "Configuration loaded"
    );

    let host = HostIdentity::resolve(config.host.identity.as_deref())
        .context("Failed to determine host identity")?;
    info!(host = %host, "Host identity resolved");

    let source = Arc::new(S3Store::source(&config.storage));
    JobStore::check_connectivity(source.as_ref())
        .await
        .with_context(|| format!("Source bucket {} unreachable", source.bucket()))?;
    let output = Arc::new(S3Store::output(&config.storage));
    OutputSink::check_connectivity(output.as_ref())
        .await
        .with_context(|| format!("Output bucket {} unreachable", output.bucket()))?;
    info!(
        source_bucket = source.bucket(),
        output_bucket = output.bucket(),
        "Object storage reachable"
    );

    let transcoder = Arc::new(FfmpegTranscoder::new(config.transcoder.clone()));
    transcoder
        .validate()
        .await
        .context("ffmpeg is not usable")?;

    let cancel = install_shutdown_handler().context("Failed to install signal handlers")?;

    let orchestrator = EncodeOrchestrator::new(
        OrchestratorConfig::from(&config.lease),
        source,
        output,
        transcoder,
        host.clone(),
    );

    let state = Arc::new(AppState::new(
        config.clone(),
        host,
        orchestrator.status_handle(),
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Operations endpoint listening on {}", addr);

    let server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(cancel.clone().cancelled_owned())
            .into_future(),
    );

    let status = orchestrator
        .run(cancel.clone())
        .await
        .context("Encode orchestrator failed")?;
    info!(
        claims = status.claims,
        encodes_succeeded = status.worker.encodes_succeeded,
        encodes_failed = status.worker.encodes_failed,
        leases_released = status.released.map(|r| r.released),
        "Shutdown complete"
    );

    // The orchestrator only returns after cancellation, so the server is
    // already draining.
    cancel.cancel();
    server
        .await
        .context("Operations server task failed")?
        .context("Operations server error")?;

    Ok(())
}

/// Config file from `DASHCODER_CONFIG`, else `./config.toml` if present,
/// else environment variables alone.
fn read_config() -> Result<Config> {
    let path = std::env::var(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .ok()
        .or_else(|| {
            let default = PathBuf::from("config.toml");
            default.exists().then_some(default)
        });

    match path {
        Some(path) => load_config(&path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None => load_config_from_env().context("Failed to load config from environment"),
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}
