//! sbpanel server entry point
//!
//! Opens the database, wires the gateway and serves until Ctrl-C. A
//! `restartApp` request stops the current gateway; the loop below builds a
//! fresh one on the same database and core process.

mod config;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sbpanel_gateway::{
    CommandCoreController, CoreController, DependenciesBuilder, GatewayServer, LogBuffer,
};
use sbpanel_storage::Database;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use config::PanelConfig;

const LOG_PREFIX: &str = "sbpanel";

/// Initialize tracing with console, file and in-memory logging
///
/// - Console: colored, compact format
/// - File: daily rotation under `<data dir>/logs`
/// - LogBuffer: recent lines served by the `logs` action
fn init_tracing(
    logs_dir: &Path,
    logs: &LogBuffer,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
    }

    // Creates files like: sbpanel.2026-01-22.log
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .build(logs_dir)
        .context("Failed to create log file appender")?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG takes precedence
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "info,sbpanel=debug,sbpanel_core=debug,sbpanel_gateway=debug,sbpanel_storage=debug",
        )
    });

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true);

    let buffer_layer = fmt::layer()
        .with_writer(logs.make_writer())
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .with(buffer_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = PanelConfig::from_env()?;

    let logs = LogBuffer::default();
    let _guard = init_tracing(&config.logs_dir(), &logs)?;
    info!("[Main] sbpanel v{} starting", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", config.data_dir))?;
    let database_path = config.database_path();
    let db = Arc::new(Mutex::new(Database::open(&database_path)?));
    info!("[Main] Database: {:?}", database_path);

    let core: Arc<dyn CoreController> = Arc::new(CommandCoreController::new(
        &config.core_bin,
        &config.core_config,
    ));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("[Main] Failed to listen for Ctrl-C: {}", e);
                return;
            }
            info!("[Main] Shutdown requested");
            shutdown.cancel();
        });
    }

    loop {
        // Cancelled by restartApp, or with the parent on shutdown
        let restart = shutdown.child_token();

        let dependencies = DependenciesBuilder::new()
            .with_database(db.clone())
            .with_core(core.clone())
            .with_log_buffer(logs.clone())
            .with_admin_password(&config.admin_password)
            .build()
            .map_err(anyhow::Error::msg)?;

        GatewayServer::new(config.gateway(), dependencies, restart)
            .run()
            .await?;

        if shutdown.is_cancelled() {
            break;
        }
        info!("[Main] Restarting gateway...");
    }

    info!("[Main] Bye");
    Ok(())
}
