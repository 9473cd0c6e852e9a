use std::env;
use std::sync::OnceLock;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// Keeps the non-blocking file writer alive for the process lifetime
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize logging with a configurable destination.
/// `LOG_DESTINATION=console` logs to stdout; anything else logs to
/// daily rotating files under `LOG_DIR` (default `./logs`).
pub fn init_logging() -> Result<()> {
    let log_destination = env::var("LOG_DESTINATION").unwrap_or_else(|_| "console".to_string());

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    match log_destination.to_lowercase().as_str() {
        "console" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stdout)
                        .with_ansi(true)
                        .with_target(false),
                )
                .init();
            info!("Logging to console (stdout)");
        }
        _ => {
            let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
            let log_file_prefix =
                env::var("LOG_FILE_PREFIX").unwrap_or_else(|_| "suitale".to_string());

            std::fs::create_dir_all(&log_dir).map_err(|e| {
                anyhow::anyhow!("Failed to create log directory '{}': {}", log_dir, e)
            })?;

            let file_appender = rolling::daily(&log_dir, &log_file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = FILE_GUARD.set(guard);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(false),
                )
                .init();
            info!("Logging to daily rotating files in {}", log_dir);
        }
    }

    Ok(())
}
