// ABOUTME: Tracing setup: env-filtered console output plus a daily rolling JSON log file.
// ABOUTME: The returned guard must be held for the life of the process to flush file logs.
use anyhow::Result;
use quickchat_core::paths;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "quickchat.log";

/// Initialise the global subscriber. `RUST_LOG` wins over `log_level`.
/// File logging is skipped when the log directory cannot be created.
pub fn init(log_level: &str, json: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_dir = paths::log_dir();
    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Warning: could not create log directory {}: {}",
                log_dir.display(),
                e
            );
            (None, None)
        }
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(guard)
}
