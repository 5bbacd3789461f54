// src/common/logger.rs

//! Logging setup.
//!
//! Console output always; a daily rolling file when a log directory is configured.
//! The returned guard owns the background file writer and must live until shutdown.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub struct LoggerGuard {
    file_writer: Option<WorkerGuard>,
}

impl LoggerGuard {
    pub fn writes_to_file(&self) -> bool {
        self.file_writer.is_some()
    }
}

pub fn init_logger(level: &str, log_dir: Option<&str>) -> anyhow::Result<LoggerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;

    let console = fmt::layer().with_target(false).compact();

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(Path::new(dir))
                .with_context(|| format!("failed to create log directory '{dir}'"))?;
            let appender = tracing_appender::rolling::daily(dir, "field-service.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("a global logger is already installed")?;

    Ok(LoggerGuard { file_writer: guard })
}
