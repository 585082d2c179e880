use std::io;
use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over everything; otherwise `-q` shows errors only, `-v`
/// switches to debug and `-vv` to trace, and the configured filter applies.
/// With `log_dir` set, output also goes to a daily-rolling file there. Keep
/// the returned guard alive until exit so buffered lines get flushed.
pub fn init_logging(
    verbose: u8,
    quiet: bool,
    default_filter: &str,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let fallback = match (quiet, verbose) {
        (true, _) => "error".to_string(),
        (false, 0) => default_filter.to_string(),
        (false, 1) => "reelmark=debug,info".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let stderr = fmt::layer().with_target(false).with_writer(io::stderr);
    let registry = Registry::default().with(filter).with(stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "reelmark.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}
