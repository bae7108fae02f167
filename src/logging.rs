//! Diagnostic logging. The TUI owns the terminal, so everything goes to a
//! file under the platform data directory; `RUST_LOG` overrides the level.

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use std::fs::File;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Keeps the logging worker alive; hold it until exit.
pub struct LogGuard {
    _guard: WorkerGuard,
}

pub fn init() -> Result<Option<LogGuard>> {
    let Some(dir) = dirs::data_dir().map(|d| d.join("wavescope")) else {
        return Ok(None);
    };
    std::fs::create_dir_all(&dir).wrap_err("failed to create log directory")?;
    let path = dir.join("wavescope.log");
    let file = File::create(&path).wrap_err_with(|| format!("creating {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    Ok(Some(LogGuard { _guard: guard }))
}
