use std::error::Error;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "RUNGS_LOG";

/// Flushes buffered log lines when dropped; keep it alive for the whole run.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Send tracing output to `log_path`; stdout is owned by the terminal UI.
pub fn init_logging(log_path: &Path) -> Result<FileLogGuard, Box<dyn Error + Send + Sync>> {
    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_path
        .file_name()
        .ok_or("log path has no file name")?
        .to_string_lossy()
        .into_owned();
    fs::create_dir_all(dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .try_init()?;
    Ok(FileLogGuard { _guard: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_log_file_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("rungs.log");

        // another test may have installed a global subscriber first
        let _guard = init_logging(&path);
        assert!(path.exists());
    }

    #[test]
    fn rejects_path_without_file_name() {
        assert!(init_logging(Path::new("/")).is_err());
    }
}
