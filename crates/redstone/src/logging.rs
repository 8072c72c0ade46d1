use std::{fmt, path::Path, sync::Mutex};

use log::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{format::FmtSpan, time::ChronoLocal},
    layer::SubscriberExt,
};

pub const LOG_FILE: &str = "redstone.log";
const FILTER_ENV: &str = "REDSTONE_LOG";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error(transparent)]
    Logger(#[from] log::SetLoggerError),
    #[error("Open log file `{0}`")]
    Open(std::path::PathBuf, #[source] std::io::Error),
    #[error(transparent)]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };

    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// One line of `redstone.log`, without colour codes.
fn line(level: Level, target: &str, message: &fmt::Arguments) -> String {
    match level {
        Level::Error => format!("error: {message}"),
        Level::Warn => format!("warning: {message}"),
        Level::Info | Level::Debug | Level::Trace => format!(
            "{}[{}][{}] {}",
            jiff::Zoned::now().strftime("[%Y-%m-%d][%H:%M:%S]"),
            target,
            level,
            message
        ),
    }
}

/// Sends `log` records and `tracing` events to `<log_dir>/redstone.log`.
///
/// The terminal belongs to the menu, so nothing is written to stdout or stderr.
pub fn init(log_dir: &Path, verbose: bool) -> Result<(), LoggingError> {
    std::fs::create_dir_all(log_dir).map_err(|e| LoggingError::Open(log_dir.to_path_buf(), e))?;
    let path = log_dir.join(LOG_FILE);

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}", line(record.level(), record.target(), message)))
        })
        .level(level)
        .chain(fern::log_file(&path).map_err(|e| LoggingError::Open(path.clone(), e))?)
        .apply()?;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| LoggingError::Open(path.clone(), e))?;

    let subscriber = tracing_subscriber::Registry::default().with(filter(verbose)).with(
        tracing_subscriber::fmt::layer()
            .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S.%f".to_string()))
            .with_target(verbose)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_span_events(if verbose { FmtSpan::ENTER } else { FmtSpan::NONE }),
    );

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_lines_carry_no_escape_codes() {
        let error = line(Level::Error, "redstone", &format_args!("port {} busy", 25565));
        let info = line(Level::Info, "redstone::tunnel", &format_args!("ready"));

        assert_eq!(error, "error: port 25565 busy");
        assert!(info.ends_with("[redstone::tunnel][INFO] ready"));
        assert!(!info.contains('\x1b'));
    }

    #[test]
    fn second_init_reports_the_installed_logger() {
        let dir = tempfile::tempdir().unwrap();

        let _ = init(dir.path(), false);

        assert!(matches!(init(dir.path(), false), Err(LoggingError::Logger(_))));
        assert!(dir.path().join(LOG_FILE).is_file());
    }
}
