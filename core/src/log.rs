//! Logger and logging macros
//!
//! For the macros to properly compile, the calling crate must add a dependency to
//! crate log (ie. `log.workspace = true`).

pub use log::{Level, LevelFilter};

mod appender;
mod consts;
mod logger;

use appender::AppenderSpec;
use consts::{CONSOLE_APPENDER, DEFAULT_LOGGER_ENV, ERR_LOG_FILE_APPENDER, ERR_LOG_FILE_NAME, LOG_FILE_APPENDER, LOG_FILE_NAME};
use log4rs::config::{Config, Root};
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum LogError {
    #[error("invalid log directory path {0}")]
    InvalidPath(String),

    #[error("appender error: {0}")]
    Appender(String),

    #[error("logger config error: {0}")]
    Config(String),

    #[error("logger already initialized")]
    AlreadyInitialized,
}

/// Initializes the global logger.
///
/// `filters` follows the `RUST_LOG` syntax and is applied on top of the `RUST_LOG` environment
/// variable. When `log_dir` is provided, all records are also written to a rolling log file and
/// warnings and errors to a dedicated rolling error log file.
pub fn init_logger(log_dir: Option<&str>, filters: &str) -> Result<(), LogError> {
    let loggers = logger::Builder::new().parse_env(DEFAULT_LOGGER_ENV).parse_expression(filters).build(LevelFilter::Info);

    let mut stdout_appender = AppenderSpec::console(CONSOLE_APPENDER, None);
    let mut file_appender = log_dir.map(|x| AppenderSpec::roller(LOG_FILE_APPENDER, None, x, LOG_FILE_NAME)).transpose()?;
    let mut err_file_appender =
        log_dir.map(|x| AppenderSpec::roller(ERR_LOG_FILE_APPENDER, Some(LevelFilter::Warn), x, ERR_LOG_FILE_NAME)).transpose()?;
    let mut appenders = [Some(&mut stdout_appender), file_appender.as_mut(), err_file_appender.as_mut()];

    let names = appenders.iter().flatten().map(|x| x.name).collect::<Vec<_>>();
    let config = Config::builder()
        .appenders(appenders.iter_mut().flatten().filter_map(|x| x.appender()))
        .loggers(loggers.items())
        .build(Root::builder().appenders(names).build(loggers.root_level()))
        .map_err(|err| LogError::Config(err.to_string()))?;
    log4rs::init_config(config).map_err(|_| LogError::AlreadyInitialized)?;

    for spec in loggers.rejected() {
        log::warn!("Ignoring invalid logging spec '{spec}'");
    }
    Ok(())
}

#[macro_export]
macro_rules! trace {
    ($($t:tt)*) => (
        log::trace!($($t)*);
    )
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => (
        log::debug!($($t)*);
    )
}

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => (
        log::info!($($t)*);
    )
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => (
        log::warn!($($t)*);
    )
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => (
        log::error!($($t)*);
    )
}
