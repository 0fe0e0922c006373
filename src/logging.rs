//! Log output for the command-line binary, built on log4rs
//!
//! The library only talks to the `log` facade; the binary calls
//! [`init_logging`] once to route records to stderr.

use std::str::FromStr;

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::threshold::ThresholdFilter;
use thiserror::Error;

const PATTERN: &str = "{d(%H:%M:%S)} {h({l:<5})} {t} - {m}{n}";

/// Failure to set up logging
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown log level '{0}'")]
    Level(String),
    #[error("invalid logging configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Install(#[from] log::SetLoggerError),
}

/// Parse a level name such as `info` or `DEBUG`.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    LevelFilter::from_str(level.trim()).map_err(|_| LoggingError::Level(level.to_string()))
}

/// log4rs configuration writing to stderr at `level`.
pub fn build_config(level: LevelFilter) -> Result<Config, LoggingError> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("stderr", Box::new(stderr)),
        )
        .build(Root::builder().appender("stderr").build(level))
        .map_err(|e| LoggingError::Config(e.to_string()))
}

/// Install the global logger. Can succeed only once per process.
pub fn init_logging(level: &str) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    log4rs::init_config(build_config(level)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level("DEBUG").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level(" off ").unwrap(), LevelFilter::Off);
        assert!(matches!(parse_level("loud"), Err(LoggingError::Level(_))));
    }

    #[test]
    fn test_build_config() {
        let config = build_config(LevelFilter::Warn).unwrap();
        assert_eq!(config.root().level(), LevelFilter::Warn);
        assert_eq!(config.appenders().len(), 1);
    }
}
