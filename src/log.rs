// Programmatic log4rs pipeline, grounded on hebo's log.rs.

use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::Log;
use crate::error::{Error, ErrorKind};

const LOG_FILE_SIZE: u64 = 16 * 1024 * 1024;
const ROLLER_PATTERN: &str = ".{}.gz";
const ROLLER_COUNT: u32 = 10;
const STDOUT_NAME: &str = "stdout";
const ROLLER_NAME: &str = "roller";

/// # Errors
/// Returns an error if neither a console nor a file appender is configured,
/// or if log4rs rejects the assembled pipeline.
pub fn init(log_conf: &Log) -> Result<(), Error> {
    let mut builder = Config::builder();
    let mut appenders = Vec::new();

    if log_conf.console_log {
        let stdout = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new("{d} {h({l})} - {m}{n}")))
            .build();
        builder = builder.appender(Appender::builder().build(STDOUT_NAME, Box::new(stdout)));
        appenders.push(STDOUT_NAME);
    }

    if let Some(log_file) = &log_conf.log_file {
        let roller_pattern = format!("{log_file}{ROLLER_PATTERN}");
        let roller = FixedWindowRoller::builder()
            .build(&roller_pattern, ROLLER_COUNT)
            .map_err(|err| Error::new(ErrorKind::Config, err.to_string()))?;
        let policy = Box::new(CompoundPolicy::new(
            Box::new(SizeTrigger::new(LOG_FILE_SIZE)),
            Box::new(roller),
        ));
        let rolling_file = RollingFileAppender::builder()
            .build(log_file, policy)
            .map_err(|err| Error::new(ErrorKind::Config, err.to_string()))?;
        builder = builder.appender(Appender::builder().build(ROLLER_NAME, Box::new(rolling_file)));
        appenders.push(ROLLER_NAME);
    }

    if appenders.is_empty() {
        return Err(Error::new(
            ErrorKind::Config,
            "logging requires console_log = true or a log_file",
        ));
    }

    let level_filter: log::LevelFilter = log_conf.level.into();
    let config = builder
        .build(Root::builder().appenders(appenders).build(level_filter))
        .map_err(|err| Error::new(ErrorKind::Config, err.to_string()))?;

    log4rs::init_config(config).map_err(|err| Error::new(ErrorKind::Config, err.to_string()))?;
    Ok(())
}
