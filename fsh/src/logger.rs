//! Stderr logger with the level tag colored per severity. The level filter
//! comes from the `FSH_LOG` environment variable, `info` when unset.

use std::io::Write;

use log::{Level, LevelFilter, Log};
use owo_colors::OwoColorize;

struct ShellLogger;

static LOGGER: ShellLogger = ShellLogger;

impl Log for ShellLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = record.level();
        let tag = format!("{level:5}");
        let tag: &dyn std::fmt::Display = match level {
            Level::Error => &tag.bright_red(),
            Level::Warn => &tag.bright_yellow(),
            Level::Info => &tag.bright_blue(),
            Level::Debug => &tag.bright_cyan(),
            Level::Trace => &tag.bright_magenta(),
        };
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{tag} {}", record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

pub fn init() -> Result<(), log::SetLoggerError> {
    let filter = match std::env::var("FSH_LOG").as_deref() {
        Ok("error") => LevelFilter::Error,
        Ok("warn") => LevelFilter::Warn,
        Ok("debug") => LevelFilter::Debug,
        Ok("trace") => LevelFilter::Trace,
        Ok("off") => LevelFilter::Off,
        _ => LevelFilter::Info,
    };
    log::set_max_level(filter);
    log::set_logger(&LOGGER)
}
