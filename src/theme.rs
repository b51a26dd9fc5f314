//! Colored console output for the command line tool

use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Color for a log level prefix
pub fn level_label(level: Level) -> ColoredString {
    match level {
        Level::Error => "Error:".red().bold(),
        Level::Warn => "Warning:".yellow().bold(),
        Level::Info => "Info:".cyan(),
        Level::Debug => "Debug:".dimmed(),
        Level::Trace => "Trace:".dimmed(),
    }
}

/// Print a formatted error message with its chain of causes
pub fn print_error(context: &str, error: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), context);
    eprintln!("  {}", error.to_string().red());

    let mut current = error.source();
    while let Some(cause) = current {
        eprintln!("  {} {}", "Caused by:".dimmed(), cause.to_string().dimmed());
        current = std::error::Error::source(cause);
    }
}

/// Writes log records to stderr.
pub struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    pub fn new(level: LevelFilter) -> Self {
        ConsoleLogger { level }
    }

    /// Installs the logger for the whole process.
    pub fn init(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{} {}", level_label(record.level()), record.args());
        }
    }

    fn flush(&self) {}
}
