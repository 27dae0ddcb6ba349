//! stderr sink for the `log` facade.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::Write;

pub struct Logger {
    prefix: &'static str,
}

static LOGGER: Logger = Logger { prefix: "helloled" };

impl Logger {
    fn line(&self, record: &Record) -> String {
        match record.level() {
            Level::Info => format!("{}: {}", self.prefix, record.args()),
            level => format!("{}: [{}] {}", self.prefix, level, record.args()),
        }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(std::io::stderr().lock(), "{}", self.line(record));
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs the logger. A second call only changes the level.
pub fn init(level: LevelFilter) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_lines_read_like_printk() {
        let line = LOGGER.line(
            &Record::builder()
                .level(Level::Info)
                .args(format_args!("driver down"))
                .build(),
        );
        assert_eq!(line, "helloled: driver down");
    }

    #[test]
    fn other_levels_are_tagged() {
        let line = LOGGER.line(
            &Record::builder()
                .level(Level::Error)
                .args(format_args!("kobject_create_and_add failed"))
                .build(),
        );
        assert_eq!(line, "helloled: [ERROR] kobject_create_and_add failed");
    }
}
