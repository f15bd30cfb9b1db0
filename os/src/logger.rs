//! Kernel logger
//!
//! Implements `log::Log` to route records to the serial port, one line per
//! record: `[LEVEL] target: message`.

use core::fmt;

use log::{LevelFilter, Metadata, Record};

use crate::error::{InitError, InitResult};

/// Global logger instance
static LOGGER: SerialLogger = SerialLogger;

struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    #[cfg(all(target_arch = "x86_64", not(test)))]
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::serial::write_fmt(format_args!("{}", Line(record)));
        }
    }

    // Host tests have no UART
    #[cfg(any(not(target_arch = "x86_64"), test))]
    fn log(&self, _record: &Record) {}

    fn flush(&self) {}
}

/// One formatted log line, newline included
struct Line<'a, 'b>(&'a Record<'b>);

impl fmt::Display for Line<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[{:<5}] {}: {}",
            self.0.level(),
            self.0.target(),
            self.0.args()
        )
    }
}

/// Install the serial logger. Fails if any logger is already installed.
pub fn init(max_level: LevelFilter) -> InitResult<()> {
    log::set_logger(&LOGGER).map_err(|_| InitError::LoggerAlreadySet)?;
    log::set_max_level(max_level);
    Ok(())
}
