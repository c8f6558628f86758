use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// A `log` backend that frames records and hands them to a sink function.
pub struct FirmwareLogger {
    max_level: LevelFilter,
    sink: fn(fmt::Arguments),
}

impl FirmwareLogger {
    /// Logger writing to the debug console.
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self::with_sink(max_level, crate::debugcon::write)
    }

    #[must_use]
    pub const fn with_sink(max_level: LevelFilter, sink: fn(fmt::Arguments)) -> Self {
        Self { max_level, sink }
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// Register as the global logger. Call this once during early init.
    ///
    /// # Errors
    /// Fails if a global logger has already been installed.
    pub fn install(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

impl Log for FirmwareLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format: "[LEVEL] target: message\n"
        (self.sink)(format_args!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::cell::RefCell;
    use std::fmt::Write;

    thread_local! {
        static CAPTURED: RefCell<String> = const { RefCell::new(String::new()) };
    }

    fn capture(args: fmt::Arguments) {
        CAPTURED.with(|c| c.borrow_mut().write_fmt(args).unwrap());
    }

    fn take() -> String {
        CAPTURED.with(|c| core::mem::take(&mut *c.borrow_mut()))
    }

    #[test]
    fn records_are_framed_with_level_and_target() {
        let logger = FirmwareLogger::with_sink(LevelFilter::Info, capture);
        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("advlog_prm")
                .args(format_args!("relocation skipped"))
                .build(),
        );
        assert_eq!(take(), "[WARN] advlog_prm: relocation skipped\n");
    }

    #[test]
    fn records_above_max_level_are_dropped() {
        let logger = FirmwareLogger::with_sink(LevelFilter::Info, capture);
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("advlog_prm")
                .args(format_args!("noise"))
                .build(),
        );
        assert!(take().is_empty());
        assert!(!logger.enabled(&Metadata::builder().level(Level::Trace).build()));
        assert!(logger.enabled(&Metadata::builder().level(Level::Error).build()));
    }

    #[test]
    fn off_filter_silences_everything() {
        let logger = FirmwareLogger::with_sink(LevelFilter::Off, capture);
        logger.log(
            &Record::builder()
                .level(Level::Error)
                .args(format_args!("x"))
                .build(),
        );
        assert!(take().is_empty());
        assert_eq!(logger.max_level(), LevelFilter::Off);
    }
}
