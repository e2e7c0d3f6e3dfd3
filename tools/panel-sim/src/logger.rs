use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

/// `log` backend writing `[  elapsed LEVEL] target: message` lines to stdout.
pub struct StdoutLogger {
    max_level: LevelFilter,
    start: Instant,
}

static LOGGER: OnceLock<StdoutLogger> = OnceLock::new();

impl StdoutLogger {
    #[must_use]
    pub fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            start: Instant::now(),
        }
    }

    /// Installs the logger. Only the first call takes effect.
    ///
    /// # Errors
    /// Fails if another logger was installed first.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        let logger = LOGGER.get_or_init(|| self);
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.start.elapsed();
        let mut out = std::io::stdout().lock();
        // Nowhere to report a failed write to.
        let _ = writeln!(
            out,
            "[{:>4}.{:06} {:<5}] {}: {}",
            elapsed.as_secs(),
            elapsed.subsec_micros(),
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}
