//! Structured logging for the decode pipeline (C13, ambient).
//!
//! Every event a receiver logs happens at a point in the sample stream, so
//! entries carry an optional `sample_index` alongside the usual
//! level/subsystem/message triple. Callers pull `logger.entries()` after a
//! decode call (batch) or after a `push_samples` call (streaming) rather
//! than wiring into a global logging framework.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// A decode pipeline subsystem. Used both to gate logging in `LogConfig`
/// and to tag entries, so a caller can filter a noisy stream by stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Sync,
    Header,
    Payload,
    Crc,
    Stream,
}

impl Subsystem {
    fn label(self) -> &'static str {
        match self {
            Subsystem::Sync => "SYNC",
            Subsystem::Header => "HEADER",
            Subsystem::Payload => "PAYLOAD",
            Subsystem::Crc => "CRC",
            Subsystem::Stream => "STREAM",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Logging configuration: minimum level, a per-subsystem gate, and a cap on
/// how many entries a logger retains.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub enable_sync: bool,
    pub enable_header: bool,
    pub enable_payload: bool,
    pub enable_crc: bool,
    pub enable_stream: bool,
    pub max_entries: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_sync: true,
            enable_header: true,
            enable_payload: true,
            enable_crc: true,
            enable_stream: true,
            max_entries: 1000,
        }
    }
}

impl LogConfig {
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            max_entries: 5000,
            ..Default::default()
        }
    }

    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Warn,
            enable_sync: false,
            enable_header: false,
            enable_payload: false,
            enable_crc: false,
            enable_stream: false,
            max_entries: 100,
        }
    }

    pub fn disabled() -> Self {
        Self {
            level: LogLevel::Error,
            max_entries: 0,
            ..Self::quiet()
        }
    }

    fn gate(&self, subsystem: Subsystem) -> bool {
        match subsystem {
            Subsystem::Sync => self.enable_sync,
            Subsystem::Header => self.enable_header,
            Subsystem::Payload => self.enable_payload,
            Subsystem::Crc => self.enable_crc,
            Subsystem::Stream => self.enable_stream,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub subsystem: Subsystem,
    /// Sample index the event occurred at, when the caller has one (most
    /// entries do; construction-time entries like parameter warnings do
    /// not).
    pub sample_index: Option<usize>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sample_index {
            Some(idx) => write!(f, "[{} {}@{}] {}", self.level, self.subsystem, idx, self.message),
            None => write!(f, "[{} {}] {}", self.level, self.subsystem, self.message),
        }
    }
}

/// Ring-buffered logger collecting entries from a single decode run.
#[derive(Debug, Clone)]
pub struct SignalLogger {
    config: LogConfig,
    entries: Vec<LogEntry>,
}

impl SignalLogger {
    pub fn new(config: LogConfig) -> Self {
        let capacity = config.max_entries.min(1000);
        Self {
            config,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn log(
        &mut self,
        level: LogLevel,
        subsystem: Subsystem,
        sample_index: Option<usize>,
        message: impl fmt::Display,
    ) {
        if level < self.config.level || !self.config.gate(subsystem) {
            return;
        }

        if self.config.max_entries == 0 {
            return;
        }
        if self.entries.len() >= self.config.max_entries {
            self.entries.remove(0);
        }
        self.entries.push(LogEntry {
            level,
            subsystem,
            sample_index,
            message: message.to_string(),
        });
    }

    pub fn trace(&mut self, subsystem: Subsystem, sample_index: Option<usize>, message: impl fmt::Display) {
        self.log(LogLevel::Trace, subsystem, sample_index, message);
    }

    pub fn debug(&mut self, subsystem: Subsystem, sample_index: Option<usize>, message: impl fmt::Display) {
        self.log(LogLevel::Debug, subsystem, sample_index, message);
    }

    pub fn info(&mut self, subsystem: Subsystem, sample_index: Option<usize>, message: impl fmt::Display) {
        self.log(LogLevel::Info, subsystem, sample_index, message);
    }

    pub fn warn(&mut self, subsystem: Subsystem, sample_index: Option<usize>, message: impl fmt::Display) {
        self.log(LogLevel::Warn, subsystem, sample_index, message);
    }

    pub fn error(&mut self, subsystem: Subsystem, sample_index: Option<usize>, message: impl fmt::Display) {
        self.log(LogLevel::Error, subsystem, sample_index, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn entries_for_subsystem(&self, subsystem: Subsystem) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.subsystem == subsystem).collect()
    }

    pub fn entries_at_level(&self, level: LogLevel) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.level >= level).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SignalLogger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl fmt::Display for SignalLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_level() {
        let config = LogConfig {
            level: LogLevel::Info,
            ..Default::default()
        };
        let mut logger = SignalLogger::new(config);

        logger.trace(Subsystem::Sync, Some(0), "candidate rejected");
        logger.debug(Subsystem::Sync, Some(0), "candidate rejected");
        logger.info(Subsystem::Sync, Some(128), "frame synced");
        logger.warn(Subsystem::Crc, Some(900), "mismatch");

        assert_eq!(logger.entries().len(), 2);
    }

    #[test]
    fn filters_by_subsystem() {
        let config = LogConfig {
            level: LogLevel::Debug,
            enable_sync: false,
            ..Default::default()
        };
        let mut logger = SignalLogger::new(config);

        logger.info(Subsystem::Sync, None, "ignored");
        logger.info(Subsystem::Header, Some(64), "kept");

        assert_eq!(logger.entries().len(), 1);
        assert_eq!(logger.entries()[0].subsystem, Subsystem::Header);
        assert_eq!(logger.entries()[0].sample_index, Some(64));
    }

    #[test]
    fn respects_max_entries() {
        let config = LogConfig {
            level: LogLevel::Debug,
            max_entries: 3,
            ..Default::default()
        };
        let mut logger = SignalLogger::new(config);

        for i in 1..=4 {
            logger.info(Subsystem::Stream, Some(i), format!("message {i}"));
        }

        assert_eq!(logger.entries().len(), 3);
        assert!(logger.entries()[0].message.contains("message 2"));
    }

    #[test]
    fn display_includes_sample_index_when_present() {
        let mut logger = SignalLogger::default();
        logger.info(Subsystem::Header, Some(42), "fcs ok");
        let rendered = logger.to_string();
        assert!(rendered.contains("@42"));
    }
}
