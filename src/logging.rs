use chrono::Local;
use log::{Level, Metadata, Record, SetLoggerError};
use serde::Serialize;
use std::sync::OnceLock;
use tokio::sync::mpsc::UnboundedSender;

static LOGGER: OnceLock<EventLogger> = OnceLock::new();

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LogMessage {
    pub level: String,
    pub message: String,
    pub timestamp: String,
}

/// Writes records to stderr and forwards them to a front end, if one listens.
pub struct EventLogger {
    sink: Option<UnboundedSender<LogMessage>>,
    level: Level,
}

impl EventLogger {
    pub fn new(level: Level, sink: Option<UnboundedSender<LogMessage>>) -> Self {
        Self { sink, level }
    }

    /// Installs the logger globally. Fails if a logger is already set.
    pub fn init(level: Level, sink: Option<UnboundedSender<LogMessage>>) -> Result<(), SetLoggerError> {
        let logger = LOGGER.get_or_init(|| EventLogger::new(level, sink));
        log::set_logger(logger).map(|()| log::set_max_level(level.to_level_filter()))
    }

    fn emit_log(&self, record: &Record) {
        let Some(sink) = &self.sink else {
            return;
        };
        let log_message = LogMessage {
            level: record.level().to_string(),
            message: record.args().to_string(),
            timestamp: Local::now().to_rfc3339(),
        };

        // the receiving side went away; stderr still has the record
        let _ = sink.send(log_message);
    }
}

impl log::Log for EventLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
            self.emit_log(record);
        }
    }

    fn flush(&self) {}
}

/// Installs [`EventLogger`], falling back to `env_logger` if another logger won.
pub fn setup_logging(level: Level, sink: Option<UnboundedSender<LogMessage>>) {
    if EventLogger::init(level, sink).is_err() {
        let _ = fallback_logger(level).try_init();
    }
    log::info!("Logging initialized");
}

fn fallback_logger(level: Level) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.to_level_filter());
    builder
}
