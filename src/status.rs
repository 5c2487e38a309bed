use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Error,
    Warning,
    Info,
    Priority,
    Status,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl MessageType {
    pub fn to_str(&self) -> &'static str {
        match self {
            MessageType::Error => "Error",
            MessageType::Warning => "Warning",
            MessageType::Info => "Info",
            MessageType::Priority => "Priority",
            MessageType::Status => "Status",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            MessageType::Error => "\x1b[31m",
            MessageType::Warning => "\x1b[33m",
            MessageType::Info => "\x1b[0m",
            MessageType::Priority => "\x1b[32m",
            MessageType::Status => "\x1b[36m",
        }
    }
}

impl From<Level> for MessageType {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => MessageType::Error,
            Level::Warn => MessageType::Warning,
            Level::Info => MessageType::Info,
            Level::Debug | Level::Trace => MessageType::Status,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StatusMessage {
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
    pub content: String,
}

impl StatusMessage {
    pub fn new(message_type: MessageType, content: String) -> Self {
        StatusMessage {
            timestamp: Utc::now(),
            message_type,
            content,
        }
    }
}

/// Bounded in-memory log. In headless mode every message is also printed.
pub struct MessageLog {
    messages: Vec<StatusMessage>,
    headless: bool,
    max_size: usize,
}

impl MessageLog {
    pub fn new(headless: bool, max_size: Option<usize>) -> Self {
        MessageLog {
            messages: Vec::new(),
            headless,
            max_size: max_size.unwrap_or(500).max(1),
        }
    }

    pub fn add_message(&mut self, message: StatusMessage) {
        if self.messages.len() >= self.max_size {
            self.messages.remove(0);
        }

        if self.headless {
            println!(
                "{}{} | {:^8} | {}\x1b[0m",
                message.message_type.color(),
                message.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                message.message_type.to_str(),
                message.content,
            )
        }

        self.messages.push(message);
    }

    pub fn get_all_messages(&self) -> Vec<StatusMessage> {
        self.messages.clone()
    }

    pub fn size(&self) -> usize {
        self.messages.len()
    }
}

/// `log` backend that records into a shared [MessageLog].
pub struct StatusLogger {
    log: Arc<Mutex<MessageLog>>,
    level: LevelFilter,
}

impl StatusLogger {
    pub fn new(log: Arc<Mutex<MessageLog>>, level: LevelFilter) -> Self {
        StatusLogger { log, level }
    }

    /// Install as the global logger.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for StatusLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = StatusMessage::new(record.level().into(), record.args().to_string());
        if let Ok(mut log) = self.log.lock() {
            log.add_message(message);
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_evicts_oldest() {
        let mut log = MessageLog::new(false, Some(2));
        for i in 0..3 {
            log.add_message(StatusMessage::new(MessageType::Info, format!("m{i}")));
        }
        let contents: Vec<_> = log
            .get_all_messages()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["m1", "m2"]);
        assert_eq!(log.size(), 2);
    }

    #[test]
    fn test_logger_records_levels() {
        let shared = Arc::new(Mutex::new(MessageLog::new(false, None)));
        let logger = StatusLogger::new(shared.clone(), LevelFilter::Info);
        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .args(format_args!("queue full"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("filtered"))
                .build(),
        );
        let messages = shared.lock().unwrap().get_all_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type, MessageType::Warning);
        assert_eq!(messages[0].content, "queue full");
    }
}
