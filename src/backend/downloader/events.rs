//! Session event channel consumed by whatever front end drives a session.

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;

use super::models::{Platform, ProgressSnapshot, SessionSummary};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Severity attached to [`SessionEvent::Log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    const fn to_log(self) -> log::Level {
        match self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        platform: Platform,
        output_dir: PathBuf,
        concurrency: usize,
    },
    Progress(ProgressSnapshot),
    Retrying {
        filename: String,
        attempt: u32,
        max_retries: u32,
        delay_ms: u64,
        error: String,
    },
    Log {
        level: LogLevel,
        message: String,
    },
    Stopped,
    Completed(SessionSummary),
    Error {
        message: String,
    },
}

/// Cloneable sending half of the session event channel.
///
/// Sending never fails from the caller's point of view: with no subscriber
/// the event is simply dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    /// Write `message` to the process log and publish it as a [`SessionEvent::Log`].
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        log::log!(target: "pvz3_downloader", level.to_log(), "{message}");
        self.emit(SessionEvent::Log { level, message });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }
}
