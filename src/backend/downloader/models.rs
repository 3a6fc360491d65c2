//! Data models shared across the download pipeline.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::utils::Error;

/// Client platforms the CDN publishes catalogs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "iOS")]
    Ios,
    #[serde(rename = "Android")]
    Android,
}

impl Platform {
    pub const ALL: [Self; 2] = [Self::Ios, Self::Android];

    /// Directory name used both on the CDN and in the output layout.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::Android => "Android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnsupportedPlatform(s.to_string()))
    }
}

/// One asset to fetch, produced by the planner and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub original_identifier: String,
    pub resolved_url: String,
    pub filename: String,
    pub local_path: PathBuf,
}

/// Terminal result of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
    Cancelled,
}

/// Lifecycle phase of a [`DownloadSession`](super::session::DownloadSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Planning,
    Running,
    Completed,
    Stopped,
    Errored,
}

impl SessionPhase {
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Running totals republished after every recorded outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub current_file: Option<String>,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub is_running: bool,
    pub platform: Option<Platform>,
    pub progress: ProgressSnapshot,
}

/// Parameters of a single run, as accepted by `DownloadSession::start`.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub platform: String,
    pub output_dir: Option<PathBuf>,
    /// Falls back to the session's `DownloadConfig::default_concurrency`.
    pub concurrency: Option<usize>,
    pub create_subfolder: bool,
}

impl StartOptions {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            output_dir: None,
            concurrency: None,
            create_subfolder: true,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_subfolder(mut self, create_subfolder: bool) -> Self {
        self.create_subfolder = create_subfolder;
        self
    }
}

/// Final counts of a run that reached `Completed` or `Stopped`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub platform: Platform,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub stopped: usize,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    pub finished_at: DateTime<Local>,
}

impl SessionSummary {
    /// Overall run success: nothing failed and nothing was cut short.
    pub const fn is_success(&self) -> bool {
        self.failed == 0 && self.stopped == 0
    }

    /// Percentage of items that succeeded, `100.0` for an empty plan.
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.succeeded as f64 / self.total as f64 * 100.0
    }
}

/// How a run that got past planning ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "summary", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(SessionSummary),
    Stopped(SessionSummary),
}

impl RunOutcome {
    pub const fn summary(&self) -> &SessionSummary {
        match self {
            Self::Completed(summary) | Self::Stopped(summary) => summary,
        }
    }

    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped(_))
    }

    pub const fn is_success(&self) -> bool {
        match self {
            Self::Completed(summary) => summary.is_success(),
            Self::Stopped(_) => false,
        }
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
