//! Asset download pipeline.
//!
//! The session controller fetches a platform catalog, plans one work item per
//! CDN-hosted asset and runs the items through a bounded pool of workers:
//!
//! - `manifest`: catalog fetch and parse
//! - `planner`: placeholder expansion and file naming
//! - `limiter`: FIFO concurrency cap
//! - `worker`: per-item fetch with retry/backoff and cancellation
//! - `progress`: running totals
//! - `session`: lifecycle and orchestration

pub mod events;
pub mod limiter;
pub mod manifest;
pub mod models;
pub mod planner;
pub mod progress;
pub mod session;
pub mod worker;

pub use events::{EventSink, LogLevel, SessionEvent};
pub use models::{
    Outcome, Platform, ProgressSnapshot, RunOutcome, SessionPhase, SessionState, SessionSummary,
    StartOptions, WorkItem,
};
pub use session::DownloadSession;
