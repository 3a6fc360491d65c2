//! Download session controller.
//!
//! Drives one run at a time through
//! `Idle -> Planning -> Running -> {Completed | Stopped | Errored} -> Idle`.

use chrono::Local;
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::events::{EventSink, SessionEvent};
use super::limiter::ConcurrencyLimiter;
use super::manifest::ManifestResolver;
use super::models::{
    Outcome, Platform, RunOutcome, SessionPhase, SessionState, SessionSummary, StartOptions,
    WorkItem,
};
use super::planner::{DownloadPlanner, PlaceholderSet};
use super::progress::ProgressAggregator;
use super::worker::DownloadWorker;
use crate::backend::utils::config::DownloadConfig;
use crate::backend::utils::{files, http, paths};
use crate::utils::{Error, Result, dirs};

struct Inner {
    phase: SessionPhase,
    platform: Option<Platform>,
    cancel: CancellationToken,
}

/// One download session. Sessions are independent: nothing is shared between
/// two instances, so several can exist side by side.
pub struct DownloadSession {
    config: DownloadConfig,
    client: Client,
    events: EventSink,
    progress: Arc<ProgressAggregator>,
    inner: Mutex<Inner>,
}

impl DownloadSession {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = http::build_client(&config)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: DownloadConfig, client: Client) -> Self {
        let events = EventSink::new();
        Self {
            progress: Arc::new(ProgressAggregator::new(events.clone())),
            config,
            client,
            events,
            inner: Mutex::new(Inner {
                phase: SessionPhase::Idle,
                platform: None,
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Subscribe to lifecycle, progress and log events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        let (phase, platform) = {
            let inner = self.inner.lock().await;
            (inner.phase, inner.platform)
        };
        SessionState {
            phase,
            is_running: matches!(phase, SessionPhase::Planning | SessionPhase::Running),
            platform,
            progress: self.progress.snapshot().await,
        }
    }

    /// Asks a running session to wind down. In-flight items finish as
    /// `Cancelled` at their next checkpoint. Does nothing when idle.
    pub async fn stop(&self) {
        let inner = self.inner.lock().await;
        if inner.phase.is_idle() || inner.cancel.is_cancelled() {
            return;
        }
        inner.cancel.cancel();
        self.events.info("Stop requested, waiting for in-flight downloads to settle");
    }

    /// Runs a full download and returns once every item has settled.
    ///
    /// Fails only for invalid parameters or when the catalog cannot be
    /// fetched or parsed; individual asset failures are reported in the
    /// returned summary.
    pub async fn start(&self, options: StartOptions) -> Result<RunOutcome> {
        let (platform, cancel) = {
            let mut inner = self.inner.lock().await;
            if !inner.phase.is_idle() {
                return Err(Error::AlreadyRunning);
            }
            let platform: Platform = options.platform.parse()?;
            inner.phase = SessionPhase::Planning;
            inner.platform = Some(platform);
            inner.cancel = CancellationToken::new();
            (platform, inner.cancel.clone())
        };

        self.progress.reset().await;

        let base_dir = options
            .output_dir
            .clone()
            .unwrap_or_else(dirs::downloads_dir);
        let output_dir = paths::platform_output_dir(&base_dir, options.create_subfolder, platform);
        let concurrency = options
            .concurrency
            .unwrap_or(self.config.default_concurrency)
            .max(1);

        let result = self
            .run(platform, output_dir, concurrency, cancel)
            .await;

        let terminal = match &result {
            Ok(RunOutcome::Completed(_)) => SessionPhase::Completed,
            Ok(RunOutcome::Stopped(_)) => SessionPhase::Stopped,
            Err(e) => {
                self.events.error(format!("Download failed: {e}"));
                self.events.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                SessionPhase::Errored
            }
        };
        self.set_phase(terminal).await;
        self.set_phase(SessionPhase::Idle).await;

        result
    }

    async fn set_phase(&self, phase: SessionPhase) {
        self.inner.lock().await.phase = phase;
    }

    async fn run(
        &self,
        platform: Platform,
        output_dir: PathBuf,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        let started = Instant::now();

        files::ensure_directory(&output_dir).await?;
        self.events.emit(SessionEvent::Started {
            platform,
            output_dir: output_dir.clone(),
            concurrency,
        });

        let items = self.plan(platform, &output_dir).await?;
        let total = items.len();
        self.progress.set_total(total).await;
        self.set_phase(SessionPhase::Running).await;

        self.events.info(format!(
            "Downloading {total} assets with {concurrency} concurrent connections"
        ));
        self.download_all(items, concurrency, cancel.clone()).await;

        let progress = self.progress.snapshot().await;
        let summary = SessionSummary {
            platform,
            total,
            succeeded: progress.completed,
            failed: progress.failed,
            stopped: self.progress.cancelled().await,
            elapsed: started.elapsed(),
            finished_at: Local::now(),
        };

        if cancel.is_cancelled() {
            self.events.info(format!(
                "Download stopped by user ({} of {total} assets done)",
                summary.succeeded
            ));
            self.events.emit(SessionEvent::Stopped);
            return Ok(RunOutcome::Stopped(summary));
        }

        self.events.info(format!(
            "Download finished - total: {}, succeeded: {} ({:.1}%), failed: {}, stopped: {}",
            summary.total,
            summary.succeeded,
            summary.completion_rate(),
            summary.failed,
            summary.stopped
        ));
        self.events.emit(SessionEvent::Completed(summary.clone()));
        Ok(RunOutcome::Completed(summary))
    }

    async fn plan(&self, platform: Platform, output_dir: &Path) -> Result<Vec<WorkItem>> {
        let url = self.config.manifest_url(platform);
        self.events.info(format!("Fetching catalog: {url}"));

        let manifest = ManifestResolver::new(self.client.clone(), self.config.manifest_timeout)
            .fetch(&url, output_dir)
            .await?;
        self.events.info(format!(
            "Found {} internal ids, selecting CDN assets",
            manifest.len()
        ));

        let planner = DownloadPlanner::new(PlaceholderSet::with_base_url(&self.config.cdn_base_url));
        let items = planner.plan(&manifest, output_dir);
        self.events.info(format!(
            "Selected {} downloadable assets out of {} catalog entries",
            items.len(),
            manifest.len()
        ));
        Ok(items)
    }

    /// Spawns one task per item, each gated by the limiter, and waits for all
    /// of them. One item's failure never cancels its siblings. Every item is
    /// recorded with the progress aggregator exactly once.
    async fn download_all(
        &self,
        items: Vec<WorkItem>,
        concurrency: usize,
        cancel: CancellationToken,
    ) {
        let limiter = ConcurrencyLimiter::new(concurrency);
        let worker = Arc::new(DownloadWorker::new(
            self.client.clone(),
            self.config.retry,
            cancel,
            self.events.clone(),
        ));

        let mut tasks = JoinSet::new();
        let mut filenames = HashMap::new();
        for item in items {
            let limiter = limiter.clone();
            let worker = Arc::clone(&worker);
            let progress = Arc::clone(&self.progress);
            let events = self.events.clone();
            let filename = item.filename.clone();

            let handle = tasks.spawn(async move {
                let outcome = match limiter.acquire().await {
                    Ok(permit) => {
                        let outcome = worker.run(&item).await;
                        permit.release();
                        outcome
                    }
                    Err(e) => {
                        events.error(format!("{}: {e}", item.filename));
                        Outcome::Failed
                    }
                };
                progress.record(&item.filename, outcome).await;
            });
            filenames.insert(handle.id(), filename);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            if let Err(e) = joined {
                // The task died before recording its own outcome.
                let filename = filenames.remove(&e.id()).unwrap_or_default();
                self.events
                    .error(format!("Download task for {filename} aborted: {e}"));
                self.progress.record(&filename, Outcome::Failed).await;
            }
        }
    }
}
