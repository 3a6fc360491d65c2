//! Executes one work item: existence check, streamed fetch, retries.

use futures_util::StreamExt;
use log::debug;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::events::{EventSink, SessionEvent};
use super::models::{Outcome, WorkItem};
use crate::backend::utils::config::RetryPolicy;
use crate::backend::utils::files::{ensure_parent_directory, is_non_empty_file, staging_file};
use crate::transport_error;
use crate::utils::Error;

/// Why a single attempt did not produce a file.
#[derive(Debug)]
enum AttemptError {
    Cancelled,
    Failed(Error),
}

impl From<Error> for AttemptError {
    fn from(err: Error) -> Self {
        Self::Failed(err)
    }
}

impl From<std::io::Error> for AttemptError {
    fn from(err: std::io::Error) -> Self {
        Self::Failed(err.into())
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(err: reqwest::Error) -> Self {
        Self::Failed(err.into())
    }
}

/// Downloads work items for one session.
///
/// A worker always leaves `local_path` either absent or holding a complete
/// file: bytes go to a per-attempt `.part` sibling that is renamed only after
/// the body has been fully written.
#[derive(Clone)]
pub struct DownloadWorker {
    client: Client,
    policy: RetryPolicy,
    cancel: CancellationToken,
    events: EventSink,
}

impl DownloadWorker {
    pub const fn new(
        client: Client,
        policy: RetryPolicy,
        cancel: CancellationToken,
        events: EventSink,
    ) -> Self {
        Self {
            client,
            policy,
            cancel,
            events,
        }
    }

    /// Runs `item` to a terminal outcome.
    pub async fn run(&self, item: &WorkItem) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Cancelled;
        }

        if is_non_empty_file(&item.local_path).await {
            debug!("{} already present, skipping", item.filename);
            return Outcome::Succeeded;
        }

        if let Err(e) = ensure_parent_directory(&item.local_path).await {
            self.events.error(format!(
                "Cannot create directory for {}: {e}",
                item.filename
            ));
            return Outcome::Failed;
        }

        let mut retries = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Outcome::Cancelled;
            }

            let error = match self.fetch(item).await {
                Ok(bytes) => {
                    debug!("Downloaded {} ({bytes} bytes)", item.filename);
                    return Outcome::Succeeded;
                }
                Err(AttemptError::Cancelled) => {
                    self.events
                        .info(format!("Download cancelled: {}", item.filename));
                    return Outcome::Cancelled;
                }
                Err(AttemptError::Failed(error)) => error,
            };

            retries += 1;
            if retries > self.policy.max_retries {
                self.events.error(format!(
                    "Giving up on {} after {} retries: {error}",
                    item.filename, self.policy.max_retries
                ));
                return Outcome::Failed;
            }

            let delay = self.policy.backoff(retries);
            self.events.warn(format!(
                "Download of {} failed (retry {retries}/{}): {error}, retrying in {:.1}s",
                item.filename,
                self.policy.max_retries,
                delay.as_secs_f64()
            ));
            self.events.emit(SessionEvent::Retrying {
                filename: item.filename.clone(),
                attempt: retries,
                max_retries: self.policy.max_retries,
                delay_ms: delay.as_millis() as u64,
                error: error.to_string(),
            });

            if self.cancel.is_cancelled() {
                return Outcome::Cancelled;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Outcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One network attempt. Returns the number of bytes written.
    async fn fetch(&self, item: &WorkItem) -> Result<u64, AttemptError> {
        let request = self
            .client
            .get(item.resolved_url.as_str())
            .timeout(self.policy.attempt_timeout)
            .send();

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AttemptError::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(transport_error!("HTTP {} for {}", status, item.resolved_url).into());
        }

        // Dropping `staged` on any early return deletes the partial file.
        let (file, staged) = staging_file(&item.local_path)?;
        let written = match self.stream_to(response, file).await {
            Ok(0) => {
                return Err(
                    transport_error!("empty response body for {}", item.resolved_url).into(),
                );
            }
            Ok(_) if self.cancel.is_cancelled() => return Err(AttemptError::Cancelled),
            other => other?,
        };

        staged
            .persist(&item.local_path)
            .map_err(|e| AttemptError::from(e.error))?;
        Ok(written)
    }

    /// Writes the body into `file`, which is closed before returning.
    async fn stream_to(
        &self,
        response: reqwest::Response,
        mut file: File,
    ) -> Result<u64, AttemptError> {
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AttemptError::Cancelled),
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(chunk) => {
                    let chunk = chunk?;
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }
                None => break,
            }
        }

        file.flush().await?;
        Ok(written)
    }
}
