//! Region extraction state: loading, last result, last error
//!
//! Each extraction runs on its own thread and reports back over a channel.
//! Only one may be in flight; callers are expected to disable their trigger
//! while [`Extractor::loading`] is true, and [`Extractor::start`] refuses
//! with [`ExtractionError::Busy`] otherwise.

use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use super::client::OcrClient;
use super::request::{ExtractionError, ExtractionResult, RegionRequest};

type JobReply = (u64, Result<ExtractionResult, ExtractionError>);

pub struct Extractor {
    client: OcrClient,
    reply_tx: Sender<JobReply>,
    reply_rx: Receiver<JobReply>,
    next_job: u64,
    current_job: Option<u64>,
    result: Option<ExtractionResult>,
    error: Option<String>,
}

impl Extractor {
    #[must_use]
    pub fn new(client: OcrClient) -> Self {
        let (reply_tx, reply_rx) = flume::unbounded();
        Self {
            client,
            reply_tx,
            reply_rx,
            next_job: 1,
            current_job: None,
            result: None,
            error: None,
        }
    }

    #[must_use]
    pub fn client(&self) -> &OcrClient {
        &self.client
    }

    /// Start extracting `request` in the background.
    ///
    /// The previous result and error are cleared immediately, so a stale
    /// result is never shown next to the outcome of a new attempt.
    pub fn start(&mut self, request: RegionRequest) -> Result<(), ExtractionError> {
        if self.loading() {
            return Err(ExtractionError::Busy);
        }

        self.result = None;
        self.error = None;

        let job = self.next_job;
        self.next_job += 1;
        info!(
            "Extracting region from {} page {} (job {job})",
            request.file.name, request.page
        );

        let client = self.client.clone();
        let reply_tx = self.reply_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("region-extract".to_string())
            .spawn(move || {
                let outcome = client.extract_region(&request);
                let _ = reply_tx.send((job, outcome));
            });

        match spawned {
            Ok(_) => {
                self.current_job = Some(job);
                Ok(())
            }
            Err(e) => {
                let error = ExtractionError::Transport(format!("cannot spawn extraction: {e}"));
                self.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// Apply finished jobs without blocking. Returns true if state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(reply) = self.reply_rx.try_recv() {
            changed |= self.accept(reply);
        }
        changed
    }

    /// Block until the running extraction settles or `timeout` elapses
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while self.loading() {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.reply_rx.recv_timeout(remaining) {
                Ok(reply) => {
                    self.accept(reply);
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    fn accept(&mut self, (job, outcome): JobReply) -> bool {
        if self.current_job != Some(job) {
            debug!("Ignoring reply of abandoned extraction job {job}");
            return false;
        }
        self.current_job = None;

        match outcome {
            Ok(result) => {
                info!(
                    "Extraction job {job} finished: {} chars via {}",
                    result.text.chars().count(),
                    result.method.map_or("unknown".to_string(), |m| m.to_string())
                );
                self.result = Some(result);
            }
            Err(error) => {
                warn!("Extraction job {job} failed: {error}");
                self.error = Some(error.to_string());
            }
        }
        true
    }

    /// Forget result, error and any running job
    pub fn reset(&mut self) {
        self.current_job = None;
        self.result = None;
        self.error = None;
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.current_job.is_some()
    }

    #[must_use]
    pub fn result(&self) -> Option<&ExtractionResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
