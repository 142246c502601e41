use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use backoff::backoff::Backoff;
use futures::future::{abortable, AbortHandle};
use futures::FutureExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::error::{SessionError, TransportError, ValidationError};
use crate::interpret::{interpret, ConfidenceThreshold, DisplayResult};
use crate::settings::SettingsStore;
use crate::transport::AnalysisTransport;
use crate::validator::{CandidateFile, UploadPolicy, UploadRequest};
use crate::{ImageMime, Modality, RawPayload};

/// Monotonic tag identifying a submission. Only the latest is authoritative.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Pending,
    Success(RawPayload),
    Failure(TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// The submission currently owning the outcome slot.
#[derive(Debug, Clone)]
pub struct Submission {
    pub generation: Generation,
    pub file_name: String,
    pub mime: ImageMime,
    pub size_bytes: u64,
    pub outcome: AnalysisOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    Submitted(Generation),
    /// Auto-analysis is off; call `AnalysisSession::analyze` to submit.
    Staged,
}

#[derive(Debug)]
pub struct Completion {
    generation: Generation,
    result: Result<RawPayload, TransportError>,
}

/// Drives Idle -> Submitting -> Succeeded | Failed for one modality.
///
/// Transport calls run on spawned tasks and report back over a channel;
/// only this type writes the outcome slot. Must be used inside a tokio
/// runtime.
pub struct AnalysisSession {
    modality: Modality,
    policy: UploadPolicy,
    transport: Arc<dyn AnalysisTransport>,
    settings: Arc<dyn SettingsStore>,
    generation: Generation,
    current: Option<Submission>,
    staged: Option<UploadRequest>,
    in_flight: Option<AbortHandle>,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
}

impl AnalysisSession {
    pub fn new(
        modality: Modality,
        policy: UploadPolicy,
        transport: Arc<dyn AnalysisTransport>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            modality,
            policy,
            transport,
            settings,
            generation: 0,
            current: None,
            staged: None,
            in_flight: None,
            completions_tx,
            completions_rx,
        }
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> SessionState {
        match self.current.as_ref().map(|s| &s.outcome) {
            None => SessionState::Idle,
            Some(AnalysisOutcome::Pending) => SessionState::Submitting,
            Some(AnalysisOutcome::Success(_)) => SessionState::Succeeded,
            Some(AnalysisOutcome::Failure(_)) => SessionState::Failed,
        }
    }

    pub fn current(&self) -> Option<&Submission> {
        self.current.as_ref()
    }

    pub fn outcome(&self) -> Option<&AnalysisOutcome> {
        self.current.as_ref().map(|s| &s.outcome)
    }

    pub fn staged(&self) -> Option<&UploadRequest> {
        self.staged.as_ref()
    }

    /// A rejected file leaves the session exactly as it was.
    pub fn on_drop(&mut self, file: CandidateFile) -> Result<Accepted, ValidationError> {
        let request = self.policy.validate(file)?;

        if self.settings.auto_analysis_enabled() {
            return Ok(Accepted::Submitted(self.submit(request)));
        }

        self.supersede();
        self.generation += 1;
        self.current = None;
        debug!(file = request.file_name(), "staged image, auto analysis disabled");
        self.staged = Some(request);
        Ok(Accepted::Staged)
    }

    /// Submits the staged file.
    pub fn analyze(&mut self) -> Result<Generation, SessionError> {
        let request = self.staged.take().ok_or(SessionError::NothingStaged)?;
        Ok(self.submit(request))
    }

    fn submit(&mut self, request: UploadRequest) -> Generation {
        self.supersede();
        self.staged = None;
        self.generation += 1;
        let generation = self.generation;

        self.current = Some(Submission {
            generation,
            file_name: request.file_name().to_string(),
            mime: request.mime(),
            size_bytes: request.size_bytes(),
            outcome: AnalysisOutcome::Pending,
        });

        info!(
            generation,
            modality = %self.modality,
            file = request.file_name(),
            "analysis submitted"
        );

        let transport = Arc::clone(&self.transport);
        let modality = self.modality;
        let (task, handle) = abortable(async move { transport.submit(modality, request).await });
        self.in_flight = Some(handle);

        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(result)) => result,
                Ok(Err(_aborted)) => {
                    debug!(generation, "submission aborted");
                    return;
                }
                Err(panic) => Err(TransportError::Internal(panic_message(panic.as_ref()))),
            };
            // The receiver only disappears with the session itself.
            let _ = tx.send(Completion { generation, result });
        });

        generation
    }

    fn supersede(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            debug!(generation = self.generation, "superseding in-flight submission");
            handle.abort();
        }
    }

    /// Applies a completion if it belongs to the latest submission.
    /// Returns whether the outcome changed.
    pub fn apply(&mut self, completion: Completion) -> bool {
        if completion.generation != self.generation {
            debug!(
                stale = completion.generation,
                latest = self.generation,
                "discarding stale completion"
            );
            return false;
        }

        let Some(submission) = self.current.as_mut() else {
            return false;
        };
        if submission.outcome != AnalysisOutcome::Pending {
            return false;
        }

        self.in_flight = None;
        submission.outcome = match completion.result {
            Ok(payload) => {
                info!(
                    generation = completion.generation,
                    verdict = %payload.verdict,
                    "analysis succeeded"
                );
                AnalysisOutcome::Success(payload)
            }
            Err(err) => {
                warn!(generation = completion.generation, error = %err, "analysis failed");
                AnalysisOutcome::Failure(err)
            }
        };
        true
    }

    /// Waits for the next completion and applies it.
    pub async fn next_completion(&mut self) -> bool {
        match self.completions_rx.recv().await {
            Some(completion) => self.apply(completion),
            None => false,
        }
    }

    /// Waits until the latest submission has resolved.
    pub async fn settle(&mut self) -> Option<&AnalysisOutcome> {
        while self.state() == SessionState::Submitting {
            self.next_completion().await;
        }
        self.outcome()
    }

    /// Settles, then resubmits `file` as a fresh drop after each transient
    /// failure, up to `retries` times. Permanent failures are not retried.
    pub async fn settle_with_retry<B: Backoff>(
        &mut self,
        file: &CandidateFile,
        retries: u32,
        backoff: &mut B,
    ) -> Result<Option<&AnalysisOutcome>, ValidationError> {
        let mut attempts = 0;
        loop {
            self.settle().await;
            let transient = matches!(
                self.outcome(),
                Some(AnalysisOutcome::Failure(err)) if err.is_transient()
            );
            if !transient || attempts >= retries {
                break;
            }
            let Some(delay) = backoff.next_backoff() else {
                break;
            };
            attempts += 1;
            warn!(attempt = attempts, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
            tokio::time::sleep(delay).await;

            self.on_drop(file.clone())?;
            if let Some(request) = self.staged.take() {
                self.submit(request);
            }
        }
        Ok(self.outcome())
    }

    /// Recomputed on every call so threshold changes apply without resubmitting.
    pub fn display(&self, threshold: ConfidenceThreshold) -> Option<DisplayResult> {
        match self.outcome()? {
            AnalysisOutcome::Success(payload) => Some(interpret(payload, threshold)),
            _ => None,
        }
    }

    pub fn display_with_settings(&self) -> Option<DisplayResult> {
        self.display(self.settings.confidence_threshold())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "submission task panicked".to_string()
    }
}
