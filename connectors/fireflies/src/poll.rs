use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::TranscriptProvider;
use crate::error::NotesError;
use crate::models::{GeneratedDocument, NormalizedTranscript, RenderRequest, TranscriptRef};
use crate::normalize::{compose_notes, compose_study_notes};
use crate::render::DocumentRenderer;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
/// Shortest interval a per-request override may ask for.
pub const MIN_OVERRIDE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollConfig {
    /// Applies per-request overrides on top of the configured budget.
    ///
    /// Overrides can only shrink the attempt budget, and an overridden interval
    /// is never shorter than [`MIN_OVERRIDE_INTERVAL`].
    pub fn with_overrides(self, interval_secs: Option<u64>, max_attempts: Option<u32>) -> Self {
        Self {
            interval: interval_secs
                .map(|secs| Duration::from_secs(secs).max(MIN_OVERRIDE_INTERVAL))
                .unwrap_or(self.interval),
            max_attempts: max_attempts
                .filter(|n| *n > 0)
                .map(|n| n.min(self.max_attempts))
                .unwrap_or(self.max_attempts),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollState {
    pub transcript: TranscriptRef,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollState {
    fn new(transcript: TranscriptRef, config: PollConfig) -> Self {
        Self {
            transcript,
            attempts_made: 0,
            max_attempts: config.max_attempts.max(1),
            interval: config.interval,
        }
    }

    fn budget_spent(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Succeeded(GeneratedDocument),
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentKind {
    #[default]
    Notes,
    StudyNotes,
}

impl DocumentKind {
    pub fn render_request(
        &self,
        transcript: &TranscriptRef,
        normalized: &NormalizedTranscript,
    ) -> RenderRequest {
        match self {
            DocumentKind::Notes => RenderRequest {
                title: transcript.title.clone(),
                body: compose_notes(normalized),
            },
            DocumentKind::StudyNotes => RenderRequest {
                title: format!("{} - Summary", transcript.title),
                body: compose_study_notes(&transcript.title, transcript.recorded_at, normalized),
            },
        }
    }
}

/// Drives fetch attempts for one transcript until it renders, the budget runs
/// out, a provider error occurs, or the cancel signal fires during a wait.
pub struct Poller<'a> {
    provider: &'a dyn TranscriptProvider,
    renderer: &'a dyn DocumentRenderer,
    config: PollConfig,
}

impl<'a> Poller<'a> {
    pub fn new(
        provider: &'a dyn TranscriptProvider,
        renderer: &'a dyn DocumentRenderer,
        config: PollConfig,
    ) -> Self {
        Self {
            provider,
            renderer,
            config,
        }
    }

    pub async fn run(
        &self,
        transcript: &TranscriptRef,
        kind: DocumentKind,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<PollOutcome, NotesError> {
        let mut state = PollState::new(transcript.clone(), self.config);

        info!(
            "Polling transcript {} (\"{}\"): up to {} attempts every {:?}",
            state.transcript.id, state.transcript.title, state.max_attempts, state.interval
        );

        loop {
            state.attempts_made += 1;
            debug!(
                "Fetch attempt {}/{} for transcript {}",
                state.attempts_made, state.max_attempts, state.transcript.id
            );

            // Provider errors end the poll immediately.
            let fetched = self.provider.fetch_by_id(&state.transcript.id).await?;

            if let Some(normalized) = fetched.filter(NormalizedTranscript::is_available) {
                let request = kind.render_request(&state.transcript, &normalized);
                let document = self.renderer.render(&request).await?;
                info!(
                    "Transcript {} rendered after {} attempt(s): {}",
                    state.transcript.id,
                    state.attempts_made,
                    document.path.display()
                );
                return Ok(PollOutcome::Succeeded(document));
            }

            if state.budget_spent() {
                warn!(
                    "Transcript {} still not ready after {} attempts, giving up",
                    state.transcript.id, state.attempts_made
                );
                return Ok(PollOutcome::Exhausted {
                    attempts: state.attempts_made,
                });
            }

            info!(
                "Transcript {} not ready (attempt {}/{}), retrying in {:?}",
                state.transcript.id, state.attempts_made, state.max_attempts, state.interval
            );

            if !suspend(state.interval, &mut cancel).await {
                info!(
                    "Polling for transcript {} cancelled after {} attempt(s)",
                    state.transcript.id, state.attempts_made
                );
                return Ok(PollOutcome::Cancelled {
                    attempts: state.attempts_made,
                });
            }
        }
    }
}

/// Waits one interval. Returns false if cancellation was requested while waiting.
async fn suspend(interval: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if *cancel.borrow() {
        return false;
    }

    let wait = sleep(interval);
    tokio::pin!(wait);

    loop {
        tokio::select! {
            _ = &mut wait => return true,
            changed = cancel.changed() => match changed {
                Ok(()) if *cancel.borrow() => return false,
                Ok(()) => continue,
                // Sender gone: nobody can cancel any more.
                Err(_) => {
                    (&mut wait).await;
                    return true;
                }
            },
        }
    }
}
