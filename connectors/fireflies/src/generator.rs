use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use crate::client::TranscriptProvider;
use crate::error::NotesError;
use crate::models::{BotScheduled, GeneratedDocument, TranscriptRef};
use crate::poll::{DocumentKind, PollConfig, PollOutcome, Poller};
use crate::render::DocumentRenderer;
use crate::resolve::{resolve, Lookup};

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub kind: DocumentKind,
    pub interval_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    /// Key for cancelling this poll; defaults to the transcript id.
    pub poll_id: Option<String>,
}

struct ActivePoll {
    generation: u64,
    cancel: watch::Sender<bool>,
}

pub struct NotesGenerator {
    provider: Arc<dyn TranscriptProvider>,
    renderer: Arc<dyn DocumentRenderer>,
    poll_config: PollConfig,
    search_limit: i32,
    /// Several polls may share an id; cancelling the id signals all of them.
    active_polls: DashMap<String, Vec<ActivePoll>>,
    next_generation: AtomicU64,
}

impl NotesGenerator {
    pub fn new(
        provider: Arc<dyn TranscriptProvider>,
        renderer: Arc<dyn DocumentRenderer>,
        poll_config: PollConfig,
        search_limit: i32,
    ) -> Self {
        Self {
            provider,
            renderer,
            poll_config,
            search_limit,
            active_polls: DashMap::new(),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll_config
    }

    pub async fn schedule_bot(
        &self,
        meeting_link: &str,
        meeting_title: &str,
    ) -> Result<BotScheduled, NotesError> {
        if meeting_link.trim().is_empty() {
            return Err(NotesError::InvalidRequest(
                "Meeting link is required".to_string(),
            ));
        }

        info!("Scheduling bot for \"{}\" at {}", meeting_title, meeting_link);
        let scheduled = self
            .provider
            .schedule_bot(meeting_link.trim(), meeting_title)
            .await?;
        info!("Bot scheduled for \"{}\"", meeting_title);

        Ok(scheduled)
    }

    pub async fn list_recent(&self, limit: i32) -> Result<Vec<TranscriptRef>, NotesError> {
        Ok(self.provider.list_recent(limit).await?)
    }

    pub async fn check_provider(&self) -> Result<(), NotesError> {
        Ok(self.provider.test_connection().await?)
    }

    pub async fn resolve(&self, lookup: &Lookup) -> Result<TranscriptRef, NotesError> {
        resolve(self.provider.as_ref(), lookup, self.search_limit).await
    }

    /// Resolves the lookup, then polls until the document is rendered.
    pub async fn generate(
        &self,
        lookup: &Lookup,
        options: GenerateOptions,
    ) -> Result<GeneratedDocument, NotesError> {
        let transcript = self.resolve(lookup).await?;
        self.generate_for(&transcript, options).await
    }

    pub async fn generate_for(
        &self,
        transcript: &TranscriptRef,
        options: GenerateOptions,
    ) -> Result<GeneratedDocument, NotesError> {
        let config = self
            .poll_config
            .with_overrides(options.interval_secs, options.max_attempts);
        let poll_id = options
            .poll_id
            .clone()
            .unwrap_or_else(|| transcript.id.clone());

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        self.active_polls
            .entry(poll_id.clone())
            .or_default()
            .push(ActivePoll {
                generation,
                cancel: cancel_tx,
            });
        // Removes the registration however this future ends, including being dropped.
        let _registration = Registration {
            polls: &self.active_polls,
            poll_id: poll_id.clone(),
            generation,
        };

        let poller = Poller::new(self.provider.as_ref(), self.renderer.as_ref(), config);
        let outcome = poller.run(transcript, options.kind, cancel_rx).await;

        match outcome {
            Ok(PollOutcome::Succeeded(document)) => Ok(document),
            Ok(PollOutcome::Exhausted { attempts }) => Err(NotesError::Exhausted {
                transcript_id: transcript.id.clone(),
                attempts,
            }),
            Ok(PollOutcome::Cancelled { attempts }) => Err(NotesError::Cancelled {
                transcript_id: transcript.id.clone(),
                attempts,
            }),
            Err(e) => {
                error!("Generating document for {} failed: {}", transcript.id, e);
                Err(e)
            }
        }
    }

    /// Signals every poll registered under `poll_id`. Takes effect at their next wait.
    pub fn cancel(&self, poll_id: &str) -> bool {
        match self.active_polls.get(poll_id) {
            Some(polls) if !polls.is_empty() => {
                info!("Cancelling {} poll(s) under {}", polls.len(), poll_id);
                for active in polls.iter() {
                    active.cancel.send_replace(true);
                }
                true
            }
            _ => false,
        }
    }

    pub fn active_polls(&self) -> Vec<String> {
        self.active_polls.iter().map(|e| e.key().clone()).collect()
    }
}

struct Registration<'a> {
    polls: &'a DashMap<String, Vec<ActivePoll>>,
    poll_id: String,
    generation: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if let Some(mut polls) = self.polls.get_mut(&self.poll_id) {
            polls.retain(|active| active.generation != self.generation);
        }
        // The shard guard above must be released before this call.
        self.polls.remove_if(&self.poll_id, |_, polls| polls.is_empty());
    }
}
