//! In-memory provider and renderer used by the unit tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::client::TranscriptProvider;
use crate::error::{ProviderError, RenderError};
use crate::models::{
    BotScheduled, GeneratedDocument, NormalizedTranscript, RenderRequest, TranscriptRef,
};
use crate::normalize::UNAVAILABLE_MARKER;
use crate::render::{sanitize_title, DocumentRenderer};

pub fn ref_for(id: &str, title: &str) -> TranscriptRef {
    TranscriptRef {
        id: id.to_string(),
        title: title.to_string(),
        recorded_at: None,
    }
}

pub fn available(text: &str) -> NormalizedTranscript {
    NormalizedTranscript {
        transcript_text: text.to_string(),
        summary: "Short meeting".to_string(),
        action_items: vec!["Follow up".to_string()],
    }
}

pub fn unavailable() -> NormalizedTranscript {
    NormalizedTranscript {
        transcript_text: UNAVAILABLE_MARKER.to_string(),
        summary: String::new(),
        action_items: vec![],
    }
}

type FetchResult = Result<Option<NormalizedTranscript>, ProviderError>;

/// Replays scripted fetch results; once the script runs out every fetch is absent.
#[derive(Default)]
pub struct StubProvider {
    fetches: Mutex<VecDeque<FetchResult>>,
    recent: Vec<TranscriptRef>,
    fetch_calls: AtomicU32,
    list_calls: AtomicU32,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetches(self, fetches: Vec<FetchResult>) -> Self {
        *self.fetches.lock().unwrap() = fetches.into();
        self
    }

    pub fn with_recent(mut self, recent: Vec<TranscriptRef>) -> Self {
        self.recent = recent;
        self
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptProvider for StubProvider {
    async fn schedule_bot(
        &self,
        _meeting_link: &str,
        _meeting_title: &str,
    ) -> Result<BotScheduled, ProviderError> {
        Ok(BotScheduled { success: true })
    }

    async fn list_recent(&self, limit: i32) -> Result<Vec<TranscriptRef>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .recent
            .iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn fetch_by_id(&self, _id: &str) -> FetchResult {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetches.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

/// Records render requests instead of writing files.
#[derive(Default)]
pub struct RecordingRenderer {
    requests: Mutex<Vec<RenderRequest>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentRenderer for RecordingRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<GeneratedDocument, RenderError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let file_name = format!(
            "catnotes-{}-{}.pdf",
            sanitize_title(&request.title),
            requests.len()
        );
        Ok(GeneratedDocument {
            path: PathBuf::from("/tmp/catnotes-test").join(&file_name),
            file_name,
            created_at: Utc::now(),
        })
    }
}
