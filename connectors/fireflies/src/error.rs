use thiserror::Error;

use crate::models::TranscriptRef;

/// Failures talking to the Fireflies API.
///
/// `Transport` means no response was received at all; every other variant means
/// the provider answered and refused or returned something unusable.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No response received from Fireflies API: {0}")]
    Transport(String),
    #[error("Fireflies API returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Fireflies API error: {0}")]
    GraphQl(String),
    #[error("Fireflies rejected the request: {0}")]
    Rejected(String),
    #[error("Invalid Fireflies API response: {0}")]
    InvalidResponse(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF error: {0}")]
    Pdf(String),
}

#[derive(Debug, Error)]
pub enum NotesError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("{0}")]
    NotFound(String),
    #[error("Multiple transcripts match \"{query}\" ({} candidates)", .candidates.len())]
    AmbiguousMatch {
        query: String,
        candidates: Vec<TranscriptRef>,
    },
    #[error("Transcript {transcript_id} not ready after {attempts} attempts")]
    Exhausted { transcript_id: String, attempts: u32 },
    #[error("Polling for transcript {transcript_id} was cancelled after {attempts} attempts")]
    Cancelled { transcript_id: String, attempts: u32 },
    #[error("{0}")]
    InvalidRequest(String),
}
