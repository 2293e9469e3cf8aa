use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const UNTITLED_MEETING: &str = "Untitled Meeting";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    Timestamp(i64),
    Millis(f64),
    Text(String),
}

impl DateValue {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            DateValue::Timestamp(ms) => DateTime::from_timestamp_millis(*ms),
            DateValue::Millis(ms) => DateTime::from_timestamp_millis(*ms as i64),
            DateValue::Text(s) => s
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis)
                .or_else(|| parse_rfc3339(s)),
        }
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Action items arrive either as one string or as a list depending on the
/// schema version the account is on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ActionItems {
    Many(Vec<String>),
    One(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sentence {
    #[serde(default)]
    pub speaker_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub action_items: Option<ActionItems>,
}

/// Raw `transcript(id)` payload as returned by Fireflies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sentences: Option<Vec<Sentence>>,
    #[serde(default)]
    pub summary: Option<Summary>,
}

impl TranscriptPayload {
    /// An empty object is how some accounts report a transcript that is still processing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.sentences.is_none() && self.summary.is_none()
    }
}

/// One row of the `transcripts(limit)` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentTranscript {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<DateValue>,
    #[serde(default, rename = "dateString")]
    pub date_string: Option<String>,
}

impl RecentTranscript {
    pub fn to_ref(&self) -> TranscriptRef {
        let recorded_at = self
            .date
            .as_ref()
            .and_then(DateValue::to_datetime)
            .or_else(|| self.date_string.as_deref().and_then(parse_rfc3339));

        TranscriptRef {
            id: self.id.clone(),
            title: self
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED_MEETING.to_string()),
            recorded_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptsData {
    #[serde(default)]
    pub transcripts: Option<Vec<RecentTranscript>>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptData {
    #[serde(default)]
    pub transcript: Option<TranscriptPayload>,
}

#[derive(Debug, Deserialize)]
pub struct AddToLiveMeetingData {
    #[serde(default, rename = "addToLiveMeeting")]
    pub add_to_live_meeting: Option<AddToLiveMeetingResult>,
}

#[derive(Debug, Deserialize)]
pub struct AddToLiveMeetingResult {
    #[serde(default)]
    pub success: Option<bool>,
}

/// A transcript on the provider side, identified well enough to fetch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRef {
    pub id: String,
    pub title: String,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTranscript {
    pub transcript_text: String,
    pub summary: String,
    pub action_items: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BotScheduled {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDocument {
    pub path: PathBuf,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

impl GeneratedDocument {
    /// Location of the document under the static `/outputs` route.
    pub fn download_url(&self) -> String {
        format!("/outputs/{}", self.file_name)
    }
}
