use chrono::{DateTime, Utc};

use crate::models::{ActionItems, NormalizedTranscript, TranscriptPayload};

pub const UNAVAILABLE_MARKER: &str = "No transcript text available.";
pub const DEFAULT_SPEAKER: &str = "Speaker";

pub fn normalize(payload: &TranscriptPayload) -> NormalizedTranscript {
    let utterances: Vec<String> = payload
        .sentences
        .iter()
        .flatten()
        .map(|sentence| {
            let speaker = sentence
                .speaker_name
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(DEFAULT_SPEAKER);
            format!("{}: {}", speaker, sentence.text.as_deref().unwrap_or(""))
        })
        .collect();

    let summary = payload
        .summary
        .as_ref()
        .and_then(|s| s.overview.clone())
        .unwrap_or_default();

    let action_items = match payload.summary.as_ref().and_then(|s| s.action_items.clone()) {
        Some(ActionItems::Many(items)) => items,
        Some(ActionItems::One(item)) => vec![item],
        None => Vec::new(),
    };

    let transcript_text = if !utterances.is_empty() {
        utterances.join("\n\n")
    } else if summary.is_empty() {
        UNAVAILABLE_MARKER.to_string()
    } else {
        String::new()
    };

    NormalizedTranscript {
        transcript_text,
        summary,
        action_items,
    }
}

impl NormalizedTranscript {
    /// False while the provider has neither utterances nor a summary.
    pub fn is_available(&self) -> bool {
        !(self.transcript_text == UNAVAILABLE_MARKER && self.summary.is_empty())
    }
}

/// Body for the full notes document. Headings are literal text.
pub fn compose_notes(transcript: &NormalizedTranscript) -> String {
    let mut body = String::new();

    if !transcript.summary.is_empty() {
        body.push_str("# Summary\n\n");
        body.push_str(&transcript.summary);
        body.push_str("\n\n");
    }

    if !transcript.action_items.is_empty() {
        body.push_str("# Action Items\n\n");
        for item in &transcript.action_items {
            body.push_str(&format!("- {}\n", item));
        }
        body.push('\n');
    }

    if !transcript.transcript_text.is_empty() {
        body.push_str("# Full Transcript\n\n");
        body.push_str(&transcript.transcript_text);
    }

    body.trim_end().to_string()
}

/// Condensed notes: the summary broken into one bullet per sentence plus action items.
pub fn compose_study_notes(
    title: &str,
    recorded_at: Option<DateTime<Utc>>,
    transcript: &NormalizedTranscript,
) -> String {
    let mut notes = String::from("# CatNotes Summarized\n\n");
    notes.push_str(&format!("## {}\n", title));
    if let Some(date) = recorded_at {
        notes.push_str(&format!("Date: {}\n", date.format("%Y-%m-%d")));
    }
    notes.push('\n');

    let points = summary_points(&transcript.summary);
    if !points.is_empty() {
        notes.push_str("## Key Points\n\n");
        for point in points {
            notes.push_str(&format!("* {}\n", point));
        }
        notes.push('\n');
    }

    if !transcript.action_items.is_empty() {
        notes.push_str("## Action Items\n\n");
        for item in &transcript.action_items {
            notes.push_str(&format!("* {}\n", item));
        }
    }

    notes.trim_end().to_string()
}

fn summary_points(summary: &str) -> Vec<&str> {
    summary
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}
