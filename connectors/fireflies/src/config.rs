use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::poll::PollConfig;

pub const FIREFLIES_GRAPHQL_URL: &str = "https://api.fireflies.ai/graphql";
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const DEFAULT_DOCUMENT_PREFIX: &str = "catnotes";
pub const DEFAULT_SEARCH_LIMIT: i32 = 10;
pub const DEFAULT_PORT: u16 = 5000;

pub const ADD_TO_LIVE_MEETING_MUTATION: &str = r#"
mutation AddToLiveMeeting($meetingLink: String!, $title: String) {
  addToLiveMeeting(meeting_link: $meetingLink, title: $title) {
    success
  }
}
"#;

pub const RECENT_TRANSCRIPTS_QUERY: &str = r#"
query GetRecentTranscripts($limit: Int) {
  transcripts(limit: $limit) {
    id
    title
    date
    dateString
  }
}
"#;

pub const TRANSCRIPT_QUERY: &str = r#"
query Transcript($transcriptId: String!) {
  transcript(id: $transcriptId) {
    title
    sentences {
      text
      speaker_name
    }
    summary {
      action_items
      overview
    }
  }
}
"#;

#[derive(Debug, Clone)]
pub struct FirefliesConfig {
    pub api_url: String,
    pub api_key: String,
    /// Per-request timeout for provider calls.
    pub request_timeout: Duration,
    pub poll: PollConfig,
    pub output_dir: PathBuf,
    pub document_prefix: String,
    /// How many recent transcripts a title search scans.
    pub search_limit: i32,
    pub port: u16,
}

impl FirefliesConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("FIREFLIES_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("FIREFLIES_API_KEY must be set"))?;

        let api_url = lookup("FIREFLIES_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| FIREFLIES_GRAPHQL_URL.to_string());

        let defaults = PollConfig::default();
        let interval_secs: u64 =
            parse_or(&lookup, "POLL_INTERVAL_SECS", defaults.interval.as_secs())?;
        let max_attempts: u32 = parse_or(&lookup, "POLL_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(anyhow!("POLL_MAX_ATTEMPTS must be at least 1"));
        }

        // Bound each provider call by one polling interval unless told otherwise.
        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", interval_secs)?;

        Ok(Self {
            api_url,
            api_key,
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            poll: PollConfig {
                interval: Duration::from_secs(interval_secs),
                max_attempts,
            },
            output_dir: lookup("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            document_prefix: lookup("DOCUMENT_PREFIX")
                .unwrap_or_else(|| DEFAULT_DOCUMENT_PREFIX.to_string()),
            search_limit: parse_or(&lookup, "TRANSCRIPT_SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT)?,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        _ => Ok(default),
    }
}
