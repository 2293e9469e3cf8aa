use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{
    FirefliesConfig, ADD_TO_LIVE_MEETING_MUTATION, RECENT_TRANSCRIPTS_QUERY, TRANSCRIPT_QUERY,
};
use crate::error::ProviderError;
use crate::models::{
    AddToLiveMeetingData, BotScheduled, GraphQLResponse, NormalizedTranscript, TranscriptData,
    TranscriptRef, TranscriptsData,
};
use crate::normalize::normalize;

/// The provider operations the resolver and poller depend on.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn schedule_bot(
        &self,
        meeting_link: &str,
        meeting_title: &str,
    ) -> Result<BotScheduled, ProviderError>;

    /// Most recent first, in provider order.
    async fn list_recent(&self, limit: i32) -> Result<Vec<TranscriptRef>, ProviderError>;

    /// `Ok(None)` means the provider has nothing for this id yet.
    async fn fetch_by_id(&self, id: &str) -> Result<Option<NormalizedTranscript>, ProviderError>;

    async fn find_by_title(
        &self,
        search_title: &str,
        max_results: i32,
    ) -> Result<Vec<TranscriptRef>, ProviderError> {
        let needle = search_title.to_lowercase();
        let recent = self.list_recent(max_results).await?;
        Ok(recent
            .into_iter()
            .filter(|t| t.title.to_lowercase().contains(&needle))
            .collect())
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        debug!("Testing Fireflies API connection...");
        let transcripts = self.list_recent(1).await?;
        debug!(
            "Fireflies connection test successful, got {} transcript(s)",
            transcripts.len()
        );
        Ok(())
    }
}

pub struct FirefliesClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl FirefliesClient {
    pub fn new(config: &FirefliesConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("CatNotes/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn execute<T>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Option<T>, ProviderError>
    where
        T: DeserializeOwned,
    {
        debug!("Fireflies {} request", operation);

        let body = json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Fireflies {} request got no response: {}", operation, e);
                ProviderError::Transport(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: "Authentication failed. Check your Fireflies API key.".to_string(),
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: "Rate limited by Fireflies API. Try again later.".to_string(),
            });
        }

        if !status.is_success() {
            let message = serde_json::from_str::<GraphQLResponse<Value>>(&text)
                .ok()
                .and_then(|r| r.errors)
                .and_then(|errors| errors.into_iter().next())
                .map(|e| e.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map(str::to_string)
                        .unwrap_or(text)
                });
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let gql_response: GraphQLResponse<T> = serde_json::from_str(&text).map_err(|e| {
            ProviderError::InvalidResponse(format!("{} response did not parse: {}", operation, e))
        })?;

        if let Some(errors) = &gql_response.errors {
            if !errors.is_empty() {
                let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                return Err(ProviderError::GraphQl(messages.join("; ")));
            }
        }

        Ok(gql_response.data)
    }
}

#[async_trait]
impl TranscriptProvider for FirefliesClient {
    async fn schedule_bot(
        &self,
        meeting_link: &str,
        meeting_title: &str,
    ) -> Result<BotScheduled, ProviderError> {
        let data: AddToLiveMeetingData = self
            .execute(
                "addToLiveMeeting",
                ADD_TO_LIVE_MEETING_MUTATION,
                json!({
                    "meetingLink": meeting_link,
                    "title": meeting_title,
                }),
            )
            .await?
            .ok_or_else(|| ProviderError::InvalidResponse("missing data".to_string()))?;

        let result = data.add_to_live_meeting.ok_or_else(|| {
            ProviderError::InvalidResponse("Failed to schedule bot - no result data".to_string())
        })?;

        if result.success != Some(true) {
            return Err(ProviderError::Rejected("Failed to schedule bot".to_string()));
        }

        Ok(BotScheduled { success: true })
    }

    async fn list_recent(&self, limit: i32) -> Result<Vec<TranscriptRef>, ProviderError> {
        let data: Option<TranscriptsData> = self
            .execute(
                "transcripts",
                RECENT_TRANSCRIPTS_QUERY,
                json!({ "limit": limit }),
            )
            .await?;

        let transcripts = data.and_then(|d| d.transcripts).unwrap_or_default();
        debug!("Listed {} recent transcripts", transcripts.len());

        Ok(transcripts.iter().map(|t| t.to_ref()).collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<NormalizedTranscript>, ProviderError> {
        let data: Option<TranscriptData> = self
            .execute(
                "transcript",
                TRANSCRIPT_QUERY,
                json!({ "transcriptId": id }),
            )
            .await?;

        match data.and_then(|d| d.transcript) {
            Some(payload) if !payload.is_empty() => Ok(Some(normalize(&payload))),
            _ => {
                debug!("Transcript {} not available yet", id);
                Ok(None)
            }
        }
    }
}
