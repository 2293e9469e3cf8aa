use tracing::{debug, info};

use crate::client::TranscriptProvider;
use crate::error::NotesError;
use crate::models::TranscriptRef;

pub const DEFAULT_MEETING_TITLE: &str = "Meeting Transcription";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Latest,
    ByTitle(String),
    ById { id: String, title: Option<String> },
}

pub async fn resolve(
    provider: &dyn TranscriptProvider,
    lookup: &Lookup,
    search_limit: i32,
) -> Result<TranscriptRef, NotesError> {
    match lookup {
        Lookup::Latest => {
            let latest = provider
                .list_recent(1)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| NotesError::NotFound("No transcripts found".to_string()))?;
            info!("Latest transcript is \"{}\" ({})", latest.title, latest.id);
            Ok(latest)
        }
        Lookup::ByTitle(query) => {
            let mut matches = provider.find_by_title(query, search_limit).await?;
            debug!("{} transcript(s) match \"{}\"", matches.len(), query);

            match matches.len() {
                0 => Err(NotesError::NotFound(format!(
                    "No transcripts found matching \"{}\"",
                    query
                ))),
                1 => Ok(matches.remove(0)),
                _ => Err(NotesError::AmbiguousMatch {
                    query: query.clone(),
                    candidates: matches,
                }),
            }
        }
        Lookup::ById { id, title } => {
            if id.trim().is_empty() {
                return Err(NotesError::InvalidRequest(
                    "Transcript ID is required".to_string(),
                ));
            }
            Ok(TranscriptRef {
                id: id.trim().to_string(),
                title: title
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MEETING_TITLE.to_string()),
                recorded_at: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ref_for, StubProvider};

    fn provider() -> StubProvider {
        StubProvider::new().with_recent(vec![
            ref_for("t3", "Weekly Sync - March"),
            ref_for("t2", "Design Review"),
            ref_for("t1", "weekly sync - February"),
        ])
    }

    #[tokio::test]
    async fn test_latest_takes_first_listed() {
        let provider = provider();
        let resolved = resolve(&provider, &Lookup::Latest, 10).await.unwrap();
        assert_eq!(resolved.id, "t3");
        assert_eq!(provider.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_latest_with_no_transcripts_is_not_found() {
        let provider = StubProvider::new();
        let err = resolve(&provider, &Lookup::Latest, 10).await.unwrap_err();
        assert!(matches!(err, NotesError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_by_title_single_match() {
        let resolved = resolve(&provider(), &Lookup::ByTitle("design".to_string()), 10)
            .await
            .unwrap();
        assert_eq!(resolved, ref_for("t2", "Design Review"));
    }

    #[tokio::test]
    async fn test_by_title_multiple_matches_is_ambiguous_with_all_candidates() {
        let err = resolve(&provider(), &Lookup::ByTitle("WEEKLY".to_string()), 10)
            .await
            .unwrap_err();

        match err {
            NotesError::AmbiguousMatch { query, candidates } => {
                assert_eq!(query, "WEEKLY");
                let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids, vec!["t3", "t1"]);
            }
            other => panic!("expected ambiguous match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_by_title_no_match_is_not_found() {
        let err = resolve(&provider(), &Lookup::ByTitle("retro".to_string()), 10)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("retro"));
        assert!(matches!(err, NotesError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_by_title_respects_search_limit() {
        let err = resolve(&provider(), &Lookup::ByTitle("february".to_string()), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, NotesError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_by_id_needs_no_provider_call() {
        let provider = provider();
        let resolved = resolve(
            &provider,
            &Lookup::ById {
                id: "abc".to_string(),
                title: None,
            },
            10,
        )
        .await
        .unwrap();

        assert_eq!(resolved.id, "abc");
        assert_eq!(resolved.title, DEFAULT_MEETING_TITLE);
        assert_eq!(provider.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_by_id_rejects_blank_id() {
        let err = resolve(
            &StubProvider::new(),
            &Lookup::ById {
                id: "  ".to_string(),
                title: None,
            },
            10,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NotesError::InvalidRequest(_)));
    }
}
