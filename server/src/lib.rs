use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use engine::persist::{self, DEFAULT_FRESHNESS_WINDOW};
use engine::{MessageRecord, MessageRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod manager;

pub use manager::CorpusManager;

/// Embed title marking a message as a fork of another. Matches what the
/// orchestration layer writes when it re-posts a message elsewhere.
pub const FORK_MARKER_TITLE: &str = "originally said:";

/// The embed fields fork detection needs from an inbound platform message.
#[derive(Debug, Clone, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// If the embeds mark this message as a fork, extracts the source message
/// reference from the marker embed's URL (its last two path segments are
/// the channel and message ids).
pub fn fork_source_of(embeds: &[Embed]) -> Option<MessageRef> {
    let marker = embeds.iter().find(|e| e.title == FORK_MARKER_TITLE)?;
    let mut segments = marker.url.rsplit('/');
    let message_id = segments.next()?;
    let channel_id = segments.next()?;
    if message_id.is_empty() || channel_id.is_empty() {
        return None;
    }
    Some(MessageRef::new(channel_id, message_id))
}

/// Message lifecycle events as delivered by the chat-platform collaborator.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageEvent {
    Created {
        message: MessageRecord,
        #[serde(default)]
        embeds: Vec<Embed>,
    },
    Edited {
        message: MessageRecord,
    },
    Deleted {
        channel_id: String,
        message_id: String,
    },
}

#[derive(Debug, Default, Serialize)]
pub struct EventOutcome {
    pub indexed: bool,
    pub fork_recorded: bool,
    /// Forks whose content must be re-posted to match an edited source.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forks_to_update: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub messages: Vec<MessageRecord>,
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

fn default_max_words() -> usize {
    6
}

#[derive(Debug, Serialize)]
pub struct RankedWord {
    pub word: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    /// Natural-length keyword prefix, re-surfaced to human-readable forms.
    pub words: Vec<String>,
    /// The words joined into a `-`-separated thread title suggestion.
    pub title: String,
    /// The full ranking up to `max_words`, stemmed, with scores.
    pub ranked: Vec<RankedWord>,
}

#[derive(Debug, Deserialize)]
pub struct NoteForkRequest {
    pub source: MessageRef,
    pub fork: MessageRef,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub corpus_id: String,
    pub document_count: u64,
    pub distinct_words: usize,
    pub dirty: bool,
    /// Whether the on-disk snapshot is missing or older than the freshness
    /// window; a scheduler uses this to decide on a rebuild.
    pub stale: bool,
}

pub fn build_app(manager: Arc<CorpusManager>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/corpora/:corpus_id/events", post(handle_event))
        .route("/corpora/:corpus_id/score", post(handle_score))
        .route("/corpora/:corpus_id/forks", post(handle_note_fork))
        .route(
            "/corpora/:corpus_id/forks/:channel_id/:message_id",
            get(handle_forks_of),
        )
        .route("/corpora/:corpus_id/stats", get(handle_stats))
        .route("/corpora/:corpus_id/save", post(handle_save))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(manager)
}

async fn handle_event(
    State(manager): State<Arc<CorpusManager>>,
    Path(corpus_id): Path<String>,
    Json(event): Json<MessageEvent>,
) -> Json<EventOutcome> {
    let index = manager.index(&corpus_id);
    let mut outcome = EventOutcome::default();
    match event {
        MessageEvent::Created { message, embeds } => {
            outcome.indexed = index.process_message(&message);
            if let Some(source) = fork_source_of(&embeds) {
                tracing::info!(message_id = %message.id, source = %source.packed(), "recording forked message");
                index.note_fork(&source, &MessageRef::new(&message.channel_id, &message.id));
                outcome.fork_recorded = true;
            }
        }
        MessageEvent::Edited { message } => {
            // Edits are not re-indexed; the caller gets back the forks it
            // must update to match the new content.
            outcome.forks_to_update =
                index.forks_of(&MessageRef::new(&message.channel_id, &message.id));
        }
        MessageEvent::Deleted {
            channel_id,
            message_id,
        } => {
            tracing::debug!(%channel_id, %message_id, "delete event ignored, no removal path");
        }
    }
    Json(outcome)
}

async fn handle_score(
    State(manager): State<Arc<CorpusManager>>,
    Path(corpus_id): Path<String>,
    Json(req): Json<ScoreRequest>,
) -> Json<ScoreResponse> {
    let index = manager.index(&corpus_id);
    let tfidf = index.score(&req.messages);
    let words = tfidf.auto_top_words(req.max_words);
    let ranked = tfidf
        .ranked(req.max_words)
        .into_iter()
        .map(|(word, score)| RankedWord { word, score })
        .collect();
    Json(ScoreResponse {
        title: words.join("-"),
        words,
        ranked,
    })
}

async fn handle_note_fork(
    State(manager): State<Arc<CorpusManager>>,
    Path(corpus_id): Path<String>,
    Json(req): Json<NoteForkRequest>,
) -> StatusCode {
    manager.index(&corpus_id).note_fork(&req.source, &req.fork);
    StatusCode::NO_CONTENT
}

async fn handle_forks_of(
    State(manager): State<Arc<CorpusManager>>,
    Path((corpus_id, channel_id, message_id)): Path<(String, String, String)>,
) -> Json<Vec<MessageRef>> {
    let index = manager.index(&corpus_id);
    Json(index.forks_of(&MessageRef::new(channel_id, message_id)))
}

async fn handle_stats(
    State(manager): State<Arc<CorpusManager>>,
    Path(corpus_id): Path<String>,
) -> Json<StatsResponse> {
    let index = manager.index(&corpus_id);
    Json(StatsResponse {
        document_count: index.document_count(),
        distinct_words: index.distinct_words(),
        dirty: index.dirty(),
        stale: persist::is_stale(manager.data_dir(), &corpus_id, DEFAULT_FRESHNESS_WINDOW),
        corpus_id,
    })
}

async fn handle_save(
    State(manager): State<Arc<CorpusManager>>,
    Path(corpus_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let index = manager.index(&corpus_id);
    persist::save(manager.data_dir(), &index)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_fork_markers() {
        let embeds = vec![
            Embed {
                title: "something else".into(),
                url: "https://example.com/a/b".into(),
            },
            Embed {
                title: FORK_MARKER_TITLE.into(),
                url: "https://chat.example.com/channels/guild1/chan42/msg99".into(),
            },
        ];
        assert_eq!(
            fork_source_of(&embeds),
            Some(MessageRef::new("chan42", "msg99"))
        );
    }

    #[test]
    fn ignores_messages_without_the_marker() {
        assert_eq!(fork_source_of(&[]), None);
        let embeds = vec![Embed {
            title: "unrelated".into(),
            url: "https://chat.example.com/channels/g/c/m".into(),
        }];
        assert_eq!(fork_source_of(&embeds), None);
    }

    #[test]
    fn rejects_unusable_marker_urls() {
        let embeds = vec![Embed {
            title: FORK_MARKER_TITLE.into(),
            url: "".into(),
        }];
        assert_eq!(fork_source_of(&embeds), None);
    }
}
