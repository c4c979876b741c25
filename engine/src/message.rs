use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether a message was authored by a user or generated by the platform.
/// Only user messages count toward corpus statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    User,
    System,
}

/// The minimal projection of a platform message the engine needs. Owned by
/// the caller; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub channel_id: String,
    pub content: String,
    /// Reaction counts keyed by emoji symbol.
    #[serde(default)]
    pub reactions: HashMap<String, u32>,
    #[serde(default)]
    pub kind: MessageKind,
}

impl MessageRecord {
    pub fn user(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            content: content.into(),
            reactions: HashMap::new(),
            kind: MessageKind::User,
        }
    }
}
