use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Delimiter of packed `<channelID>+<messageID>` keys. Identifiers supplied
/// by the platform must not contain it.
pub const REF_DELIMITER: char = '+';

/// A channel + message identifier pair addressing one message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

impl MessageRef {
    pub fn new(channel_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
        }
    }

    pub fn packed(&self) -> String {
        format!("{}{}{}", self.channel_id, REF_DELIMITER, self.message_id)
    }

    /// Parses a packed key. Malformed keys (missing delimiter, empty parts,
    /// stray delimiters) yield None; such entries are historic or foreign
    /// data and are skipped rather than propagated as errors.
    pub fn unpack(packed: &str) -> Option<Self> {
        let (channel_id, message_id) = packed.split_once(REF_DELIMITER)?;
        if channel_id.is_empty() || message_id.is_empty() || message_id.contains(REF_DELIMITER) {
            return None;
        }
        Some(Self::new(channel_id, message_id))
    }
}

/// Directed edges from a source message to the copies of it posted
/// elsewhere. Appends are not de-duplicated; callers record each actual
/// fork event at most once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForkIndex {
    edges: HashMap<String, Vec<String>>,
}

impl ForkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_fork(&mut self, source: &MessageRef, fork: &MessageRef) {
        self.edges.entry(source.packed()).or_default().push(fork.packed());
    }

    /// All recorded forks of `source`, in the order they were noted. Empty
    /// when none are known; unparsable stored keys are skipped.
    pub fn forks_of(&self, source: &MessageRef) -> Vec<MessageRef> {
        match self.edges.get(&source.packed()) {
            Some(packed) => packed.iter().filter_map(|p| MessageRef::unpack(p)).collect(),
            None => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_and_unpacks() {
        let r = MessageRef::new("chan", "msg");
        assert_eq!(r.packed(), "chan+msg");
        assert_eq!(MessageRef::unpack("chan+msg"), Some(r));
    }

    #[test]
    fn rejects_malformed_keys() {
        assert_eq!(MessageRef::unpack("nodelimiter"), None);
        assert_eq!(MessageRef::unpack("+msg"), None);
        assert_eq!(MessageRef::unpack("chan+"), None);
        assert_eq!(MessageRef::unpack("a+b+c"), None);
    }

    #[test]
    fn records_and_returns_forks() {
        let mut index = ForkIndex::new();
        let source = MessageRef::new("c1", "m1");
        let fork_a = MessageRef::new("c2", "m2");
        let fork_b = MessageRef::new("c3", "m3");
        index.note_fork(&source, &fork_a);
        index.note_fork(&source, &fork_b);

        assert_eq!(index.forks_of(&source), vec![fork_a, fork_b]);
        assert!(index.forks_of(&MessageRef::new("c9", "m9")).is_empty());
    }
}
