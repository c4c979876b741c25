use crate::fork::{ForkIndex, MessageRef};
use crate::message::{MessageKind, MessageRecord};
use crate::normalize::{normalize, normalize_word};
use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// The standard IDF formula, `log10(N / (df + 1))`. May be negative when a
/// word appears in a majority of documents; that is intentional and callers
/// must not clamp it. A zero-document corpus yields `-inf`.
pub(crate) fn idf_value(document_count: u64, document_frequency: u64) -> f64 {
    (document_count as f64 / (document_frequency as f64 + 1.0)).log10()
}

pub(crate) struct IndexState {
    pub document_count: u64,
    /// Per word: the number of distinct documents containing it at least
    /// once. Never exceeds `document_count`.
    pub document_word_counts: HashMap<String, u64>,
    pub forks: ForkIndex,
    /// Message ids already counted, so replayed events don't double count.
    /// In-memory only; the periodic staleness rebuild bounds drift across
    /// restarts.
    seen_messages: HashSet<String>,
    /// Lazily rebuilt on the first read after a mutation.
    idf_cache: Option<HashMap<String, f64>>,
    /// Set at the first mutation after a clean state; cleared by save.
    dirty_since: Option<Instant>,
}

impl IndexState {
    fn touch(&mut self) {
        if self.dirty_since.is_none() {
            self.dirty_since = Some(Instant::now());
        }
    }

    fn rebuild_idf_cache(&mut self) {
        let n = self.document_count;
        let table = self
            .document_word_counts
            .iter()
            .map(|(word, df)| (word.clone(), idf_value(n, *df)))
            .collect();
        self.idf_cache = Some(table);
    }
}

/// A read-locked view over the IDF table, handed out by
/// [`CorpusIndex::with_idf`] so batch scoring pays for the lock once.
pub(crate) struct IdfView<'a> {
    document_count: u64,
    table: &'a HashMap<String, f64>,
}

impl IdfView<'_> {
    /// IDF of an already normalized word. Words absent from the corpus use
    /// a document frequency of zero.
    pub fn idf(&self, word: &str) -> f64 {
        match self.table.get(word) {
            Some(value) => *value,
            None => idf_value(self.document_count, 0),
        }
    }
}

/// Per-corpus word statistics plus the fork reference index, one instance
/// per tenant. All mutable state sits behind a single reader/writer lock;
/// the persistence layer serializes the whole thing as one unit.
pub struct CorpusIndex {
    corpus_id: String,
    state: RwLock<IndexState>,
}

impl CorpusIndex {
    pub fn new(corpus_id: impl Into<String>) -> Self {
        Self::from_parts(corpus_id, 0, HashMap::new(), ForkIndex::new())
    }

    pub(crate) fn from_parts(
        corpus_id: impl Into<String>,
        document_count: u64,
        document_word_counts: HashMap<String, u64>,
        forks: ForkIndex,
    ) -> Self {
        Self {
            corpus_id: corpus_id.into(),
            state: RwLock::new(IndexState {
                document_count,
                document_word_counts,
                forks,
                seen_messages: HashSet::new(),
                idf_cache: None,
                dirty_since: None,
            }),
        }
    }

    pub fn corpus_id(&self) -> &str {
        &self.corpus_id
    }

    /// Folds a message into the corpus statistics: every distinct
    /// normalized word in it counts one more document, and the document
    /// count grows by one. System messages and already seen message ids are
    /// ignored. Returns whether the message was actually indexed.
    pub fn process_message(&self, msg: &MessageRecord) -> bool {
        if msg.kind != MessageKind::User {
            return false;
        }
        let words: HashSet<String> = normalize(&msg.content).into_iter().collect();
        let mut state = self.state.write();
        if !state.seen_messages.insert(msg.id.clone()) {
            tracing::debug!(message_id = %msg.id, "message already indexed, skipping");
            return false;
        }
        state.document_count += 1;
        for word in words {
            *state.document_word_counts.entry(word).or_insert(0) += 1;
        }
        state.idf_cache = None;
        state.touch();
        true
    }

    /// IDF of a word in any surface form. Words that normalize to nothing
    /// (stop words, pure punctuation) are never indexed and report 0.
    pub fn idf(&self, word: &str) -> f64 {
        match normalize_word(word) {
            Some(stem) => self.with_idf(|view| view.idf(&stem)),
            None => 0.0,
        }
    }

    /// Runs `f` against the IDF table under a read lock, rebuilding the
    /// cache first if a mutation invalidated it (double-checked via an
    /// upgradable read).
    pub(crate) fn with_idf<R>(&self, f: impl FnOnce(IdfView<'_>) -> R) -> R {
        let state = self.state.upgradable_read();
        let state: RwLockReadGuard<'_, IndexState> = if state.idf_cache.is_none() {
            let mut state = RwLockUpgradableReadGuard::upgrade(state);
            state.rebuild_idf_cache();
            RwLockWriteGuard::downgrade(state)
        } else {
            RwLockUpgradableReadGuard::downgrade(state)
        };
        let table = state.idf_cache.as_ref().expect("cache was just rebuilt");
        f(IdfView {
            document_count: state.document_count,
            table,
        })
    }

    pub fn document_count(&self) -> u64 {
        self.state.read().document_count
    }

    /// The number of distinct documents containing `word` (any surface
    /// form) at least once.
    pub fn document_frequency(&self, word: &str) -> u64 {
        match normalize_word(word) {
            Some(stem) => self
                .state
                .read()
                .document_word_counts
                .get(&stem)
                .copied()
                .unwrap_or(0),
            None => 0,
        }
    }

    pub fn distinct_words(&self) -> usize {
        self.state.read().document_word_counts.len()
    }

    /// Records that `fork` is a copy of `source`.
    pub fn note_fork(&self, source: &MessageRef, fork: &MessageRef) {
        let mut state = self.state.write();
        state.forks.note_fork(source, fork);
        state.touch();
    }

    /// All known forks of `source`; empty when none.
    pub fn forks_of(&self, source: &MessageRef) -> Vec<MessageRef> {
        self.state.read().forks.forks_of(source)
    }

    /// Whether there is state not yet persisted.
    pub fn dirty(&self) -> bool {
        self.state.read().dirty_since.is_some()
    }

    /// How long the index has been dirty, if it is.
    pub fn dirty_for(&self) -> Option<Duration> {
        self.state.read().dirty_since.map(|since| since.elapsed())
    }

    pub(crate) fn mark_clean(&self) {
        self.state.write().dirty_since = None;
    }

    pub(crate) fn export(&self) -> (u64, HashMap<String, u64>, ForkIndex) {
        let state = self.state.read();
        (
            state.document_count,
            state.document_word_counts.clone(),
            state.forks.clone(),
        )
    }

    /// Scores a batch of messages against this corpus. Defined in
    /// [`crate::score`].
    pub fn score(&self, messages: &[MessageRecord]) -> crate::score::TfIdf {
        crate::score::score(self, messages)
    }
}
