use engine::persist;
use engine::{Autosaver, CorpusIndex};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

struct CorpusHandle {
    index: Arc<CorpusIndex>,
    autosaver: Option<Autosaver>,
}

/// Owns the live per-corpus indexes. Handed into request handlers as shared
/// state rather than living in a global. Indexes load lazily from their
/// snapshot on first touch and fall back to empty when no usable snapshot
/// exists.
pub struct CorpusManager {
    data_dir: PathBuf,
    autosave_delay: Option<Duration>,
    indexes: RwLock<HashMap<String, CorpusHandle>>,
}

impl CorpusManager {
    /// `autosave_delay` of None disables background saving (tests); the
    /// manager then only writes on explicit save and at shutdown.
    pub fn new(data_dir: impl Into<PathBuf>, autosave_delay: Option<Duration>) -> Self {
        Self {
            data_dir: data_dir.into(),
            autosave_delay,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// The live index for `corpus_id`, loading or creating it on first use.
    pub fn index(&self, corpus_id: &str) -> Arc<CorpusIndex> {
        if let Some(handle) = self.indexes.read().get(corpus_id) {
            return handle.index.clone();
        }
        let mut indexes = self.indexes.write();
        // somebody else may have loaded it while we waited for the lock
        if let Some(handle) = indexes.get(corpus_id) {
            return handle.index.clone();
        }
        let index = match persist::load(&self.data_dir, corpus_id) {
            Ok(Some(index)) => {
                tracing::info!(corpus_id, document_count = index.document_count(), "loaded corpus snapshot");
                index
            }
            Ok(None) => CorpusIndex::new(corpus_id),
            Err(err) => {
                tracing::warn!(corpus_id, error = %err, "couldn't read corpus snapshot, starting empty");
                CorpusIndex::new(corpus_id)
            }
        };
        let index = Arc::new(index);
        let autosaver = self.autosave_delay.map(|delay| {
            Autosaver::spawn(index.clone(), self.data_dir.clone(), delay)
        });
        indexes.insert(
            corpus_id.to_string(),
            CorpusHandle {
                index: index.clone(),
                autosaver,
            },
        );
        index
    }

    /// Stops every autosaver and flushes all dirty indexes synchronously.
    /// Called once when the process is going down.
    pub fn shutdown(&self) {
        let mut indexes = self.indexes.write();
        for (corpus_id, handle) in indexes.drain() {
            match handle.autosaver {
                Some(autosaver) => autosaver.shutdown(),
                None => {
                    if handle.index.dirty() {
                        if let Err(err) = persist::save(&self.data_dir, &handle.index) {
                            tracing::warn!(corpus_id = %corpus_id, error = %err, "couldn't flush corpus at shutdown");
                        }
                    }
                }
            }
        }
    }
}
