use crate::fork::ForkIndex;
use crate::index::CorpusIndex;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Bump whenever the snapshot schema changes so old files are discarded
/// instead of migrated.
pub const FORMAT_VERSION: u32 = 1;

/// Snapshots older than this need a rebuild regardless of format version.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// How long a mutated index may stay dirty before the autosaver writes it.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile {
    document_count: u64,
    document_word_counts: HashMap<String, u64>,
    forked_message_index: ForkIndex,
    format_version: u32,
}

pub fn snapshot_path(dir: &Path, corpus_id: &str) -> PathBuf {
    dir.join(format!("{corpus_id}.json"))
}

/// Reads the snapshot for `corpus_id` from `dir`. A missing, unparsable, or
/// version-mismatched file yields `Ok(None)` (the caller rebuilds from
/// scratch); only transient I/O failure is an error.
pub fn load(dir: &Path, corpus_id: &str) -> Result<Option<CorpusIndex>> {
    let path = snapshot_path(dir, corpus_id);
    let blob = match fs::read_to_string(&path) {
        Ok(blob) => blob,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("couldn't read snapshot {}", path.display()))
        }
    };
    let snapshot: SnapshotFile = match serde_json::from_str(&blob) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(corpus_id, error = %err, "discarding unparsable snapshot");
            return Ok(None);
        }
    };
    if snapshot.format_version != FORMAT_VERSION {
        tracing::warn!(
            corpus_id,
            found = snapshot.format_version,
            expected = FORMAT_VERSION,
            "discarding snapshot with mismatched format version"
        );
        return Ok(None);
    }
    Ok(Some(CorpusIndex::from_parts(
        corpus_id,
        snapshot.document_count,
        snapshot.document_word_counts,
        snapshot.forked_message_index,
    )))
}

/// Writes the full snapshot for `index` into `dir`, creating the directory
/// if needed. The whole file is rewritten each time. The index is marked
/// clean only when the write succeeds, so a failed save is retried by the
/// next autosave interval.
pub fn save(dir: &Path, index: &CorpusIndex) -> Result<()> {
    let (document_count, document_word_counts, forked_message_index) = index.export();
    let snapshot = SnapshotFile {
        document_count,
        document_word_counts,
        forked_message_index,
        format_version: FORMAT_VERSION,
    };
    let blob = serde_json::to_string_pretty(&snapshot).context("couldn't serialize snapshot")?;
    fs::create_dir_all(dir)
        .with_context(|| format!("couldn't create snapshot dir {}", dir.display()))?;
    let path = snapshot_path(dir, index.corpus_id());
    fs::write(&path, blob).with_context(|| format!("couldn't write snapshot {}", path.display()))?;
    index.mark_clean();
    Ok(())
}

/// Age of the on-disk snapshot by file modification time, or None if there
/// is no readable snapshot.
pub fn snapshot_age(dir: &Path, corpus_id: &str) -> Option<Duration> {
    let modified = fs::metadata(snapshot_path(dir, corpus_id))
        .ok()?
        .modified()
        .ok()?;
    modified.elapsed().ok()
}

/// Whether the snapshot needs a rebuild. A missing snapshot is stale too;
/// schedulers treat both the same way.
pub fn is_stale(dir: &Path, corpus_id: &str, freshness: Duration) -> bool {
    match snapshot_age(dir, corpus_id) {
        Some(age) => age > freshness,
        None => true,
    }
}

/// Background saver for one index: once the index has been dirty for
/// `delay`, it is written out, so a burst of processed messages costs one
/// disk write instead of one per message. An explicit [`save`] resets the
/// debounce. Dropping (or [`shutdown`](Autosaver::shutdown)) stops the
/// thread and flushes any pending dirty state synchronously.
pub struct Autosaver {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Autosaver {
    pub fn spawn(index: Arc<CorpusIndex>, dir: PathBuf, delay: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let poll = (delay / 4).max(Duration::from_millis(250)).min(delay);
            loop {
                match stop_rx.recv_timeout(poll) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
                if !index.dirty_for().is_some_and(|d| d >= delay) {
                    continue;
                }
                tracing::info!(corpus_id = index.corpus_id(), "autosaving corpus index");
                if let Err(err) = save(&dir, &index) {
                    tracing::warn!(corpus_id = index.corpus_id(), error = %err, "autosave failed, will retry");
                }
            }
            if index.dirty() {
                if let Err(err) = save(&dir, &index) {
                    tracing::warn!(corpus_id = index.corpus_id(), error = %err, "couldn't flush index at shutdown");
                }
            }
        });
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Stops the background thread, flushing pending state first.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        self.stop();
    }
}
