//! Incrementally maintained TF-IDF statistics over a corpus of short chat
//! messages, used to suggest thread titles and to track fork relationships
//! between messages. One [`CorpusIndex`] per tenant; the persistence layer
//! snapshots it as a single versioned JSON file.

pub mod fork;
pub mod index;
pub mod message;
pub mod normalize;
pub mod persist;
pub mod score;

pub use fork::{ForkIndex, MessageRef};
pub use index::CorpusIndex;
pub use message::{MessageKind, MessageRecord};
pub use persist::{Autosaver, DEFAULT_AUTOSAVE_DELAY, DEFAULT_FRESHNESS_WINDOW, FORMAT_VERSION};
pub use score::TfIdf;
