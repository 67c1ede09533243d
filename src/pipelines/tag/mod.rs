//! Corpus annotation: batches through a fault-tolerant executor into streamed JSON files.
mod executor;
#[allow(clippy::module_inception)]
mod pipeline;

pub use executor::{BatchReport, Executor, Layout, DEFAULT_TRANSIENT_SIGNATURES};
pub use pipeline::{FailurePolicy, FileReport, TagSettings, Tagger};
