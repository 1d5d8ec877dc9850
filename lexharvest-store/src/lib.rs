//! Persistence side of the harvester.
//!
//! - [`CorpusStore`]: load/save one JSON snapshot per (category, language)
//! - [`merge`]: fold a fetched batch into a persisted corpus (pure)
//! - [`CorpusRegistry`]: enumerate snapshots and write the summary file
//!
//! Loading never fails: a missing or corrupt snapshot reads as an empty
//! corpus. Saving can fail, and callers decide how far that failure reaches.

pub mod corpus;
pub mod merge;
pub mod registry;

pub use corpus::{Corpus, CorpusKey, CorpusStore, SnapshotState, StoreError};
pub use merge::{MergeOutcome, merge};
pub use registry::{CorpusRegistry, RegistryEntry, RegistrySummary, SummaryEntry};
