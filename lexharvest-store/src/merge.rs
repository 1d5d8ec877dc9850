//! Reconciles a freshly fetched batch with a persisted corpus.
//!
//! Pure: no I/O, no clock. New ids go to the front in batch order, the
//! persisted records follow untouched, and an id that is already known keeps
//! its stored title and link.

use crate::corpus::Corpus;
use lexharvest_common::DocumentRecord;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub corpus: Corpus,
    pub added: usize,
}

/// Prepend the records of `fetched` whose ids `persisted` does not have yet.
///
/// ```
/// use lexharvest_common::DocumentRecord;
/// use lexharvest_store::{merge, Corpus};
///
/// let rec = |id: &str| DocumentRecord::new(id, id, format!("https://lex.uz/docs/{id}"));
/// let persisted = Corpus::new(vec![rec("a"), rec("b"), rec("c")]);
///
/// let outcome = merge(persisted, vec![rec("d"), rec("b")]);
/// let ids: Vec<&str> = outcome.corpus.records().iter().map(|r| r.id.as_str()).collect();
/// assert_eq!(ids, ["d", "a", "b", "c"]);
/// assert_eq!(outcome.added, 1);
/// ```
pub fn merge(persisted: Corpus, fetched: Vec<DocumentRecord>) -> MergeOutcome {
    let fresh: Vec<DocumentRecord> = {
        let known = persisted.ids();
        let mut in_batch = HashSet::new();
        fetched
            .into_iter()
            .filter(|r| !known.contains(r.id.as_str()) && in_batch.insert(r.id.clone()))
            .collect()
    };
    let added = fresh.len();

    if added == 0 {
        return MergeOutcome {
            corpus: persisted,
            added,
        };
    }

    let mut records = fresh;
    records.extend(persisted.into_records());
    tracing::debug!(added, total = records.len(), "merge.done");

    MergeOutcome {
        corpus: Corpus::new(records),
        added,
    }
}
