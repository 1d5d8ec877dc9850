//! On-disk corpus snapshots, one JSON file per (category, language) pair.
//!
//! Files are pretty-printed UTF-8 JSON arrays of records so they diff well
//! and keep Cyrillic/Latin titles readable. Reads are forgiving: a missing or
//! unparseable snapshot is an empty corpus. Writes go through a sibling temp
//! file and a rename, so a failed write leaves the previous snapshot intact.

use lexharvest_common::DocumentRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CORPUS_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: String,
        source: serde_json::Error,
    },
}

/// Identifies one corpus: a document category in one language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorpusKey {
    pub category: String,
    pub language: String,
}

impl CorpusKey {
    pub fn new(category: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            language: language.into(),
        }
    }

    /// `{category}_{language with '-' as '_'}`.
    ///
    /// ```
    /// use lexharvest_store::CorpusKey;
    ///
    /// assert_eq!(CorpusKey::new("laws", "uz-Cyrl").file_stem(), "laws_uz_Cyrl");
    /// ```
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.category, self.language.replace('-', "_"))
    }

    /// Invert [`CorpusKey::file_stem`].
    ///
    /// Known language codes are tried first, longest suffix first, so that
    /// `codes_uz_Cyrl` resolves to `uz-Cyrl` rather than to a category
    /// `codes_uz`. Unknown suffixes fall back to splitting at the first
    /// underscore and restoring hyphens.
    pub fn from_file_stem<S: AsRef<str>>(stem: &str, known_languages: &[S]) -> Option<Self> {
        let mut known: Vec<&str> = known_languages.iter().map(AsRef::as_ref).collect();
        known.sort_by_key(|code| std::cmp::Reverse(code.len()));

        for code in known {
            let suffix = format!("_{}", code.replace('-', "_"));
            if let Some(category) = stem.strip_suffix(&suffix) {
                if !category.is_empty() {
                    return Some(Self::new(category, code));
                }
            }
        }

        let (category, suffix) = stem.split_once('_')?;
        if category.is_empty() || suffix.is_empty() {
            return None;
        }
        Some(Self::new(category, suffix.replace('_', "-")))
    }
}

impl fmt::Display for CorpusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.language)
    }
}

/// Ordered records of one corpus, most recently discovered first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    records: Vec<DocumentRecord>,
}

impl Corpus {
    pub fn new(records: Vec<DocumentRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DocumentRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }
}

/// What [`CorpusStore::load_snapshot`] found behind a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Intact,
    Missing,
    /// Present but unreadable or not a record array.
    Corrupt,
}

impl SnapshotState {
    /// Whether the file on disk already holds a valid snapshot.
    pub fn is_intact(self) -> bool {
        self == SnapshotState::Intact
    }
}

/// Parse a snapshot file. `Ok(None)` when the file does not exist, `Err`
/// with a message when it cannot be read or decoded.
pub(crate) fn read_snapshot(path: &Path) -> Result<Option<Corpus>, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };
    serde_json::from_str::<Corpus>(&raw)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Reads and writes corpus snapshots under one data directory.
#[derive(Debug, Clone)]
pub struct CorpusStore {
    data_dir: PathBuf,
}

impl CorpusStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, key: &CorpusKey) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", key.file_stem(), CORPUS_EXTENSION))
    }

    pub fn exists(&self, key: &CorpusKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Load the persisted corpus; anything unreadable is treated as empty.
    pub fn load(&self, key: &CorpusKey) -> Corpus {
        self.load_snapshot(key).0
    }

    /// Like [`CorpusStore::load`], also reporting what was found on disk.
    pub fn load_snapshot(&self, key: &CorpusKey) -> (Corpus, SnapshotState) {
        let path = self.path_for(key);
        match read_snapshot(&path) {
            Ok(Some(corpus)) => {
                tracing::debug!(%key, records = corpus.len(), "store.load");
                (corpus, SnapshotState::Intact)
            }
            Ok(None) => {
                tracing::debug!(%key, path = %path.display(), "store.load.missing");
                (Corpus::default(), SnapshotState::Missing)
            }
            Err(error) => {
                tracing::warn!(%key, path = %path.display(), %error, "store.load.corrupt");
                (Corpus::default(), SnapshotState::Corrupt)
            }
        }
    }

    /// Persist `corpus`, replacing the previous snapshot atomically.
    pub fn save(&self, key: &CorpusKey, corpus: &Corpus) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| StoreError::CreateDir {
            path: self.data_dir.clone(),
            source,
        })?;

        let path = self.path_for(key);
        let mut body = serde_json::to_string_pretty(corpus).map_err(|source| {
            StoreError::Encode {
                what: key.to_string(),
                source,
            }
        })?;
        body.push('\n');

        write_atomically(&path, body.as_bytes())?;
        tracing::debug!(%key, records = corpus.len(), path = %path.display(), "store.save");
        Ok(path)
    }
}

pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, bytes).map_err(|source| StoreError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        StoreError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}
