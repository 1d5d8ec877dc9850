//! Registry of persisted corpora and the summary file describing them.
//!
//! The registry only reads: it lists `*.json` snapshots in the data
//! directory, recovers each (category, language) key from the file name and
//! counts records. The summary it writes mirrors that listing plus a
//! timestamp, grouped as `document_types -> category -> language`.

use crate::corpus::{CORPUS_EXTENSION, CorpusKey, StoreError, read_snapshot, write_atomically};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One persisted corpus as seen on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub key: CorpusKey,
    pub path: PathBuf,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub file: String,
    pub count: usize,
}

/// Contents of the registry summary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySummary {
    pub last_updated: String,
    pub document_types: BTreeMap<String, BTreeMap<String, SummaryEntry>>,
}

impl RegistrySummary {
    pub fn total_records(&self) -> usize {
        self.document_types
            .values()
            .flat_map(|langs| langs.values())
            .map(|e| e.count)
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct CorpusRegistry {
    data_dir: PathBuf,
    languages: Vec<String>,
    ignored: Vec<OsString>,
}

impl CorpusRegistry {
    /// `languages` are the configured codes used to invert file names.
    pub fn new<I, S>(data_dir: impl Into<PathBuf>, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data_dir: data_dir.into(),
            languages: languages.into_iter().map(Into::into).collect(),
            ignored: Vec::new(),
        }
    }

    /// Skip a file (typically the summary itself) when it lives in the data directory.
    pub fn ignoring(mut self, path: &Path) -> Self {
        if path.parent() == Some(self.data_dir.as_path()) {
            if let Some(name) = path.file_name() {
                self.ignored.push(name.to_owned());
            }
        }
        self
    }

    /// All corpora on disk, sorted by key. A missing data directory is an
    /// empty registry.
    pub fn entries(&self) -> Result<Vec<RegistryEntry>, StoreError> {
        let dir = match fs::read_dir(&self.data_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.data_dir.clone(),
                    source,
                });
            }
        };

        let mut entries = Vec::new();
        for item in dir {
            let item = item.map_err(|source| StoreError::Read {
                path: self.data_dir.clone(),
                source,
            })?;
            let path = item.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(CORPUS_EXTENSION)
                || path
                    .file_name()
                    .is_some_and(|name| self.ignored.iter().any(|i| i == name))
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(key) = CorpusKey::from_file_stem(stem, &self.languages) else {
                tracing::debug!(path = %path.display(), "registry.skip.unrecognised_name");
                continue;
            };
            let count = match read_snapshot(&path) {
                Ok(corpus) => corpus.map_or(0, |c| c.len()),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "registry.corrupt_snapshot");
                    0
                }
            };
            entries.push(RegistryEntry { key, path, count });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Build the summary for the current on-disk state.
    pub fn summary(&self, now: DateTime<Utc>) -> Result<RegistrySummary, StoreError> {
        let mut document_types: BTreeMap<String, BTreeMap<String, SummaryEntry>> =
            BTreeMap::new();
        for entry in self.entries()? {
            document_types
                .entry(entry.key.category)
                .or_default()
                .insert(
                    entry.key.language,
                    SummaryEntry {
                        file: entry.path.display().to_string(),
                        count: entry.count,
                    },
                );
        }
        Ok(RegistrySummary {
            last_updated: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            document_types,
        })
    }

    /// Build the summary and write it to `path`.
    pub fn write_summary(
        &self,
        path: &Path,
        now: DateTime<Utc>,
    ) -> Result<RegistrySummary, StoreError> {
        let summary = self.summary(now)?;
        let mut body =
            serde_json::to_string_pretty(&summary).map_err(|source| StoreError::Encode {
                what: "registry summary".into(),
                source,
            })?;
        body.push('\n');

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        write_atomically(path, body.as_bytes())?;
        tracing::info!(
            path = %path.display(),
            corpora = summary.document_types.values().map(BTreeMap::len).sum::<usize>(),
            records = summary.total_records(),
            "registry.summary.written"
        );
        Ok(summary)
    }
}
