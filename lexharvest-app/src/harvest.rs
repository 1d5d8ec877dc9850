//! Sequential harvest driver: one (category, language) corpus at a time.

use anyhow::Result;
use chrono::{Local, NaiveDate, Utc};
use lexharvest_common::HarvestError;
use lexharvest_config::{Category, HarvestConfig, Language};
use lexharvest_http::HttpClient;
use lexharvest_store::{CorpusKey, CorpusRegistry, CorpusStore, RegistrySummary, merge};
use lexharvest_web::feed::category_listing_url;
use lexharvest_web::{HarvestBatch, PaginationOptions, Paginator, RecentFeed, RecordExtractor, StopReason};
use std::path::PathBuf;
use tokio::time::sleep;

/// Which corpora a run touches. Empty filters mean "all configured".
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub categories: Vec<String>,
    pub languages: Vec<String>,
    pub listings: bool,
    pub recent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// The snapshot was written: new records arrived, or the file was
    /// missing or corrupt and got (re)initialised.
    Updated { added: usize, total: usize, stop: StopReason },
    /// Nothing new and a valid snapshot exists; it was left alone.
    Unchanged { fetched: usize, stop: StopReason },
    /// The first page never arrived; the corpus was not touched.
    Unreachable,
    /// The corpus could not be written (or the request could not be built).
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PairReport {
    pub key: CorpusKey,
    pub outcome: PairOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub pairs: Vec<PairReport>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.pairs
            .iter()
            .filter(|p| matches!(p.outcome, PairOutcome::Failed(_)))
            .count()
    }

    pub fn added(&self) -> usize {
        self.pairs
            .iter()
            .map(|p| match p.outcome {
                PairOutcome::Updated { added, .. } => added,
                _ => 0,
            })
            .sum()
    }
}

/// Where a pair's batch comes from.
enum Target<'a> {
    Listing(&'a Category),
    Recent,
}

pub struct Harvester {
    cfg: HarvestConfig,
    store: CorpusStore,
    paginator: Paginator,
    recent: RecentFeed,
}

impl Harvester {
    pub fn new(cfg: HarvestConfig) -> Self {
        let paginator = Paginator::new(
            RecordExtractor::listing(&cfg.origin),
            PaginationOptions::from_config(&cfg),
        );
        Self {
            store: CorpusStore::new(&cfg.data_dir),
            recent: RecentFeed::from_config(&cfg),
            paginator,
            cfg,
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.cfg.registry_file.clone()
    }

    /// Harvest every selected pair in order: categories outer, languages
    /// inner, then the recency feed per language. Per-pair failures are
    /// recorded in the report; only an invalid selection is an error.
    pub async fn run(&self, selection: &Selection) -> Result<RunReport> {
        let languages = self.languages(&selection.languages)?;
        let categories = if selection.listings {
            self.categories(&selection.categories)?
        } else {
            Vec::new()
        };
        let today = Local::now().date_naive();

        let mut plan: Vec<(Target<'_>, &Language)> = Vec::new();
        for category in &categories {
            for language in &languages {
                plan.push((Target::Listing(category), language));
            }
        }
        if selection.recent {
            for language in &languages {
                plan.push((Target::Recent, language));
            }
        }

        let mut report = RunReport::default();
        for (i, (target, language)) in plan.into_iter().enumerate() {
            if i > 0 && !self.cfg.pagination.corpus_delay().is_zero() {
                sleep(self.cfg.pagination.corpus_delay()).await;
            }
            let category = match target {
                Target::Listing(c) => c.name.as_str(),
                Target::Recent => self.cfg.recent.category.as_str(),
            };
            let key = CorpusKey::new(category, &language.code);
            tracing::info!(%key, "harvest.pair.start");

            let outcome = match self.fetch(&target, language, today).await {
                Ok(batch) => self.absorb(&key, batch),
                Err(e) => PairOutcome::Failed(e.to_string()),
            };
            match &outcome {
                PairOutcome::Failed(error) => {
                    tracing::error!(%key, %error, "harvest.pair.failed")
                }
                other => tracing::info!(%key, outcome = ?other, "harvest.pair.done"),
            }
            report.pairs.push(PairReport { key, outcome });
        }
        Ok(report)
    }

    async fn fetch(
        &self,
        target: &Target<'_>,
        language: &Language,
        today: NaiveDate,
    ) -> Result<HarvestBatch> {
        // Fresh client, fresh cookie jar: one session per corpus.
        let client = HttpClient::new(&self.cfg.transport)?;
        match target {
            Target::Listing(category) => {
                let url = category_listing_url(&self.cfg.origin, language, category)?;
                Ok(self.paginator.run(&client, &url).await)
            }
            Target::Recent => Ok(self
                .recent
                .harvest(&client, &self.paginator, &self.cfg.origin, language, today)
                .await?),
        }
    }

    /// Merge `batch` into the stored corpus for `key`. Saves when it grew or
    /// when no valid snapshot exists yet.
    fn absorb(&self, key: &CorpusKey, batch: HarvestBatch) -> PairOutcome {
        if !batch.reached_source() {
            return PairOutcome::Unreachable;
        }
        let stop = batch.stop_reason;
        let fetched = batch.len();
        let (persisted, state) = self.store.load_snapshot(key);
        let outcome = merge(persisted, batch.records);
        if outcome.added == 0 && state.is_intact() {
            return PairOutcome::Unchanged { fetched, stop };
        }
        match self.store.save(key, &outcome.corpus) {
            Ok(_) => PairOutcome::Updated {
                added: outcome.added,
                total: outcome.corpus.len(),
                stop,
            },
            Err(e) => PairOutcome::Failed(e.to_string()),
        }
    }

    /// Rewrite the registry summary from what is on disk now.
    pub fn write_summary(&self) -> Result<RegistrySummary> {
        let path = self.summary_path();
        let registry = CorpusRegistry::new(
            self.store.data_dir(),
            self.cfg.languages.iter().map(|l| l.code.as_str()),
        )
        .ignoring(&path);
        Ok(registry.write_summary(&path, Utc::now())?)
    }

    fn languages(&self, wanted: &[String]) -> Result<Vec<&Language>, HarvestError> {
        if wanted.is_empty() {
            return Ok(self.cfg.languages.iter().collect());
        }
        wanted
            .iter()
            .map(|code| {
                self.cfg.language(code).ok_or_else(|| HarvestError::Unknown {
                    kind: "language",
                    name: code.clone(),
                })
            })
            .collect()
    }

    fn categories(&self, wanted: &[String]) -> Result<Vec<&Category>, HarvestError> {
        if wanted.is_empty() {
            return Ok(self.cfg.categories.iter().collect());
        }
        wanted
            .iter()
            .map(|name| {
                self.cfg.category(name).ok_or_else(|| HarvestError::Unknown {
                    kind: "category",
                    name: name.clone(),
                })
            })
            .collect()
    }
}
