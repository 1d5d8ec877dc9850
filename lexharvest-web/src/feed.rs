//! Listing URLs and the two recency feeds.
//!
//! Category listings and the date-ranged recency feed both go through the
//! [`Paginator`]. The capped recency feed is a single GET of a page whose
//! marked anchors are read once; it is deliberately kept on its own path.

use crate::extract::RecordExtractor;
use crate::paginate::{HarvestBatch, Paginator, StopReason};
use chrono::NaiveDate;
use lexharvest_common::{HarvestError, Result};
use lexharvest_config::{Category, HarvestConfig, Language, RecentMode};
use lexharvest_http::PageSource;
use url::Url;

/// Date format the portal expects in `from` / `to`.
pub const PORTAL_DATE_FORMAT: &str = "%d.%m.%Y";

/// `origin` joined with the language's path prefix, e.g. `https://lex.uz/ru`.
pub fn language_base(origin: &str, language: &Language) -> String {
    format!(
        "{}{}",
        origin.trim_end_matches('/'),
        language.path_prefix.trim_end_matches('/')
    )
}

fn parse_url(raw: String) -> Result<Url> {
    Url::parse(&raw).map_err(|e| HarvestError::Url(format!("{raw}: {e}")))
}

/// `{base}/search/all?act_type={code}&lang={param}`
///
/// ```
/// use lexharvest_config::{Category, Language};
/// use lexharvest_web::feed::category_listing_url;
///
/// let url = category_listing_url(
///     "https://lex.uz",
///     &Language::new("ru", 2, "/ru"),
///     &Category::new("laws", 22),
/// )
/// .unwrap();
/// assert_eq!(url.as_str(), "https://lex.uz/ru/search/all?act_type=22&lang=2");
/// ```
pub fn category_listing_url(origin: &str, language: &Language, category: &Category) -> Result<Url> {
    parse_url(format!(
        "{}/search/all?act_type={}&lang={}",
        language_base(origin, language),
        category.act_type,
        language.param
    ))
}

/// `{base}/search/all?from={from}&to={today}&lang={param}`
pub fn date_ranged_url(
    origin: &str,
    language: &Language,
    from: &str,
    to: NaiveDate,
) -> Result<Url> {
    parse_url(format!(
        "{}/search/all?from={}&to={}&lang={}",
        language_base(origin, language),
        from,
        to.format(PORTAL_DATE_FORMAT),
        language.param
    ))
}

/// `{base}{path}` for the page carrying the marked recent-items section.
pub fn capped_feed_url(origin: &str, language: &Language, path: &str) -> Result<Url> {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    parse_url(format!("{}{}", language_base(origin, language), path))
}

/// The recency feed a deployment harvests.
#[derive(Debug, Clone)]
pub enum RecentFeed {
    /// Paginated search over `[from, today]`.
    DateRanged { from: String },
    /// Marked anchors of one page, at most ten, no pagination.
    Capped {
        path: String,
        extractor: RecordExtractor,
    },
}

impl RecentFeed {
    pub fn from_config(cfg: &HarvestConfig) -> Self {
        match cfg.recent.mode {
            RecentMode::DateRanged => RecentFeed::DateRanged {
                from: cfg.recent.from.clone(),
            },
            RecentMode::Capped => RecentFeed::Capped {
                path: cfg.recent.path.clone(),
                extractor: RecordExtractor::marked(&cfg.origin, &cfg.recent.marker_class),
            },
        }
    }

    /// The URL this feed starts from for `language` on `today`.
    pub fn url(&self, origin: &str, language: &Language, today: NaiveDate) -> Result<Url> {
        match self {
            RecentFeed::DateRanged { from } => date_ranged_url(origin, language, from, today),
            RecentFeed::Capped { path, .. } => capped_feed_url(origin, language, path),
        }
    }

    /// Fetch the feed for one language.
    pub async fn harvest<S>(
        &self,
        source: &S,
        paginator: &Paginator,
        origin: &str,
        language: &Language,
        today: NaiveDate,
    ) -> Result<HarvestBatch>
    where
        S: PageSource + ?Sized,
    {
        let url = self.url(origin, language, today)?;
        match self {
            RecentFeed::DateRanged { .. } => Ok(paginator.run(source, &url).await),
            RecentFeed::Capped { extractor, .. } => Ok(fetch_capped(source, extractor, &url).await),
        }
    }
}

async fn fetch_capped<S>(source: &S, extractor: &RecordExtractor, url: &Url) -> HarvestBatch
where
    S: PageSource + ?Sized,
{
    match source.get_page(url).await {
        Ok(markup) => {
            let records = extractor.extract(&markup);
            tracing::info!(%url, records = records.len(), "feed.capped.done");
            HarvestBatch {
                records,
                pages_fetched: 1,
                stop_reason: StopReason::SinglePage,
            }
        }
        Err(err) => {
            tracing::warn!(%url, error = %err, "feed.capped.failed");
            HarvestBatch::failed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cyrl() -> Language {
        Language::new("uz-Cyrl", 3, "")
    }

    #[test]
    fn default_language_has_no_prefix() {
        let url = category_listing_url("https://lex.uz/", &cyrl(), &Category::new("codes", 21))
            .unwrap();
        assert_eq!(url.as_str(), "https://lex.uz/search/all?act_type=21&lang=3");
    }

    #[test]
    fn date_range_uses_portal_date_format() {
        let to = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let url = date_ranged_url("https://lex.uz", &Language::new("en", 1, "/en"), "01.01.2020", to)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://lex.uz/en/search/all?from=01.01.2020&to=07.03.2026&lang=1"
        );
    }

    #[test]
    fn capped_feed_path_is_normalised() {
        let url = capped_feed_url("https://lex.uz", &Language::new("ru", 2, "/ru"), "news").unwrap();
        assert_eq!(url.as_str(), "https://lex.uz/ru/news");
    }

    #[test]
    fn feed_follows_configured_mode() {
        let mut cfg = HarvestConfig::default();
        assert!(matches!(RecentFeed::from_config(&cfg), RecentFeed::DateRanged { .. }));
        cfg.recent.mode = RecentMode::Capped;
        assert!(matches!(RecentFeed::from_config(&cfg), RecentFeed::Capped { .. }));
    }

    #[test]
    fn bad_origin_is_reported() {
        assert!(category_listing_url("not a url", &cyrl(), &Category::new("codes", 21)).is_err());
    }
}
