//! Document-record extraction from listing markup.
//!
//! The portal renders each hit as an anchor pointing at `/docs/<id>`
//! (optionally behind a two-letter language segment) with the title as the
//! anchor's inline text. Extraction is a pure function of the markup: records
//! come out in first-seen order, ids repeated within the same page are
//! dropped, and anchors with a blank title are skipped.

use lexharvest_common::DocumentRecord;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Maximum number of records the marked "recent items" section yields.
pub const RECENT_FEED_CAP: usize = 10;

/// `href="<path>"` where path is `/[xx/]docs/<signed id>`, then the inline text.
static DOC_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href="(/(?:[a-z]{2}/)?docs/(-?\d+))"[^>]*>([^<]+)"#)
        .expect("document link pattern")
});

static DOC_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/(?:[a-z]{2}/)?docs/(-?\d+)$").expect("document path pattern")
});

static ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>([^<]*)").expect("anchor pattern"));

pub(crate) static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-\w:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute pattern")
});

/// Apply the portal's locale correction: every `$` becomes `USD `.
///
/// Runs exactly once, when a record is first extracted; persisted titles are
/// never passed through it again.
///
/// ```
/// use lexharvest_web::extract::sanitize_title;
///
/// assert_eq!(sanitize_title("  Grant of $5000 "), "Grant of USD 5000");
/// ```
pub fn sanitize_title(raw: &str) -> String {
    raw.trim().replace('$', "USD ")
}

#[derive(Debug, Clone)]
enum AnchorFilter {
    /// Any link to a document path.
    Any,
    /// Only `<a>` tags carrying `class`, at most `limit` records.
    Marked { class: String, limit: usize },
}

/// Turns page markup into [`DocumentRecord`]s.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    origin: String,
    filter: AnchorFilter,
}

impl RecordExtractor {
    /// Extractor for search listing pages: every document link counts.
    pub fn listing(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            filter: AnchorFilter::Any,
        }
    }

    /// Extractor for the "recent items" section: only anchors whose class
    /// list contains `class`, capped at [`RECENT_FEED_CAP`].
    pub fn marked(origin: &str, class: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            filter: AnchorFilter::Marked {
                class: class.to_string(),
                limit: RECENT_FEED_CAP,
            },
        }
    }

    /// Extract the page-local, deduplicated, order-preserving record list.
    ///
    /// ```
    /// use lexharvest_web::extract::RecordExtractor;
    ///
    /// let html = r#"<a href="/ru/docs/-77">Указ</a> <a href="/docs/-77">dup</a>"#;
    /// let records = RecordExtractor::listing("https://lex.uz").extract(html);
    /// assert_eq!(records.len(), 1);
    /// assert_eq!(records[0].id, "-77");
    /// assert_eq!(records[0].url, "https://lex.uz/ru/docs/-77");
    /// ```
    pub fn extract(&self, markup: &str) -> Vec<DocumentRecord> {
        match &self.filter {
            AnchorFilter::Any => self.extract_links(markup),
            AnchorFilter::Marked { class, limit } => self.extract_marked(markup, class, *limit),
        }
    }

    fn extract_links(&self, markup: &str) -> Vec<DocumentRecord> {
        let mut page = PageRecords::new(&self.origin, None);
        for caps in DOC_LINK.captures_iter(markup) {
            page.offer(&caps[2], &caps[1], &caps[3]);
        }
        page.finish()
    }

    fn extract_marked(&self, markup: &str, class: &str, limit: usize) -> Vec<DocumentRecord> {
        let mut page = PageRecords::new(&self.origin, Some(limit));
        for caps in ANCHOR.captures_iter(markup) {
            if page.is_full() {
                break;
            }
            let attrs = &caps[1];
            let mut href = None;
            let mut has_class = false;
            for attr in ATTRIBUTE.captures_iter(attrs) {
                let value = attr.get(2).or_else(|| attr.get(3)).map_or("", |m| m.as_str());
                match attr[1].to_ascii_lowercase().as_str() {
                    "class" => has_class = value.split_whitespace().any(|c| c == class),
                    "href" => href = Some(value),
                    _ => {}
                }
            }
            if !has_class {
                continue;
            }
            let Some(path) = href.map(|h| h.strip_prefix(self.origin.as_str()).unwrap_or(h)) else {
                continue;
            };
            if let Some(id) = DOC_PATH.captures(path) {
                page.offer(&id[1], path, &caps[2]);
            }
        }
        page.finish()
    }
}

/// Per-call dedup/validation state shared by both extraction modes.
struct PageRecords<'a> {
    origin: &'a str,
    limit: Option<usize>,
    seen: HashSet<String>,
    out: Vec<DocumentRecord>,
}

impl<'a> PageRecords<'a> {
    fn new(origin: &'a str, limit: Option<usize>) -> Self {
        Self {
            origin,
            limit,
            seen: HashSet::new(),
            out: Vec::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.limit.is_some_and(|max| self.out.len() >= max)
    }

    fn offer(&mut self, id: &str, path: &str, raw_title: &str) {
        if self.is_full() || raw_title.trim().is_empty() || self.seen.contains(id) {
            return;
        }
        self.seen.insert(id.to_string());
        self.out.push(DocumentRecord::new(
            id,
            sanitize_title(raw_title),
            format!("{}{}", self.origin, path),
        ));
    }

    fn finish(self) -> Vec<DocumentRecord> {
        self.out
    }
}
