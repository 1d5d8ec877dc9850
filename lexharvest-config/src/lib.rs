//! Loader for harvester configuration with YAML + environment overlays.
//!
//! Every field has a default, so an absent `lexharvest.yaml` yields the lex.uz
//! deployment: seven document categories, four interface languages, the
//! portal's postback control names, and conservative transport timings.
//! Sources are merged in order (file, inline YAML, then `LEXHARVEST_*`
//! variables with `__` as the nesting separator) and `${VAR}` placeholders in
//! string values are expanded before the typed structs are built.
//!
//! The resulting [`HarvestConfig`] is an immutable value handed to each
//! component at construction; nothing reads it from global state.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Page budget applied by the `capped` deployment profile.
pub const CAPPED_PROFILE_MAX_PAGES: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Scheme + host of the portal; record links are `origin + path`.
    pub origin: String,
    /// Directory holding one corpus file per (category, language) pair.
    pub data_dir: PathBuf,
    /// Registry summary written after each run.
    pub registry_file: PathBuf,
    pub profile: Profile,
    /// Explicit page budget; overrides the profile default when set.
    pub max_pages: Option<u32>,
    pub transport: TransportSettings,
    pub pagination: PaginationSettings,
    /// Enumeration order is processing order.
    pub languages: Vec<Language>,
    pub categories: Vec<Category>,
    pub recent: RecentFeedSettings,
    pub logging: LoggingSettings,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            origin: "https://lex.uz".into(),
            data_dir: PathBuf::from("data"),
            registry_file: PathBuf::from("metadata.json"),
            profile: Profile::Full,
            max_pages: None,
            transport: TransportSettings::default(),
            pagination: PaginationSettings::default(),
            languages: default_languages(),
            categories: default_categories(),
            recent: RecentFeedSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl HarvestConfig {
    /// Effective page budget: `max_pages` if set, else the profile default.
    ///
    /// ```
    /// use lexharvest_config::{HarvestConfig, Profile};
    ///
    /// let mut cfg = HarvestConfig::default();
    /// assert_eq!(cfg.page_budget(), None);
    /// cfg.profile = Profile::Capped;
    /// assert_eq!(cfg.page_budget(), Some(5));
    /// cfg.max_pages = Some(2);
    /// assert_eq!(cfg.page_budget(), Some(2));
    /// ```
    pub fn page_budget(&self) -> Option<u32> {
        self.max_pages.or(self.profile.default_max_pages())
    }

    pub fn language(&self, code: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.code == code)
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Reject configurations the harvester cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.origin.starts_with("http://") || self.origin.starts_with("https://")) {
            return Err(ConfigError::Message(format!(
                "origin must be an absolute http(s) URL, got {:?}",
                self.origin
            )));
        }
        if self.transport.attempts == 0 {
            return Err(ConfigError::Message(
                "transport.attempts must be at least 1".into(),
            ));
        }
        if self.max_pages == Some(0) {
            return Err(ConfigError::Message("max_pages must be at least 1".into()));
        }
        if self.pagination.next_marker.is_empty() || self.pagination.event_target.is_empty() {
            return Err(ConfigError::Message(
                "pagination.next_marker and pagination.event_target must be set".into(),
            ));
        }

        let mut suffixes = HashSet::new();
        for lang in &self.languages {
            if !suffixes.insert(lang.file_suffix()) {
                return Err(ConfigError::Message(format!(
                    "duplicate language file suffix {:?}",
                    lang.file_suffix()
                )));
            }
        }
        let mut names = HashSet::new();
        for cat in &self.categories {
            if cat.name.is_empty() || cat.name.contains(['/', '\\']) {
                return Err(ConfigError::Message(format!(
                    "invalid category name {:?}",
                    cat.name
                )));
            }
            if !names.insert(cat.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "duplicate category {:?}",
                    cat.name
                )));
            }
        }
        if names.contains(self.recent.category.as_str()) {
            return Err(ConfigError::Message(format!(
                "recent.category {:?} collides with a listing category",
                self.recent.category
            )));
        }
        Ok(())
    }
}

/// Deployment profile; selects the default page budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Walk every page the portal offers.
    Full,
    /// Stop after [`CAPPED_PROFILE_MAX_PAGES`] pages.
    Capped,
}

impl Profile {
    pub fn default_max_pages(self) -> Option<u32> {
        match self {
            Profile::Full => None,
            Profile::Capped => Some(CAPPED_PROFILE_MAX_PAGES),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "full" => Some(Profile::Full),
            "capped" => Some(Profile::Capped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Total attempts per request, first one included.
    pub attempts: u32,
    pub retry_delay_secs: u64,
    /// Per-attempt timeout.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub accept: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay_secs: 5,
            timeout_secs: 60,
            user_agent: "Mozilla/5.0 (Linux; Android 10) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.120 Mobile Safari/537.36".into(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into(),
        }
    }
}

impl TransportSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationSettings {
    /// Courtesy delay before each postback.
    pub inter_page_delay_ms: u64,
    /// Courtesy delay between two corpus fetches.
    pub corpus_delay_ms: u64,
    /// `__EVENTTARGET` value that asks the server for the next page.
    pub event_target: String,
    /// Substring whose presence in a page means a next page exists.
    pub next_marker: String,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            inter_page_delay_ms: 2000,
            corpus_delay_ms: 2000,
            event_target: "ctl00$cphMain$ucPager$lbNext".into(),
            next_marker: "lbNext".into(),
        }
    }
}

impl PaginationSettings {
    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_millis(self.inter_page_delay_ms)
    }

    pub fn corpus_delay(&self) -> Duration {
        Duration::from_millis(self.corpus_delay_ms)
    }
}

/// One portal interface language.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Language {
    /// Language code as used in corpus keys, e.g. `uz-Cyrl`.
    pub code: String,
    /// Value of the `lang` query parameter.
    pub param: u32,
    /// Path segment prepended to listing paths, e.g. `/ru`; empty for the default language.
    #[serde(default)]
    pub path_prefix: String,
}

impl Language {
    pub fn new(code: &str, param: u32, path_prefix: &str) -> Self {
        Self {
            code: code.into(),
            param,
            path_prefix: path_prefix.into(),
        }
    }

    /// Language code as it appears in file names (`uz-Cyrl` -> `uz_Cyrl`).
    ///
    /// ```
    /// use lexharvest_config::Language;
    ///
    /// assert_eq!(Language::new("uz-Cyrl", 3, "").file_suffix(), "uz_Cyrl");
    /// ```
    pub fn file_suffix(&self) -> String {
        self.code.replace('-', "_")
    }
}

/// One document category and its `act_type` code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub name: String,
    pub act_type: u32,
}

impl Category {
    pub fn new(name: &str, act_type: u32) -> Self {
        Self {
            name: name.into(),
            act_type,
        }
    }
}

/// Which recency feed this deployment harvests. The two are not
/// interchangeable: one is a paginated date-ranged search, the other a
/// single capped section of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecentMode {
    DateRanged,
    Capped,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecentFeedSettings {
    pub mode: RecentMode,
    /// Corpus category name the feed is stored under.
    pub category: String,
    /// Start of the date range (`dd.mm.yyyy`), `date_ranged` mode only.
    pub from: String,
    /// Page carrying the marked anchors, `capped` mode only.
    pub path: String,
    /// Class token marking recent-item anchors, `capped` mode only.
    pub marker_class: String,
}

impl Default for RecentFeedSettings {
    fn default() -> Self {
        Self {
            mode: RecentMode::DateRanged,
            category: "news".into(),
            from: "01.01.2020".into(),
            path: "/".into(),
            marker_class: "lx_news".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: Option<PathBuf>,
    /// `text` or `json`.
    pub format: String,
    pub stderr: bool,
    /// Filter used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: "text".into(),
            stderr: true,
            filter: "info".into(),
        }
    }
}

fn default_languages() -> Vec<Language> {
    vec![
        Language::new("uz-Cyrl", 3, ""),
        Language::new("uz", 4, "/uz"),
        Language::new("ru", 2, "/ru"),
        Language::new("en", 1, "/en"),
    ]
}

fn default_categories() -> Vec<Category> {
    vec![
        Category::new("constitution", 1),
        Category::new("codes", 21),
        Category::new("laws", 22),
        Category::new("president", 3),
        Category::new("government", 4),
        Category::new("ministries", 5),
        Category::new("international", 6),
    ]
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct HarvestConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: &'static str,
}

impl Default for HarvestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestConfigLoader {
    /// Start from built-in defaults; files and snippets layer on top and
    /// `LEXHARVEST_*` variables are applied last.
    ///
    /// ```
    /// use lexharvest_config::HarvestConfigLoader;
    ///
    /// let cfg = HarvestConfigLoader::new()
    ///     .with_yaml_str("max_pages: 3")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.page_budget(), Some(3));
    /// assert_eq!(cfg.languages.len(), 4);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: "LEXHARVEST",
        }
    }

    /// Attach a required YAML/TOML/JSON file; the format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent (scheduled runs can rely on env alone).
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use lexharvest_config::{HarvestConfigLoader, RecentMode};
    ///
    /// let cfg = HarvestConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// recent:
    ///   mode: capped
    ///   marker_class: "news-link"
    /// categories:
    ///   - name: laws
    ///     act_type: 22
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.recent.mode, RecentMode::Capped);
    /// assert_eq!(cfg.recent.category, "news");
    /// assert_eq!(cfg.categories.len(), 1);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    pub fn load(self) -> Result<HarvestConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: HarvestConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_placeholders_inside_paths() {
        temp_env::with_var("LEX_ROOT", Some("/srv/lex"), || {
            let mut v = json!({ "data_dir": "${LEX_ROOT}/data", "max_pages": 4 });
            expand_env_in_value(&mut v);
            assert_eq!(v, json!({ "data_dir": "/srv/lex/data", "max_pages": 4 }));
        });
    }

    #[test]
    fn expansion_follows_chained_variables() {
        temp_env::with_vars(
            [("INNER", Some("agent")), ("OUTER", Some("lex-${INNER}"))],
            || {
                let mut v = json!(["ua=${OUTER}"]);
                expand_env_in_value(&mut v);
                assert_eq!(v, json!(["ua=lex-agent"]));
            },
        );
    }

    #[test]
    fn expansion_terminates_on_cycles() {
        temp_env::with_vars([("PING", Some("${PONG}")), ("PONG", Some("${PING}"))], || {
            let mut v = json!("x=${PING}");
            expand_env_in_value(&mut v);
            assert!(v.as_str().unwrap().contains("${"));
        });
    }

    #[test]
    fn unknown_placeholders_survive() {
        let mut v = json!("${LEXHARVEST_SURELY_UNSET_VAR}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("${LEXHARVEST_SURELY_UNSET_VAR}"));
    }

    #[test]
    fn defaults_describe_the_portal() {
        let cfg = HarvestConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.language("uz-Cyrl").unwrap().param, 3);
        assert_eq!(cfg.language("ru").unwrap().path_prefix, "/ru");
        assert_eq!(cfg.category("codes").unwrap().act_type, 21);
        assert_eq!(cfg.transport.attempts, 3);
        assert_eq!(cfg.transport.retry_delay(), Duration::from_secs(5));
        assert_eq!(cfg.transport.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.recent.mode, RecentMode::DateRanged);
    }

    #[test]
    fn validate_rejects_colliding_language_suffixes() {
        let mut cfg = HarvestConfig::default();
        cfg.languages.push(Language::new("uz_Cyrl", 9, "/x"));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts_and_zero_budget() {
        let mut cfg = HarvestConfig::default();
        cfg.transport.attempts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = HarvestConfig::default();
        cfg.max_pages = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn profile_parse_accepts_known_names() {
        assert_eq!(Profile::parse("Capped"), Some(Profile::Capped));
        assert_eq!(Profile::parse("full"), Some(Profile::Full));
        assert_eq!(Profile::parse("fast"), None);
    }
}
