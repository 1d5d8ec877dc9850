//! Minimal HTML transport with safe logging and fixed-delay retries.
//!
//! - One [`HttpClient`] owns one cookie-backed session; build a fresh client
//!   per pagination run so the listing GET and its postbacks share affinity
//! - Plain GET and form-encoded POST, both returning the response body as text
//! - Fixed attempt budget with a fixed pause between attempts and a
//!   per-attempt timeout; non-2xx responses count as failed attempts
//! - Optional *raw* request/response logging via `LEXHARVEST_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), lexharvest_http::HttpError> {
//! use lexharvest_config::TransportSettings;
//! use lexharvest_http::HttpClient;
//!
//! let client = HttpClient::new(&TransportSettings::default())?;
//! let url = "https://lex.uz/search/all?act_type=22&lang=3".parse().unwrap();
//! let html = client.get_text(&url).await?;
//! # let _ = html;
//! # Ok(()) }
//! ```
//!
//! Callers that only care about "page or nothing" go through [`PageSource`],
//! which is also the seam tests use to feed canned page sequences.
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), retries, final errors, and
//! (optionally) raw request/response lines (target `http.raw`).

use lexharvest_config::TransportSettings;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, StatusCode, Url};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "LEXHARVEST_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug.
fn make_curl(method: &Method, url: &Url, body: Option<&str>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    if let Some(body) = body {
        let mut s = body.to_string();
        if s.len() > RAW_MAX_BODY {
            s.truncate(floor_char_boundary(&s, RAW_MAX_BODY));
            s.push('…');
        }
        parts.push(format!("-H 'Content-Type: {FORM_CONTENT_TYPE}'"));
        parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
    }
    parts.push(format!("'{}'", url.as_str()));
    parts.join(" ")
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error after {attempts} attempt(s): {message}")]
    Network { attempts: u32, message: String },
    #[error("server returned {status} after {attempts} attempt(s): {body_snippet}")]
    Status {
        status: StatusCode,
        attempts: u32,
        body_snippet: String,
    },
}

// ==============================
// Page source seam
// ==============================

/// Where pages come from. Implemented by [`HttpClient`]; tests implement it
/// with scripted page sequences.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch a listing page with a plain GET.
    async fn get_page(&self, url: &Url) -> Result<String, HttpError>;

    /// Post form fields back to `url` and return the next page.
    async fn post_page(&self, url: &Url, form: &[(String, String)]) -> Result<String, HttpError>;
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    pub timeout: Duration,
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl HttpClient {
    /// Build a client (and with it a fresh cookie session) from transport settings.
    ///
    /// ```no_run
    /// use lexharvest_config::TransportSettings;
    /// use lexharvest_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new(&TransportSettings::default())?;
    /// assert_eq!(client.attempts, 3);
    /// assert_eq!(client.retry_delay, Duration::from_secs(5));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(settings: &TransportSettings) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.user_agent)
                .map_err(|e| HttpError::Build(format!("invalid user agent: {e}")))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_str(&settings.accept)
                .map_err(|e| HttpError::Build(format!("invalid accept header: {e}")))?,
        );

        let inner = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .connect_timeout(settings.timeout())
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self {
            inner,
            timeout: settings.timeout(),
            attempts: settings.attempts.max(1),
            retry_delay: settings.retry_delay(),
        })
    }

    /// Override the pause between failed attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Override the total attempt budget (at least one attempt is always made).
    pub fn with_attempts(mut self, n: u32) -> Self {
        self.attempts = n.max(1);
        self
    }

    /// GET `url` and return the body as text.
    pub async fn get_text(&self, url: &Url) -> Result<String, HttpError> {
        self.request_text_internal(Method::GET, url, None).await
    }

    /// POST `form` (url-encoded) to `url` and return the body as text.
    pub async fn post_form_text(
        &self,
        url: &Url,
        form: &[(String, String)],
    ) -> Result<String, HttpError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        self.request_text_internal(Method::POST, url, Some(body))
            .await
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn request_text_internal(
        &self,
        method: Method,
        url: &Url,
        form_body: Option<String>,
    ) -> Result<String, HttpError> {
        let req_id = format!("r{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed));
        let max_attempts = self.attempts;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            // ----- Build request -----
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(self.timeout);
            if let Some(body) = &form_body {
                rb = rb
                    .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                    .body(body.clone());
            }

            tracing::debug!(
                req_id=%req_id,
                attempt,
                max_attempts,
                method=%method,
                host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                query=url.query().unwrap_or(""),
                timeout_ms=self.timeout.as_millis() as u64,
                form_len=form_body.as_ref().map(String::len).unwrap_or(0),
                "http.request.start"
            );

            if raw_enabled() {
                let curl = make_curl(&method, url, form_body.as_deref());
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            // ----- Send -----
            let t0 = std::time::Instant::now();
            let failure = match rb.send().await {
                Err(err) => Failure::Network(err.to_string()),
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    match resp.bytes().await {
                        Err(err) => Failure::Network(err.to_string()),
                        Ok(bytes) => {
                            let dur_ms = t0.elapsed().as_millis() as u64;
                            tracing::debug!(
                                req_id=%req_id,
                                %status,
                                duration_ms=dur_ms,
                                body_len=bytes.len(),
                                content_type=?headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
                                "http.response.headers"
                            );

                            if raw_enabled() {
                                let mut body_snip = bytes.to_vec();
                                let truncated = body_snip.len() > RAW_MAX_BODY;
                                if truncated {
                                    body_snip.truncate(RAW_MAX_BODY);
                                }
                                let text = String::from_utf8_lossy(&body_snip);
                                tracing::info!(
                                    target:"http.raw",
                                    %req_id,
                                    status=%status,
                                    duration_ms=dur_ms,
                                    body=%text,
                                    truncated
                                );
                            }

                            let snippet = snip_body(&bytes);
                            tracing::trace!(
                                req_id=%req_id,
                                body_snippet=%snippet,
                                "http.response.body_snippet"
                            );

                            // ----- Success path -----
                            if status.is_success() {
                                return Ok(String::from_utf8_lossy(&bytes).into_owned());
                            }
                            Failure::Status(status, snippet)
                        }
                    }
                }
            };

            // ----- Failed attempt: maybe retry -----
            if attempt < max_attempts {
                tracing::warn!(
                    req_id=%req_id,
                    attempt,
                    max_attempts,
                    backoff_ms=self.retry_delay.as_millis() as u64,
                    reason=%failure,
                    "http.retrying"
                );
                sleep(self.retry_delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                attempt,
                max_attempts,
                reason=%failure,
                url=%url,
                "http.error"
            );
            return Err(failure.into_error(attempt));
        }
    }
}

#[async_trait::async_trait]
impl PageSource for HttpClient {
    async fn get_page(&self, url: &Url) -> Result<String, HttpError> {
        self.get_text(url).await
    }

    async fn post_page(&self, url: &Url, form: &[(String, String)]) -> Result<String, HttpError> {
        self.post_form_text(url, form).await
    }
}

// ==============================
// Helpers
// ==============================

/// Why a single attempt failed.
enum Failure {
    Network(String),
    Status(StatusCode, String),
}

impl Failure {
    fn into_error(self, attempts: u32) -> HttpError {
        match self {
            Failure::Network(message) => HttpError::Network { attempts, message },
            Failure::Status(status, body_snippet) => HttpError::Status {
                status,
                attempts,
                body_snippet,
            },
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Network(msg) => write!(f, "network: {msg}"),
            Failure::Status(status, _) => write!(f, "status {status}"),
        }
    }
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).into_owned();
    if snip.len() > 500 {
        snip.truncate(floor_char_boundary(&snip, 500));
        snip.push_str("...");
    }
    snip
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut idx = max.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
