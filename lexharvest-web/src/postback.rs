//! Continuation state for the portal's postback pagination.
//!
//! Each results page carries three hidden form fields that the server needs
//! back verbatim to render the following page. They are captured from page N
//! into an immutable [`ContinuationState`], used for exactly one request, and
//! dropped.

use crate::extract::ATTRIBUTE;
use regex::Regex;
use std::sync::LazyLock;

pub const EVENT_TARGET: &str = "__EVENTTARGET";
pub const EVENT_ARGUMENT: &str = "__EVENTARGUMENT";
pub const VIEW_STATE: &str = "__VIEWSTATE";
pub const VIEW_STATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
pub const EVENT_VALIDATION: &str = "__EVENTVALIDATION";

static INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("input pattern"));

/// The three opaque tokens required to request the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationState {
    view_state: String,
    view_state_generator: String,
    event_validation: String,
}

impl ContinuationState {
    pub fn new(
        view_state: impl Into<String>,
        view_state_generator: impl Into<String>,
        event_validation: impl Into<String>,
    ) -> Self {
        Self {
            view_state: view_state.into(),
            view_state_generator: view_state_generator.into(),
            event_validation: event_validation.into(),
        }
    }

    /// Read the hidden fields out of `markup`. Returns `None` unless all three
    /// are present with a non-empty value; attribute order does not matter.
    ///
    /// ```
    /// use lexharvest_web::postback::ContinuationState;
    ///
    /// let html = r#"
    ///   <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="dDw=" />
    ///   <input type="hidden" value="CA0B0334" name="__VIEWSTATEGENERATOR" />
    ///   <input type="hidden" name="__EVENTVALIDATION" value="/wEW" />
    /// "#;
    /// let state = ContinuationState::capture(html).unwrap();
    /// assert_eq!(state.view_state(), "dDw=");
    /// assert!(ContinuationState::capture("<form></form>").is_none());
    /// ```
    pub fn capture(markup: &str) -> Option<Self> {
        let mut view_state = None;
        let mut generator = None;
        let mut validation = None;

        for input in INPUT.captures_iter(markup) {
            let mut name = None;
            let mut id = None;
            let mut value = None;
            for attr in ATTRIBUTE.captures_iter(&input[1]) {
                let v = attr.get(2).or_else(|| attr.get(3)).map_or("", |m| m.as_str());
                match attr[1].to_ascii_lowercase().as_str() {
                    "name" => name = Some(v),
                    "id" => id = Some(v),
                    "value" => value = Some(v),
                    _ => {}
                }
            }
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            let slot = match name.or(id) {
                Some(VIEW_STATE) => &mut view_state,
                Some(VIEW_STATE_GENERATOR) => &mut generator,
                Some(EVENT_VALIDATION) => &mut validation,
                _ => continue,
            };
            // the first occurrence wins if a page repeats a field
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }

        Some(Self {
            view_state: view_state?,
            view_state_generator: generator?,
            event_validation: validation?,
        })
    }

    pub fn view_state(&self) -> &str {
        &self.view_state
    }

    pub fn view_state_generator(&self) -> &str {
        &self.view_state_generator
    }

    pub fn event_validation(&self) -> &str {
        &self.event_validation
    }

    /// Form fields for the postback asking `event_target` for the next page.
    pub fn postback_form(&self, event_target: &str) -> Vec<(String, String)> {
        vec![
            (EVENT_TARGET.to_string(), event_target.to_string()),
            (EVENT_ARGUMENT.to_string(), String::new()),
            (VIEW_STATE.to_string(), self.view_state.clone()),
            (
                VIEW_STATE_GENERATOR.to_string(),
                self.view_state_generator.clone(),
            ),
            (EVENT_VALIDATION.to_string(), self.event_validation.clone()),
        ]
    }
}

/// Whether the page renders the "next page" control.
pub fn has_next_control(markup: &str, marker: &str) -> bool {
    !marker.is_empty() && markup.contains(marker)
}
