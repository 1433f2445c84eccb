//! Search request representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::GatewayError;

/// Default number of results requested.
pub const DEFAULT_NUM: i64 = 5;
/// Smallest result count accepted upstream.
pub const MIN_NUM: i64 = 1;
/// Largest result count accepted upstream.
pub const MAX_NUM: i64 = 10;

/// Safe search level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    /// No filtering.
    Off,
    /// Filter explicit results.
    Active,
}

impl SafeSearch {
    /// Upstream parameter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Active => "active",
        }
    }
}

impl FromStr for SafeSearch {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "active" => Ok(Self::Active),
            other => Err(GatewayError::InvalidInput(format!(
                "safe must be one of: off, active (got {:?})",
                other
            ))),
        }
    }
}

impl fmt::Display for SafeSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `siteSearch` includes or excludes the given site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteSearchFilter {
    /// Only results from the site.
    Include,
    /// No results from the site.
    Exclude,
}

impl SiteSearchFilter {
    /// Upstream parameter value (`i` or `e`).
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Include => "i",
            Self::Exclude => "e",
        }
    }
}

impl FromStr for SiteSearchFilter {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" | "i" => Ok(Self::Include),
            "exclude" | "e" => Ok(Self::Exclude),
            other => Err(GatewayError::InvalidInput(format!(
                "siteSearchFilter must be one of: include, exclude (got {:?})",
                other
            ))),
        }
    }
}

/// A search request with all tool arguments.
///
/// Field names on the wire follow the upstream parameter names (`q`, `num`,
/// `start`, ...). Enumerated fields stay raw strings here so that an invalid
/// value is reported as an input error by the gateway rather than as a
/// deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// The search terms.
    #[serde(rename = "q")]
    pub query: String,
    /// Requested number of results; clamped to `[1, 10]`.
    #[serde(rename = "num", default = "default_num", deserialize_with = "lenient_int")]
    pub result_count: i64,
    /// 1-based index of the first result; clamped to at least 1.
    #[serde(rename = "start", default = "default_start", deserialize_with = "lenient_int")]
    pub start_index: i64,
    /// Site or domain to scope results to.
    #[serde(default)]
    pub site_search: Option<String>,
    /// `include` or `exclude` for `site_search`.
    #[serde(default)]
    pub site_search_filter: Option<String>,
    /// `off` or `active`.
    #[serde(default)]
    pub safe: Option<String>,
    /// Geolocation country code, e.g. `us`.
    #[serde(default)]
    pub gl: Option<String>,
    /// Interface language, e.g. `en`.
    #[serde(default)]
    pub hl: Option<String>,
    /// Language restriction, e.g. `lang_en`.
    #[serde(default)]
    pub lr: Option<String>,
    /// Use the site-restricted endpoint.
    #[serde(default)]
    pub use_site_restrict: bool,
    /// Recency restriction, e.g. `d7`.
    #[serde(default)]
    pub date_restrict: Option<String>,
    /// Phrase every result must contain.
    #[serde(default)]
    pub exact_terms: Option<String>,
    /// Additional alternative terms.
    #[serde(default)]
    pub or_terms: Option<String>,
    /// Terms no result may contain.
    #[serde(default)]
    pub exclude_terms: Option<String>,
    /// Overrides the configured search collection id.
    #[serde(rename = "cx", default)]
    pub cx_override: Option<String>,
    /// Ask upstream for a reduced field projection.
    #[serde(default)]
    pub lean: bool,
}

fn default_num() -> i64 {
    DEFAULT_NUM
}

fn default_start() -> i64 {
    1
}

/// Accepts any JSON number and saturates it to `i64`; floats are truncated.
/// Range checks happen later through clamping, so only non-numbers fail here.
fn lenient_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = number.as_i64() {
        return Ok(n);
    }
    if number.as_u64().is_some() {
        return Ok(i64::MAX);
    }
    match number.as_f64() {
        // `as` saturates at the i64 bounds.
        Some(f) if f.is_finite() => Ok(f.trunc() as i64),
        _ => Err(serde::de::Error::custom("expected a finite number")),
    }
}

impl SearchRequest {
    /// Creates a new request with the given terms.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            result_count: DEFAULT_NUM,
            start_index: 1,
            site_search: None,
            site_search_filter: None,
            safe: None,
            gl: None,
            hl: None,
            lr: None,
            use_site_restrict: false,
            date_restrict: None,
            exact_terms: None,
            or_terms: None,
            exclude_terms: None,
            cx_override: None,
            lean: false,
        }
    }

    /// Sets the requested result count.
    pub fn with_num(mut self, num: i64) -> Self {
        self.result_count = num;
        self
    }

    /// Sets the 1-based start index.
    pub fn with_start(mut self, start: i64) -> Self {
        self.start_index = start;
        self
    }

    /// Scopes results to a site.
    pub fn with_site_search(mut self, site: impl Into<String>) -> Self {
        self.site_search = Some(site.into());
        self
    }

    /// Sets whether the site is included or excluded.
    pub fn with_site_search_filter(mut self, filter: SiteSearchFilter) -> Self {
        self.site_search_filter = Some(
            match filter {
                SiteSearchFilter::Include => "include",
                SiteSearchFilter::Exclude => "exclude",
            }
            .to_string(),
        );
        self
    }

    /// Sets the safe search level.
    pub fn with_safe_search(mut self, level: SafeSearch) -> Self {
        self.safe = Some(level.as_str().to_string());
        self
    }

    /// Sets a raw safe search value, validated when the search runs.
    pub fn with_safe(mut self, raw: impl Into<String>) -> Self {
        self.safe = Some(raw.into());
        self
    }

    /// Sets the geolocation country.
    pub fn with_country(mut self, gl: impl Into<String>) -> Self {
        self.gl = Some(gl.into());
        self
    }

    /// Sets the interface language.
    pub fn with_ui_language(mut self, hl: impl Into<String>) -> Self {
        self.hl = Some(hl.into());
        self
    }

    /// Sets the language restriction.
    pub fn with_language_restrict(mut self, lr: impl Into<String>) -> Self {
        self.lr = Some(lr.into());
        self
    }

    /// Selects the site-restricted endpoint.
    pub fn with_site_restrict(mut self, enabled: bool) -> Self {
        self.use_site_restrict = enabled;
        self
    }

    /// Sets the recency restriction.
    pub fn with_date_restrict(mut self, value: impl Into<String>) -> Self {
        self.date_restrict = Some(value.into());
        self
    }

    /// Sets the exact phrase.
    pub fn with_exact_terms(mut self, value: impl Into<String>) -> Self {
        self.exact_terms = Some(value.into());
        self
    }

    /// Sets alternative terms.
    pub fn with_or_terms(mut self, value: impl Into<String>) -> Self {
        self.or_terms = Some(value.into());
        self
    }

    /// Sets excluded terms.
    pub fn with_exclude_terms(mut self, value: impl Into<String>) -> Self {
        self.exclude_terms = Some(value.into());
        self
    }

    /// Overrides the search collection id for this call.
    pub fn with_cx(mut self, cx: impl Into<String>) -> Self {
        self.cx_override = Some(cx.into());
        self
    }

    /// Requests a reduced upstream payload.
    pub fn with_lean(mut self, lean: bool) -> Self {
        self.lean = lean;
        self
    }

    /// Result count after clamping to `[1, 10]`.
    pub fn clamped_num(&self) -> i64 {
        self.result_count.clamp(MIN_NUM, MAX_NUM)
    }

    /// Start index after clamping to at least 1.
    pub fn clamped_start(&self) -> i64 {
        self.start_index.max(1)
    }

    /// Parsed safe search level, if one was given.
    pub fn safe_search(&self) -> Result<Option<SafeSearch>, GatewayError> {
        non_empty(&self.safe)
            .map(|raw| raw.parse::<SafeSearch>())
            .transpose()
    }

    /// Parsed site search filter, if one was given.
    pub fn site_filter(&self) -> Result<Option<SiteSearchFilter>, GatewayError> {
        non_empty(&self.site_search_filter)
            .map(|raw| raw.parse::<SiteSearchFilter>())
            .transpose()
    }
}

/// Returns the trimmed value when it is present and non-empty.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
