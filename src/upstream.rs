//! Google Custom Search request assembly and response parsing.

use serde_json::{Map, Value};

use crate::request::non_empty;
use crate::{Result, SearchRequest};

/// Broad search endpoint.
pub const CSE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Site-restricted search endpoint.
pub const CSE_SITERESTRICT_ENDPOINT: &str =
    "https://www.googleapis.com/customsearch/v1/siterestrict";

/// Field projection requested for lean calls.
///
/// Always keeps `title`, `link` and `snippet` so allowlist filtering and
/// normalization see the same data as a full response.
pub const LEAN_FIELDS: &str =
    "kind,items(title,link,snippet),searchInformation,queries(nextPage(startIndex))";

/// Upstream endpoint variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `customsearch/v1`.
    Broad,
    /// `customsearch/v1/siterestrict`.
    SiteRestricted,
}

impl Endpoint {
    /// Endpoint URL.
    pub fn url(&self) -> &'static str {
        match self {
            Self::Broad => CSE_ENDPOINT,
            Self::SiteRestricted => CSE_SITERESTRICT_ENDPOINT,
        }
    }
}

/// A validated upstream call, without credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamQuery {
    endpoint: Endpoint,
    query: String,
    params: Vec<(&'static str, String)>,
}

impl UpstreamQuery {
    /// Validates `request` and assembles the upstream parameters.
    ///
    /// Fails with an input error before anything is sent when an enumerated
    /// field holds an unrecognized value. Numeric fields are clamped.
    pub fn build(request: &SearchRequest, default_cx: &str) -> Result<Self> {
        let safe = request.safe_search()?;
        let site_filter = request.site_filter()?;

        let query = request.query.trim().to_string();
        let cx = non_empty(&request.cx_override).unwrap_or(default_cx);

        let mut params: Vec<(&'static str, String)> = vec![
            ("cx", cx.to_string()),
            ("q", query.clone()),
            ("num", request.clamped_num().to_string()),
            ("start", request.clamped_start().to_string()),
        ];

        let optional = [
            ("siteSearch", &request.site_search),
            ("gl", &request.gl),
            ("hl", &request.hl),
            ("lr", &request.lr),
            ("dateRestrict", &request.date_restrict),
            ("exactTerms", &request.exact_terms),
            ("orTerms", &request.or_terms),
            ("excludeTerms", &request.exclude_terms),
        ];
        for (name, value) in optional {
            if let Some(value) = non_empty(value) {
                params.push((name, value.to_string()));
            }
        }

        if let Some(filter) = site_filter {
            params.push(("siteSearchFilter", filter.as_param().to_string()));
        }
        if let Some(safe) = safe {
            params.push(("safe", safe.as_str().to_string()));
        }
        if request.lean {
            params.push(("fields", LEAN_FIELDS.to_string()));
        }

        let endpoint = if request.use_site_restrict {
            Endpoint::SiteRestricted
        } else {
            Endpoint::Broad
        };

        Ok(Self {
            endpoint,
            query,
            params,
        })
    }

    /// Selected endpoint.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Trimmed query text.
    pub fn query_text(&self) -> &str {
        &self.query
    }

    /// Parameters sent upstream, excluding the API key.
    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Parameters including the credential, in the order they are sent.
    pub fn wire_params(&self, api_key: &str) -> Vec<(&'static str, String)> {
        let mut wire = Vec::with_capacity(self.params.len() + 1);
        wire.push(("key", api_key.to_string()));
        wire.extend(self.params.iter().cloned());
        wire
    }

    /// Parameters echoed back to the caller. Never includes the API key.
    ///
    /// `num` and `start` are echoed as integers.
    pub fn echo(&self) -> Map<String, Value> {
        self.params
            .iter()
            .filter(|(key, _)| *key != "fields")
            .map(|(key, value)| {
                let value = match *key {
                    "num" | "start" => value
                        .parse::<i64>()
                        .map(Value::from)
                        .unwrap_or_else(|_| Value::from(value.as_str())),
                    _ => Value::from(value.as_str()),
                };
                (key.to_string(), value)
            })
            .collect()
    }
}

/// Upstream response, defaulted field by field.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamPage {
    /// Raw result items.
    pub items: Vec<Value>,
    /// `searchInformation` passthrough, `{}` when absent.
    pub search_info: Value,
    /// `queries.nextPage[0].startIndex`.
    pub next_page: Option<u64>,
    /// Upstream `kind` marker.
    pub kind: Option<String>,
}

impl UpstreamPage {
    /// Extracts the fields used by normalization from a loosely-typed body.
    pub fn from_value(data: &Value) -> Self {
        let items = data
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let search_info = data
            .get("searchInformation")
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let next_page = data
            .pointer("/queries/nextPage/0/startIndex")
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()));

        let kind = data
            .get("kind")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            items,
            search_info,
            next_page,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{SafeSearch, SiteSearchFilter};
    use serde_json::json;

    #[test]
    fn test_build_defaults() {
        let query = UpstreamQuery::build(&SearchRequest::new("  Python programming "), "cx-1")
            .unwrap();
        assert_eq!(query.endpoint(), Endpoint::Broad);
        assert_eq!(query.query_text(), "Python programming");
        assert_eq!(query.param("cx"), Some("cx-1"));
        assert_eq!(query.param("q"), Some("Python programming"));
        assert_eq!(query.param("num"), Some("5"));
        assert_eq!(query.param("start"), Some("1"));
        assert_eq!(query.params().len(), 4);
    }

    #[test]
    fn test_build_omits_absent_and_empty_fields() {
        let request = SearchRequest::new("q").with_country("").with_ui_language("en");
        let query = UpstreamQuery::build(&request, "cx").unwrap();
        assert_eq!(query.param("gl"), None);
        assert_eq!(query.param("hl"), Some("en"));
        assert_eq!(query.param("siteSearch"), None);
        assert_eq!(query.param("safe"), None);
        assert_eq!(query.param("fields"), None);
    }

    #[test]
    fn test_build_all_optional_fields() {
        let request = SearchRequest::new("test query")
            .with_num(3)
            .with_start(10)
            .with_site_search("example.com")
            .with_site_search_filter(SiteSearchFilter::Include)
            .with_safe_search(SafeSearch::Active)
            .with_country("us")
            .with_ui_language("en")
            .with_language_restrict("lang_en")
            .with_date_restrict("d7")
            .with_exact_terms("exact")
            .with_or_terms("either")
            .with_exclude_terms("never");
        let query = UpstreamQuery::build(&request, "cx").unwrap();
        assert_eq!(query.param("num"), Some("3"));
        assert_eq!(query.param("start"), Some("10"));
        assert_eq!(query.param("siteSearch"), Some("example.com"));
        assert_eq!(query.param("siteSearchFilter"), Some("i"));
        assert_eq!(query.param("safe"), Some("active"));
        assert_eq!(query.param("gl"), Some("us"));
        assert_eq!(query.param("hl"), Some("en"));
        assert_eq!(query.param("lr"), Some("lang_en"));
        assert_eq!(query.param("dateRestrict"), Some("d7"));
        assert_eq!(query.param("exactTerms"), Some("exact"));
        assert_eq!(query.param("orTerms"), Some("either"));
        assert_eq!(query.param("excludeTerms"), Some("never"));
    }

    #[test]
    fn test_build_site_restricted_endpoint() {
        let request = SearchRequest::new("q").with_site_restrict(true);
        let query = UpstreamQuery::build(&request, "cx").unwrap();
        assert_eq!(query.endpoint(), Endpoint::SiteRestricted);
        assert!(query.endpoint().url().ends_with("/siterestrict"));
    }

    #[test]
    fn test_build_cx_override() {
        let request = SearchRequest::new("q").with_cx("custom-cx");
        let query = UpstreamQuery::build(&request, "default-cx").unwrap();
        assert_eq!(query.param("cx"), Some("custom-cx"));
    }

    #[test]
    fn test_build_lean_fields_keep_link() {
        let request = SearchRequest::new("q").with_lean(true);
        let query = UpstreamQuery::build(&request, "cx").unwrap();
        let fields = query.param("fields").unwrap();
        assert!(fields.contains("items(title,link,snippet)"));
        assert!(!query.echo().contains_key("fields"));
    }

    #[test]
    fn test_build_rejects_unknown_safe() {
        let request = SearchRequest::new("q").with_safe("strict");
        let err = UpstreamQuery::build(&request, "cx").unwrap_err();
        assert_eq!(err.kind(), "input_validation");
    }

    #[test]
    fn test_build_rejects_unknown_site_filter() {
        let mut request = SearchRequest::new("q");
        request.site_search_filter = Some("both".to_string());
        assert!(UpstreamQuery::build(&request, "cx").is_err());
    }

    #[test]
    fn test_wire_params_put_key_first() {
        let query = UpstreamQuery::build(&SearchRequest::new("q"), "cx").unwrap();
        let wire = query.wire_params("secret");
        assert_eq!(wire[0], ("key", "secret".to_string()));
        assert_eq!(wire.len(), query.params().len() + 1);
    }

    #[test]
    fn test_echo_excludes_key_and_types_numbers() {
        let query = UpstreamQuery::build(&SearchRequest::new("q").with_num(99), "cx").unwrap();
        let echo = query.echo();
        assert!(!echo.contains_key("key"));
        assert_eq!(echo["q"], json!("q"));
        assert_eq!(echo["cx"], json!("cx"));
        assert_eq!(echo["num"], json!(10));
        assert_eq!(echo["start"], json!(1));
    }

    #[test]
    fn test_page_from_full_response() {
        let data = json!({
            "kind": "customsearch#search",
            "searchInformation": {"searchTime": 0.12, "totalResults": "1000"},
            "queries": {"nextPage": [{"startIndex": 4}]},
            "items": [{"title": "A", "link": "https://a.com", "snippet": "a"}]
        });
        let page = UpstreamPage::from_value(&data);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.search_info["totalResults"], json!("1000"));
        assert_eq!(page.next_page, Some(4));
        assert_eq!(page.kind.as_deref(), Some("customsearch#search"));
    }

    #[test]
    fn test_page_from_empty_response() {
        let data = json!({
            "kind": "customsearch#search",
            "searchInformation": {"totalResults": "0"},
            "queries": {}
        });
        let page = UpstreamPage::from_value(&data);
        assert!(page.items.is_empty());
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn test_page_tolerates_malformed_fields() {
        let data = json!({
            "items": "not-a-list",
            "searchInformation": ["odd"],
            "queries": {"nextPage": []},
            "kind": 7
        });
        let page = UpstreamPage::from_value(&data);
        assert!(page.items.is_empty());
        assert_eq!(page.search_info, json!({}));
        assert_eq!(page.next_page, None);
        assert_eq!(page.kind, None);
    }

    #[test]
    fn test_page_next_page_as_string() {
        let data = json!({"queries": {"nextPage": [{"startIndex": "11"}]}});
        assert_eq!(UpstreamPage::from_value(&data).next_page, Some(11));
    }
}
