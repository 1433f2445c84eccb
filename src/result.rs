//! Search result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::allowlist::DomainAllowlist;

/// Provider identifier reported in every result.
pub const PROVIDER: &str = "google-cse";

/// A single normalized result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedItem {
    /// Result title.
    pub title: Option<String>,
    /// Result URL (upstream `link`).
    pub url: Option<String>,
    /// Result description/snippet.
    pub snippet: Option<String>,
    /// 1-based position in the returned sequence.
    pub rank: u32,
}

/// Upstream metadata kept for callers that inspect the raw response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMeta {
    /// Upstream `kind` marker.
    pub kind: Option<String>,
}

/// Result of one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Constant provider identifier.
    pub provider: String,
    /// Parameters sent upstream, minus the credential.
    #[serde(rename = "query")]
    pub echoed_query: Map<String, Value>,
    /// Upstream `searchInformation`.
    pub search_info: Value,
    /// Start index of the next page, if upstream reported one.
    #[serde(rename = "nextPage")]
    pub next_page_start_index: Option<u64>,
    /// Wall-clock duration of the upstream exchange.
    pub latency_ms: u64,
    /// Normalized, filtered and ranked items.
    #[serde(rename = "results")]
    pub items: Vec<NormalizedItem>,
    /// Hash of the query text for log correlation.
    pub trace_id: String,
    /// Upstream metadata.
    pub raw: RawMeta,
}

impl SearchResult {
    /// Returns the items.
    pub fn items(&self) -> &[NormalizedItem] {
        &self.items
    }

    /// Number of items.
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// Normalizes raw upstream items, drops those outside the allowlist and
/// assigns contiguous 1-based ranks in document order.
///
/// Fields that are missing or not strings become `None`. With an allowlist,
/// items without a usable link are dropped.
pub fn normalize(items: &[Value], allowlist: Option<&DomainAllowlist>) -> Vec<NormalizedItem> {
    items
        .iter()
        .map(|item| {
            (
                string_field(item, "title"),
                string_field(item, "link"),
                string_field(item, "snippet"),
            )
        })
        .filter(|(_, link, _)| match (allowlist, link) {
            (None, _) => true,
            (Some(list), Some(link)) => list.permits(link),
            (Some(_), None) => false,
        })
        .zip(1..)
        .map(|((title, url, snippet), rank)| NormalizedItem {
            title,
            url,
            snippet,
            rank,
        })
        .collect()
}

fn string_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::to_string)
}
