//! The `search` tool as seen by protocol clients.

use serde_json::{json, Value};

use crate::{GatewayError, Result, SearchRequest};

/// Tool name.
pub const SEARCH_TOOL: &str = "search";

const DESCRIPTION: &str = "Search Google Custom Search Engine and return normalized results \
with title, url, snippet and a 1-based rank.";

/// Tool descriptor with its JSON Schema, as listed by `tools/list`.
pub fn search_tool() -> Value {
    json!({
        "name": SEARCH_TOOL,
        "description": DESCRIPTION,
        "inputSchema": {
            "type": "object",
            "properties": {
                "q": {"type": "string", "description": "Search query string"},
                "num": {
                    "type": "integer",
                    "description": "Number of results to return (1-10)",
                    "minimum": 1,
                    "maximum": 10,
                    "default": 5
                },
                "start": {
                    "type": "integer",
                    "description": "1-based starting index for pagination",
                    "minimum": 1,
                    "default": 1
                },
                "siteSearch": {"type": "string", "description": "Restrict search to a specific site"},
                "siteSearchFilter": {
                    "type": "string",
                    "enum": ["include", "exclude"],
                    "description": "Include or exclude results from siteSearch"
                },
                "safe": {"type": "string", "enum": ["off", "active"], "description": "Safe search level"},
                "gl": {"type": "string", "description": "Country code for geolocation, e.g. us"},
                "hl": {"type": "string", "description": "Interface language, e.g. en"},
                "lr": {"type": "string", "description": "Language restriction, e.g. lang_en"},
                "useSiteRestrict": {
                    "type": "boolean",
                    "description": "Use the stricter site-restricted endpoint",
                    "default": false
                },
                "dateRestrict": {"type": "string", "description": "Recency restriction, e.g. d7 or m1"},
                "exactTerms": {"type": "string", "description": "Phrase every result must contain"},
                "orTerms": {"type": "string", "description": "Additional alternative terms"},
                "excludeTerms": {"type": "string", "description": "Terms no result may contain"},
                "cx": {"type": "string", "description": "Override the configured search engine id"},
                "lean": {
                    "type": "boolean",
                    "description": "Request a smaller upstream payload",
                    "default": false
                }
            },
            "required": ["q"]
        }
    })
}

/// Parses tool arguments into a request.
///
/// Missing or mistyped arguments are input errors.
pub fn parse_arguments(arguments: Option<Value>) -> Result<SearchRequest> {
    let arguments = arguments.unwrap_or_else(|| json!({}));
    serde_json::from_value(arguments)
        .map_err(|e| GatewayError::InvalidInput(format!("invalid arguments: {}", e)))
}

/// Structured payload describing a failed call.
pub fn error_payload(err: &GatewayError) -> Value {
    json!({
        "error": {
            "kind": err.kind(),
            "detail": err.detail(),
        }
    })
}
