//! Result domain allowlist.

use url::Url;

use crate::config::split_list;

/// Set of permitted result domains.
///
/// A URL passes when its host equals an entry or is a subdomain of it.
/// Matching happens on label boundaries, so `example.com` permits
/// `sub.example.com` but not `notexample.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAllowlist {
    entries: Vec<String>,
}

impl DomainAllowlist {
    /// Creates an allowlist from domain entries.
    ///
    /// Entries are lowercased and leading `*.` or `.` is stripped.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|e| normalize_entry(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { entries }
    }

    /// Parses a comma-separated list. Returns `None` when it has no entries.
    pub fn parse(raw: &str) -> Option<Self> {
        let list = Self::new(split_list(raw));
        if list.entries.is_empty() {
            None
        } else {
            Some(list)
        }
    }

    /// Returns the normalized entries.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Returns whether the URL's host is permitted.
    ///
    /// URLs that do not parse or have no host are rejected.
    pub fn permits(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.entries.iter().any(|entry| host_matches(&host, entry))
    }
}

fn normalize_entry(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("*.")
        .trim_start_matches('.')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

fn host_matches(host: &str, entry: &str) -> bool {
    match host.strip_suffix(entry) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlist_exact_host() {
        let list = DomainAllowlist::new(["example.com"]);
        assert!(list.permits("https://example.com/a"));
    }

    #[test]
    fn test_allowlist_subdomain() {
        let list = DomainAllowlist::new(["example.com"]);
        assert!(list.permits("https://sub.example.com/c"));
        assert!(list.permits("http://a.b.example.com"));
    }

    #[test]
    fn test_allowlist_rejects_other_domain() {
        let list = DomainAllowlist::new(["example.com"]);
        assert!(!list.permits("https://evil.com/b"));
    }

    #[test]
    fn test_allowlist_requires_label_boundary() {
        let list = DomainAllowlist::new(["example.com"]);
        assert!(!list.permits("https://notexample.com/"));
    }

    #[test]
    fn test_allowlist_case_insensitive() {
        let list = DomainAllowlist::new(["Example.COM"]);
        assert!(list.permits("https://WWW.example.com/Path"));
    }

    #[test]
    fn test_allowlist_rejects_unparseable() {
        let list = DomainAllowlist::new(["example.com"]);
        assert!(!list.permits("not a url"));
        assert!(!list.permits("mailto:someone@example.com"));
    }

    #[test]
    fn test_allowlist_wildcard_entry() {
        let list = DomainAllowlist::new(["*.docs.rs", ".rust-lang.org"]);
        assert_eq!(list.entries(), ["docs.rs", "rust-lang.org"]);
        assert!(list.permits("https://docs.rs/serde"));
    }

    #[test]
    fn test_allowlist_parse() {
        let list = DomainAllowlist::parse("example.com, ,docs.rs").unwrap();
        assert_eq!(list.entries().len(), 2);
        assert!(DomainAllowlist::parse(" , ").is_none());
    }

    #[test]
    fn test_allowlist_port_ignored() {
        let list = DomainAllowlist::new(["example.com"]);
        assert!(list.permits("https://example.com:8443/x"));
    }
}
