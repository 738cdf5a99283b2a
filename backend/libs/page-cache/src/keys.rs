//! Page cache key schema
//!
//! Key format: v{VERSION}:page:{view}:{query}
//! The query part is the raw request query string, so `?page=2` and
//! `?page=2&x=1` are cached separately, same as any other query variation.

/// Cache schema version - increment when changing key formats
pub const CACHE_VERSION: u32 = 1;

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Rendered page for a view and its query string
    /// Format: v1:page:{view}:{query}
    pub fn page(view: &str, query: &str) -> String {
        format!("v{}:page:{}:{}", CACHE_VERSION, view, query)
    }

    /// Pattern matching every page of every view
    pub fn all_pages_pattern() -> String {
        format!("v{}:page:*", CACHE_VERSION)
    }

    /// Prefix shared by every page key, used by prefix-scanning backends
    pub fn page_prefix() -> String {
        format!("v{}:page:", CACHE_VERSION)
    }

    /// View name embedded in a page key, for metrics labelling
    pub fn view_of(key: &str) -> &str {
        // Format: v{N}:page:{view}:...
        key.splitn(4, ':').nth(2).unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_key() {
        assert_eq!(CacheKey::page("index_page", "page=2"), "v1:page:index_page:page=2");
    }

    #[test]
    fn test_page_key_without_query() {
        assert_eq!(CacheKey::page("index_page", ""), "v1:page:index_page:");
    }

    #[test]
    fn test_pattern_covers_page_keys() {
        let pattern = CacheKey::all_pages_pattern();
        let prefix = pattern.trim_end_matches('*');
        assert!(CacheKey::page("index_page", "page=1").starts_with(prefix));
        assert_eq!(prefix, CacheKey::page_prefix());
    }

    #[test]
    fn test_view_of() {
        assert_eq!(CacheKey::view_of("v1:page:index_page:page=3"), "index_page");
        assert_eq!(CacheKey::view_of("garbage"), "unknown");
    }
}
