//! Cache key definitions.

use crate::application::pagination::PageNumber;

/// Identity of a cached response.
///
/// Two requests share an entry only when they ask for the same path and
/// page as the same viewer; a page rendered for a signed-in user is never
/// served to anyone else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub view: String,
    pub page: u64,
    pub viewer: Option<String>,
}

impl CacheKey {
    /// Build a key from a request path, its raw query string and the viewer.
    /// `?page=abc`, `?page=0` and no query at all all normalize to page 1.
    pub fn from_request(path: &str, query: Option<&str>, viewer: Option<&str>) -> Self {
        let raw_page = query.and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(name, _)| name == "page")
                .map(|(_, value)| value.into_owned())
        });

        Self {
            view: path.to_string(),
            page: PageNumber::parse(raw_page.as_deref()).get(),
            viewer: viewer.map(str::to_string),
        }
    }
}
