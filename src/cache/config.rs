//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_INDEX_TTL_SECS: u64 = 20;
const DEFAULT_MAX_ENTRIES: usize = 200;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false the middleware passes every request straight through.
    pub enabled: bool,
    /// How long a stored index page is served before it is recomputed.
    pub index_ttl: Duration,
    /// LRU capacity of the response store.
    pub max_entries: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_ttl: Duration::from_secs(DEFAULT_INDEX_TTL_SECS),
            max_entries: NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            index_ttl: settings.index_ttl,
            max_entries: settings.max_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.index_ttl, Duration::from_secs(20));
        assert_eq!(config.max_entries.get(), 200);
    }
}
