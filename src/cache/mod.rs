//! Quill response cache
//!
//! Read-through cache for the global index page. Rendered responses are kept
//! for a fixed TTL and then recomputed; nothing invalidates an entry early
//! except an explicit [`ResponseStore::clear`].
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_seconds = 20
//! max_entries = 200
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::CacheKey;
pub use middleware::{CacheState, response_cache_layer};
pub use store::{CachedResponse, ResponseStore};

pub const METRIC_HIT_TOTAL: &str = "quill_cache_hit_total";
pub const METRIC_MISS_TOTAL: &str = "quill_cache_miss_total";
pub const METRIC_EXPIRED_TOTAL: &str = "quill_cache_expired_total";
pub const METRIC_EVICT_TOTAL: &str = "quill_cache_evict_total";
pub const METRIC_ENTRIES: &str = "quill_cache_entries";
pub const METRIC_LOCK_RECOVERED_TOTAL: &str = "quill_cache_lock_recovered_total";
