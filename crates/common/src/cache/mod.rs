//! Clock-driven TTL cache
//!
//! Entries carry an absolute expiry in epoch milliseconds. Expired entries are
//! dropped lazily on read and in bulk by [`TtlCache::sweep_expired`]; when the
//! cache is bounded, the oldest insertion is evicted first.

pub mod core;
pub mod stats;

pub use self::core::TtlCache;
pub use self::stats::CacheStats;
