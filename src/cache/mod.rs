//! Cache module for storing API responses to disk
//!
//! This module provides a file-backed cache with a fixed time-to-live that
//! persists remote API responses between runs, so repeated research queries
//! don't burn paid API quota. Expired entries are evicted lazily on read;
//! there is no background sweep.

mod store;

pub use store::{Cache, CacheError, CacheStats};
