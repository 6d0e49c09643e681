//! seoscout library
//!
//! Rate-limited, cached client layer for quota-limited research APIs, plus
//! the CLI plumbing that drives it. Exposed as a library so integration
//! tests (and other tools) can use the cache, limiter, client, and env
//! validation directly.

pub mod cache;
pub mod cli;
pub mod client;
pub mod commands;
pub mod env;
pub mod limiter;
