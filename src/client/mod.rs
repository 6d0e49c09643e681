//! Rate-limited client for the Sonar search-completion API
//!
//! This module wraps the remote completion endpoint behind a sliding-window
//! rate limiter and exposes task-specific research methods with tuned
//! generation parameters. Remote failures never escape as errors; every call
//! returns a [`QueryResult`] envelope so batch callers can continue past
//! individual failures without try/catch at each site.

mod sonar;

pub use sonar::{
    ConfigError, QueryOptions, QueryResult, RecencyFilter, SonarClient, Usage, DEFAULT_MODEL,
};
