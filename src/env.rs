//! Startup-time environment validation
//!
//! Declares which environment variables a command needs, checks them all
//! before any network call is attempted, and resolves them into an immutable
//! [`EnvConfig`]. Missing or malformed required variables are collected into
//! a single [`EnvError`] whose remediation text tells the operator exactly
//! what to put in their `.env` file; unset optional variables receive their
//! documented defaults in the resolved config (the process environment is
//! never mutated).

use std::collections::HashMap;
use std::fmt::Write as _;

use thiserror::Error;
use tracing::{debug, warn};

/// Predicate over a raw environment value
type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// A variable that must be present (and optionally well-formed)
struct RequiredVar {
    key: String,
    description: String,
    example: String,
    predicate: Option<Predicate>,
}

/// A variable that falls back to a documented default when unset
struct OptionalVar {
    key: String,
    description: String,
    default: String,
}

/// Why a required variable failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The variable is not set
    Missing,
    /// The variable is set but its value was rejected by the predicate
    Invalid,
}

/// A single required-variable validation failure
#[derive(Debug, Clone)]
pub struct Failure {
    pub key: String,
    pub reason: FailureReason,
    pub description: String,
    pub example: String,
}

/// Errors produced by [`EnvValidator::validate`]
///
/// All required-variable failures are collected into one error so the
/// operator sees every problem in a single run. `remediation()` renders the
/// full diagnostic with copy-paste-ready `KEY=example` lines.
#[derive(Debug, Error)]
#[error("{} required environment variable(s) missing or invalid", .failures.len())]
pub struct EnvError {
    pub failures: Vec<Failure>,
}

impl EnvError {
    /// Renders a full diagnostic suitable for printing before exiting
    pub fn remediation(&self) -> String {
        let mut out = String::from("Environment validation failed:\n\n");
        for failure in &self.failures {
            match failure.reason {
                FailureReason::Missing => {
                    let _ = writeln!(out, "  missing required: {}", failure.key);
                }
                FailureReason::Invalid => {
                    let _ = writeln!(out, "  invalid value for: {}", failure.key);
                }
            }
            let _ = writeln!(out, "    {}", failure.description);
            let _ = writeln!(out, "    example: {}", failure.example);
            out.push('\n');
        }
        out.push_str("Fix these and try again:\n");
        out.push_str("  1. Create a .env file in the project root\n");
        out.push_str("  2. Add the required variables:\n\n");
        for failure in &self.failures {
            let _ = writeln!(out, "     {}={}", failure.key, failure.example);
        }
        out.push_str("\n  3. Run the command again\n");
        out
    }
}

/// Resolved, immutable configuration produced by a successful validation
///
/// Holds every declared variable's value, with defaults filled in for unset
/// optional variables. Passed by reference to whatever needs configuration;
/// nothing reads the ambient environment after this point.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    values: HashMap<String, String>,
    defaulted: Vec<String>,
}

impl EnvConfig {
    /// Returns the resolved value for a declared variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns true if the variable was unset and received its default
    pub fn was_defaulted(&self, key: &str) -> bool {
        self.defaulted.iter().any(|k| k == key)
    }
}

/// Fluent builder declaring the environment contract for a command
///
/// ```no_run
/// use seoscout::env::EnvValidator;
///
/// let config = EnvValidator::new()
///     .require_with(
///         "PERPLEXITY_API_KEY",
///         "Perplexity API key",
///         "pplx-...",
///         |v| v.starts_with("pplx-"),
///     )
///     .optional("SONAR_MODEL", "Default completion model", "sonar")
///     .validate()?;
/// # Ok::<(), seoscout::env::EnvError>(())
/// ```
#[derive(Default)]
pub struct EnvValidator {
    required: Vec<RequiredVar>,
    optional: Vec<OptionalVar>,
}

impl EnvValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required variable
    pub fn require(
        mut self,
        key: impl Into<String>,
        description: impl Into<String>,
        example: impl Into<String>,
    ) -> Self {
        self.required.push(RequiredVar {
            key: key.into(),
            description: description.into(),
            example: example.into(),
            predicate: None,
        });
        self
    }

    /// Declares a required variable whose value must satisfy `predicate`
    pub fn require_with(
        mut self,
        key: impl Into<String>,
        description: impl Into<String>,
        example: impl Into<String>,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.required.push(RequiredVar {
            key: key.into(),
            description: description.into(),
            example: example.into(),
            predicate: Some(Box::new(predicate)),
        });
        self
    }

    /// Declares an optional variable with a default used when unset
    ///
    /// Set values are accepted as-is; their format is not checked.
    pub fn optional(
        mut self,
        key: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        self.optional.push(OptionalVar {
            key: key.into(),
            description: description.into(),
            default: default.into(),
        });
        self
    }

    /// Returns the declared variable names, required then optional
    pub fn variables(&self) -> (Vec<&str>, Vec<&str>) {
        (
            self.required.iter().map(|v| v.key.as_str()).collect(),
            self.optional.iter().map(|v| v.key.as_str()).collect(),
        )
    }

    /// Validates against the process environment
    pub fn validate(&self) -> Result<EnvConfig, EnvError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        self.validate_from(&vars)
    }

    /// Validates against an explicit variable map
    ///
    /// Every required-variable problem is collected before returning so a
    /// single run reports them all. On success the returned config contains
    /// all declared variables, with defaults substituted for unset optional
    /// ones (logged as warnings).
    pub fn validate_from(&self, vars: &HashMap<String, String>) -> Result<EnvConfig, EnvError> {
        let mut failures = Vec::new();
        let mut values = HashMap::new();
        let mut defaulted = Vec::new();

        for var in &self.required {
            match vars.get(&var.key) {
                None => failures.push(Failure {
                    key: var.key.clone(),
                    reason: FailureReason::Missing,
                    description: var.description.clone(),
                    example: var.example.clone(),
                }),
                Some(value) => {
                    if var.predicate.as_ref().is_some_and(|p| !p(value)) {
                        failures.push(Failure {
                            key: var.key.clone(),
                            reason: FailureReason::Invalid,
                            description: var.description.clone(),
                            example: var.example.clone(),
                        });
                    } else {
                        debug!(key = %var.key, value = %mask_value(&var.key, value), "required variable set");
                        values.insert(var.key.clone(), value.clone());
                    }
                }
            }
        }

        for var in &self.optional {
            match vars.get(&var.key) {
                None => {
                    warn!(
                        key = %var.key,
                        default = %var.default,
                        "{} not set, using default",
                        var.description
                    );
                    values.insert(var.key.clone(), var.default.clone());
                    defaulted.push(var.key.clone());
                }
                Some(value) => {
                    debug!(key = %var.key, value = %mask_value(&var.key, value), "optional variable set");
                    values.insert(var.key.clone(), value.clone());
                }
            }
        }

        if failures.is_empty() {
            Ok(EnvConfig { values, defaulted })
        } else {
            Err(EnvError { failures })
        }
    }
}

/// Truncates secrets so they are safe to log
fn mask_value(key: &str, value: &str) -> String {
    const SENSITIVE: [&str; 5] = ["KEY", "SECRET", "PASS", "TOKEN", "WEBHOOK"];

    if SENSITIVE.iter().any(|marker| key.contains(marker)) {
        let prefix: String = value.chars().take(8).collect();
        format!("{prefix}...")
    } else {
        value.to_string()
    }
}
