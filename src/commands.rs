//! Subcommand execution
//!
//! Wires the CLI to the environment validator, the response cache, and the
//! rate-limited API client. Research commands are wrapped in the cache so a
//! repeated query within the TTL costs nothing; cache maintenance commands
//! run without touching the network or the API key.

use std::time::Duration;

use tracing::warn;

use crate::cache::Cache;
use crate::cli::{CacheAction, Cli, Command};
use crate::client::{QueryResult, SonarClient, DEFAULT_MODEL};
use crate::env::{EnvConfig, EnvValidator};

/// Fallback cache lifetime when the configured TTL is unusable
const DEFAULT_CACHE_TTL_HOURS: u64 = 24;

/// Environment contract shared by all research commands
pub fn research_validator() -> EnvValidator {
    EnvValidator::new()
        .require_with(
            "PERPLEXITY_API_KEY",
            "Perplexity API key from https://www.perplexity.ai/settings/api",
            "pplx-...",
            |v| v.starts_with("pplx-"),
        )
        .optional("SONAR_MODEL", "Default completion model", DEFAULT_MODEL)
        .optional(
            "SONAR_REQUESTS_PER_MINUTE",
            "Sonar API request budget per minute",
            "50",
        )
        .optional(
            "SEOSCOUT_CACHE_TTL_HOURS",
            "Response cache time-to-live in hours",
            "24",
        )
}

/// Resolves the cache TTL from configuration
///
/// An unparseable value is logged and replaced by the default rather than
/// aborting; the cache is an optimization, not a prerequisite.
pub fn cache_ttl(config: &EnvConfig) -> Duration {
    let raw = config.get("SEOSCOUT_CACHE_TTL_HOURS").unwrap_or("24");
    match raw.parse::<u64>() {
        Ok(hours) => Duration::from_secs(hours * 3600),
        Err(_) => {
            warn!(value = raw, "invalid SEOSCOUT_CACHE_TTL_HOURS, using default");
            Duration::from_secs(DEFAULT_CACHE_TTL_HOURS * 3600)
        }
    }
}

/// Builds the response cache from CLI flags, or `None` when caching is off
///
/// A missing user cache directory disables caching with a warning instead of
/// failing the command.
pub fn build_cache(cli: &Cli, ttl: Duration) -> Option<Cache> {
    if cli.no_cache {
        return None;
    }
    match &cli.cache_dir {
        Some(dir) => Some(Cache::with_dir(dir.clone(), ttl)),
        None => {
            let cache = Cache::new(ttl);
            if cache.is_none() {
                warn!("no user cache directory available, caching disabled");
            }
            cache
        }
    }
}

/// Stable cache key for a research command and its arguments
fn cache_key(command: &Command) -> String {
    match command {
        Command::EnrichStat {
            claim,
            topic,
            category,
        } => format!("enrich-stat:{claim}:{topic}:{category}"),
        Command::Sydney { topic, category } => format!("sydney:{topic}:{category}"),
        Command::Verify { claim, topic } => format!("verify:{claim}:{topic}"),
        Command::Trends { category, location } => format!("trends:{category}:{location}"),
        Command::Competitor { name, focus } => format!("competitor:{name}:{focus}"),
        Command::Cache { .. } => String::new(),
    }
}

/// Dispatches a research command to its task method on the client
async fn execute(command: &Command, client: &SonarClient) -> QueryResult {
    match command {
        Command::EnrichStat {
            claim,
            topic,
            category,
        } => client.enrich_statistic(claim, topic, category).await,
        Command::Sydney { topic, category } => client.sydney_data(topic, category).await,
        Command::Verify { claim, topic } => client.verify_fact(claim, topic).await,
        Command::Trends { category, location } => {
            client.trending_topics(category, location).await
        }
        Command::Competitor { name, focus } => client.competitive_intel(name, focus).await,
        Command::Cache { .. } => QueryResult::failed("cache maintenance is not a research query"),
    }
}

/// Runs a research command through the cache
///
/// A failure envelope is evicted from the cache immediately so a transient
/// remote error doesn't stick for a full TTL.
pub async fn run_research(
    command: &Command,
    client: &SonarClient,
    cache: Option<&Cache>,
) -> QueryResult {
    match cache {
        Some(cache) => {
            let key = cache_key(command);
            let result = cache.wrap(&key, || execute(command, client)).await;
            if !result.success {
                cache.delete(&key);
            }
            result
        }
        None => execute(command, client).await,
    }
}

/// Runs a cache maintenance action, printing its outcome
fn run_cache_action(action: &CacheAction, cache: &Cache) -> u8 {
    match action {
        CacheAction::Stats => {
            let stats = cache.stats();
            println!("Entries:  {}", stats.total_entries);
            println!("Valid:    {}", stats.valid_entries);
            println!("Expired:  {}", stats.expired_entries);
            println!("Size:     {:.2} MB ({} bytes)", stats.total_size_mb, stats.total_size);
            0
        }
        CacheAction::Clean => {
            let cleaned = cache.clean_expired();
            println!("Removed {cleaned} expired entries");
            0
        }
        CacheAction::Clear => match cache.clear() {
            Ok(removed) => {
                println!("Removed {removed} entries");
                0
            }
            Err(e) => {
                eprintln!("Failed to clear cache: {e}");
                1
            }
        },
    }
}

/// Prints a result envelope for the operator
fn print_result(result: &QueryResult) -> u8 {
    if !result.success {
        let reason = result.error.as_deref().unwrap_or("unknown error");
        eprintln!("Query failed: {reason}");
        return 1;
    }

    if let Some(content) = &result.content {
        println!("{content}");
    }
    if !result.citations.is_empty() {
        println!("\nSources:");
        for (i, citation) in result.citations.iter().enumerate() {
            println!("  {}. {}", i + 1, citation);
        }
    }
    if let Some(usage) = &result.usage {
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "token usage"
        );
    }
    0
}

/// Top-level command dispatch; returns the process exit code
pub async fn run(cli: Cli) -> u8 {
    if let Command::Cache { action } = &cli.command {
        let ttl = Duration::from_secs(DEFAULT_CACHE_TTL_HOURS * 3600);
        return match build_cache(&cli, ttl) {
            Some(cache) => run_cache_action(action, &cache),
            None => {
                eprintln!("No cache directory available");
                1
            }
        };
    }

    let config = match research_validator().validate() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.remediation());
            return 1;
        }
    };

    let client = match SonarClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let cache = build_cache(&cli, cache_ttl(&config));
    let result = run_research(&cli.command, &client, cache.as_ref()).await;
    print_result(&result)
}
