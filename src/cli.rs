//! Command-line interface parsing for seoscout
//!
//! This module defines the clap parser for the research subcommands and the
//! cache maintenance commands. Each research subcommand maps to one task
//! method on the API client; generation parameters are tuned per task rather
//! than exposed as flags.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// seoscout - SEO and content research from the command line
#[derive(Parser, Debug)]
#[command(name = "seoscout")]
#[command(about = "Research statistics, trends, and competitors with cached, rate-limited API queries")]
#[command(version)]
pub struct Cli {
    /// Bypass the response cache for this invocation
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Directory for cached API responses (default: the user cache dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find a verified statistic with sources backing a claim
    EnrichStat {
        /// The statistic or claim to verify and source
        claim: String,

        /// Topic the claim belongs to
        #[arg(long, default_value = "Digital marketing")]
        topic: String,

        /// Content category
        #[arg(long, default_value = "Marketing")]
        category: String,
    },

    /// Research Sydney-specific market data for a topic
    Sydney {
        /// Topic to research
        topic: String,

        /// Content category (SEO, Google Ads, ...)
        #[arg(long)]
        category: String,
    },

    /// Verify a claim against authoritative sources
    Verify {
        /// Claim to verify
        claim: String,

        /// Context for the verification
        #[arg(long, default_value = "General")]
        topic: String,
    },

    /// List trending topics in a category
    Trends {
        /// Category to search (SEO, Google Ads, ...)
        category: String,

        /// Location focus
        #[arg(long, default_value = "Sydney, Australia")]
        location: String,
    },

    /// Analyze a competitor's recent strategy
    Competitor {
        /// Competitor name or domain
        name: String,

        /// What to analyze
        #[arg(long, default_value = "content strategy")]
        focus: String,
    },

    /// Inspect or maintain the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show entry counts and disk usage
    Stats,
    /// Delete entries past their stored TTL
    Clean,
    /// Delete every cached entry
    Clear,
}
