//! CLI command definitions for the `cadence` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by
//! noun (`cadence skill exec`, `cadence memory query`).

pub mod config;
pub mod memory;
pub mod run;
pub mod skill;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use cadence_types::memory::SortBy;
use cadence_types::skill::ExecutionMode;

/// Run skills on demand, in the background, or around the clock.
#[derive(Parser)]
#[command(name = "cadence", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory (defaults to $CADENCE_DATA_DIR or ~/.cadence).
    #[arg(long, global = true, env = "CADENCE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level forced by the verbosity flags, if any.
    pub fn level_override(&self) -> Option<&'static str> {
        match self.verbose {
            0 if self.quiet => Some("error"),
            0 => None,
            1 => Some("info,cadence=debug"),
            _ => Some("trace"),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the runtime: arm configured schedules and run until Ctrl+C.
    Run,

    /// Inspect and execute skills.
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },

    /// Work with the memory store.
    #[command(alias = "mem")]
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Show runtime status: skills, memory, and counters.
    Status,

    /// Inspect or bootstrap the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SkillAction {
    /// List registered skills and their states.
    #[command(alias = "ls")]
    List,

    /// Execute a skill.
    Exec {
        /// Skill name.
        name: String,

        /// Raw input passed to the skill.
        #[arg(long, short, default_value = "")]
        input: String,

        /// Execution mode: immediate, queued, or background.
        #[arg(long, short, default_value = "immediate")]
        mode: ExecutionMode,

        /// Extra parameter as key=value (value parsed as JSON when possible).
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, serde_json::Value)>,

        /// Caller identity recorded on the execution.
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Run one of a skill's optional operations.
    Extra {
        /// Skill name.
        name: String,

        /// Operation as JSON, e.g. '{"operation":"summarization","text":"..."}'.
        operation: String,
    },

    /// Run a skill on an interval until Ctrl+C.
    Schedule {
        /// Skill name.
        name: String,

        /// Seconds between runs.
        #[arg(long, default_value_t = 60)]
        every: u64,

        /// Stop after this many runs.
        #[arg(long)]
        max_runs: Option<u32>,

        /// Raw input passed on every run.
        #[arg(long, short, default_value = "")]
        input: String,
    },

    /// Show schedules declared in the configuration.
    Schedules,
}

#[derive(Subcommand)]
pub enum MemoryAction {
    /// Store a new memory entry.
    Add {
        /// Entry content.
        content: String,

        /// Tag to attach (repeatable).
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,

        /// Importance 1-10 (clamped).
        #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
        importance: i32,

        /// Provenance label.
        #[arg(long, default_value = "cli")]
        source: String,
    },

    /// Search entries.
    Query {
        /// Keywords (any must appear in the content).
        keywords: Vec<String>,

        /// Tag filter (repeatable; any must match).
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,

        /// Minimum importance.
        #[arg(long)]
        min_importance: Option<u8>,

        /// Only entries created within the last N days.
        #[arg(long)]
        since_days: Option<i64>,

        /// Maximum results.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// relevance, recency, importance, or access_count.
        #[arg(long, default_value = "relevance")]
        sort: SortBy,
    },

    /// Show a single entry.
    Get {
        id: String,
    },

    /// Change an entry's content, tags, or importance.
    Update {
        id: String,

        #[arg(long)]
        content: Option<String>,

        /// Replacement tag set (repeatable).
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,

        #[arg(long, allow_negative_numbers = true)]
        importance: Option<i32>,
    },

    /// Delete an entry.
    #[command(alias = "rm")]
    Delete {
        id: String,
    },

    /// Show usage statistics.
    Stats,

    /// Run an eviction pass now.
    Cleanup,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,

    /// Write a config.toml populated with the defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration file path.
    Path,
}

fn parse_param(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}
