//! Demo-binary CLI surface (ambient): an `OutputFormat` enum and a `clap`
//! derive `Args` struct.

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table plus pretty-printed logs.
    Pretty,
    /// Newline-delimited JSON logs, for machine consumption.
    Jsonl,
}

#[derive(Debug, Parser)]
#[command(version, about = "Run an evaluatorq experiment")]
pub struct Args {
    /// Bounded concurrency across datapoints.
    #[arg(long, default_value_t = 1)]
    pub parallelism: usize,

    /// Log/print format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Upload the run to the remote platform after it completes.
    #[arg(long, default_value_t = false)]
    pub send_results: bool,

    /// Human-readable note attached to the run.
    #[arg(long)]
    pub description: Option<String>,

    /// Slash-delimited remote project/folder path stored on the uploaded record.
    #[arg(long)]
    pub path: Option<String>,

    /// Also write the result tree as JSON Lines to this local path.
    #[arg(long)]
    pub jsonl_path: Option<String>,

    /// Show a progress bar on stderr as datapoints complete.
    #[arg(long, default_value_t = false)]
    pub show_progress: bool,
}
