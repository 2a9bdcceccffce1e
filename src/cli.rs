use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "clusterex",
    version,
    about = "Run tracking and hierarchical decomposition for iterative text clustering"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Spawn child clustering jobs from clusters of a finished run
    Decompose(DecomposeArgs),
    /// Rebuild the cluster summary report and chart of a select stage
    Summarize(SummarizeArgs),
    /// Show iterations, stage artifacts and recorded metrics of a run
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DecomposeArgs {
    /// Run directory holding `args.json` and `iteration-{n}` directories
    #[arg(long)]
    pub run_dir: PathBuf,

    /// Iteration to decompose; defaults to the latest one with a final selection
    #[arg(long)]
    pub iteration: Option<usize>,

    /// Cluster index to decompose; repeat for several. Prompts when omitted.
    #[arg(long = "index")]
    pub indices: Vec<usize>,

    #[arg(long, default_value = "python src/iterative_cluster.py")]
    pub launcher_program: String,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    #[arg(long)]
    pub run_dir: PathBuf,

    #[arg(long)]
    pub iteration: Option<usize>,

    #[arg(long, default_value = "final")]
    pub stage: String,

    /// Seed for example sampling; random when omitted
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long)]
    pub run_dir: PathBuf,
}
