use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cgraph_schema::Dialect;
use cgraph_types::{ContentStreamId, SubtreeTag};

#[derive(Parser)]
#[command(
    name = "cgraph",
    about = "Content graph projection: schema, event replay and subgraph inspection",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration (table prefix, graph behavior, dimensions)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the DDL of the projection tables
    Schema(SchemaArgs),
    /// Apply a JSON lines event log and report stream versions
    Replay(ReplayArgs),
    /// Replay an event log and print one subgraph as a tree
    Tree(TreeArgs),
    /// List the allowed dimension space points and their hashes
    Dimensions(DimensionsArgs),
}

#[derive(Args)]
pub struct SchemaArgs {
    /// Overrides the configured table prefix
    #[arg(long)]
    pub prefix: Option<String>,
    #[arg(long, default_value = "mysql")]
    pub dialect: Dialect,
}

#[derive(Args)]
pub struct ReplayArgs {
    pub log: PathBuf,
    /// Report failed events and continue with the next one
    #[arg(long)]
    pub keep_going: bool,
    /// Delete removed content streams after the replay
    #[arg(long)]
    pub prune: bool,
}

#[derive(Args)]
pub struct TreeArgs {
    pub log: PathBuf,
    #[arg(long)]
    pub stream: ContentStreamId,
    /// Dimension space point as JSON, e.g. '{"language":"en"}'
    #[arg(long, default_value = "{}")]
    pub point: String,
    /// Hide subtrees carrying this tag
    #[arg(long)]
    pub hide: Vec<SubtreeTag>,
}

#[derive(Args)]
pub struct DimensionsArgs {}
