//! spiff cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; spiff ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a template against stubs
    ///
    /// Stubs are given in priority order, values of the first stub win.
    #[command(alias = "m")]
    Merge(MergeCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct MergeCommand {
    /// Template file, `-` reads stdin
    pub template: PathBuf,

    /// Stub files consulted by `merge`
    pub stubs: Vec<PathBuf>,

    /// Print partially resolved documents instead of failing
    ///
    /// Unresolved nodes are still listed on stderr.
    #[clap(long)]
    pub partial: bool,

    /// Upper bound for resolution passes
    #[clap(long, default_value_t = 1024)]
    pub max_passes: usize,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Print the syntax tree of a dynaml expression
    Parse { expression: String },
    /// Print the position and type of every node of a document
    Tree { file: PathBuf },
}
