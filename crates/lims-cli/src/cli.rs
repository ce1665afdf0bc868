//! Command-line arguments for `lims`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use lims_model::BatchKind;

#[derive(Parser)]
#[command(
    name = "lims",
    version,
    about = "Paternity-testing lab workflow: intake, batching, allele import and comparison",
    long_about = "Track samples through PCR and electrophoresis, build 96-well plates,\n\
                  import GeneMapper allele tables and compare child against alleged parent."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for humans, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow genotype values and donor names in log output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,

    /// Configuration file (default: <STORE>/lims.json when present).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Store directory holding samples.json, batches.json and audit.jsonl.
    #[arg(long = "store", value_name = "DIR", global = true)]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse a GeneMapper allele table and summarize it.
    Ingest(IngestArgs),

    /// Compare a child against an alleged parent from one allele table.
    Paternity(PaternityArgs),

    /// Show metadata of ABIF (.fsa) files.
    Fsa(FsaArgs),

    /// Sample intake and listing.
    #[command(subcommand)]
    Samples(SamplesCommand),

    /// Create and inspect plates.
    #[command(subcommand)]
    Batch(BatchCommand),

    /// Move samples to a workflow status, all or none.
    Status(StatusArgs),
}

#[derive(Args)]
pub struct IngestArgs {
    /// Tab-delimited GeneMapper export.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print readings and skipped rows as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct PaternityArgs {
    /// Tab-delimited GeneMapper export holding both samples.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Sample id of the child (detected from sample names when omitted).
    #[arg(long, requires = "parent")]
    pub child: Option<String>,

    /// Sample id of the alleged parent.
    #[arg(long, requires = "child")]
    pub parent: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct FsaArgs {
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Print summaries as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum SamplesCommand {
    /// Add samples from a JSON array; rejected as a whole on duplicates.
    Import {
        #[arg(value_name = "JSON")]
        file: PathBuf,
    },

    /// List stored samples.
    List {
        /// Only samples in this status.
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum BatchCommand {
    /// Build a plate from eligible samples and commit it.
    Create(CreateArgs),

    /// Print a stored plate.
    Show {
        #[arg(value_name = "BATCH_NUMBER")]
        batch_number: String,

        /// Print the well map as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
pub struct CreateArgs {
    #[arg(long, value_enum)]
    pub kind: KindArg,

    /// Operator recorded on the batch and audit entries.
    #[arg(long)]
    pub operator: Option<String>,

    /// Restrict to these cases.
    #[arg(long = "case", value_name = "CASE")]
    pub cases: Vec<String>,

    /// Pick cases by member lab number.
    #[arg(long = "sample", value_name = "LAB_NUMBER")]
    pub samples: Vec<String>,

    /// Note stored on every audit entry.
    #[arg(long)]
    pub note: Option<String>,

    /// Show the plate without committing anything.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Target status, e.g. pcr_completed.
    #[arg(value_name = "STATUS")]
    pub status: String,

    #[arg(value_name = "LAB_NUMBER", required = true)]
    pub lab_numbers: Vec<String>,

    #[arg(long)]
    pub note: Option<String>,

    #[arg(long)]
    pub operator: Option<String>,

    /// Print the response as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Pcr,
    Electrophoresis,
    Rerun,
}

impl From<KindArg> for BatchKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Pcr => BatchKind::Pcr,
            KindArg::Electrophoresis => BatchKind::Electrophoresis,
            KindArg::Rerun => BatchKind::Rerun,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
