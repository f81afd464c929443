use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::llm::EngineKind;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn quiet(&self) -> bool {
        matches!(&self.command, Command::Score(args) if args.quiet)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract, evaluate and score one résumé or a folder of them.
    Score(ScoreArgs),
    /// Print the header-based segments of a document as JSON.
    Segment(SegmentArgs),
    /// Extract and assemble the structured record without evaluating it.
    Extract(ExtractArgs),
}

/// Settings shared by every command that talks to the inference engine.
#[derive(Debug, Clone, Args)]
pub struct EngineArgs {
    /// YAML config file (default: `hiring_agent.yaml` when present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Inference engine.
    #[arg(long, value_enum)]
    pub engine: Option<EngineKind>,

    /// Model name passed to the engine.
    #[arg(long)]
    pub model: Option<String>,

    /// Skip the on-disk cache for records and API responses.
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Args)]
pub struct ScoreArgs {
    /// A résumé file or a folder of résumés.
    pub path: PathBuf,

    /// Descend into subfolders.
    #[arg(long, short)]
    pub recursive: bool,

    /// One line per document instead of the full report.
    #[arg(long, short)]
    pub quiet: bool,

    /// CSV file rows are appended to.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Do not fetch GitHub, GitLab or blog data.
    #[arg(long)]
    pub no_enrich: bool,

    /// Also pick up `.txt` and `.md` files in folder mode.
    #[arg(long)]
    pub include_text: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Debug, Args)]
pub struct SegmentArgs {
    /// Résumé file (PDF, text or markdown).
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Résumé file (PDF, text or markdown).
    pub file: PathBuf,

    /// Write the record JSON here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub engine: EngineArgs,
}
