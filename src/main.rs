use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    let cli = hiring_agent::cli::Cli::parse();
    let level = if cli.quiet() { "warn" } else { "info" };
    hiring_agent::logging::init(level).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        hiring_agent::cli::Command::Score(args) => {
            hiring_agent::pipeline::run_score(args).context("score")?;
        }
        hiring_agent::cli::Command::Segment(args) => {
            hiring_agent::pipeline::run_segment(args).context("segment")?;
        }
        hiring_agent::cli::Command::Extract(args) => {
            hiring_agent::pipeline::run_extract(args).context("extract")?;
        }
    }

    Ok(())
}
