use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Project file generator with rollback on failure.
#[derive(Parser)]
#[command(name = "scaffold", version, about, long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print JSON Schema for generation manifests.
    Schema,
    /// Write the files listed in a manifest.
    Generate(RunArgs),
    /// Remove the files listed in a manifest.
    Destroy(RunArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Path to manifest JSON file.
    #[arg(long, required = true)]
    pub manifest: PathBuf,

    /// Override root directory.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Overwrite existing files. Disables rollback.
    #[arg(long)]
    pub force: bool,

    /// Leave partial output in place when a step fails.
    #[arg(long = "no-rollback", action = ArgAction::SetFalse)]
    pub rollback: bool,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Rollback is armed unless it was turned off or `--force` was given.
    pub fn rollback_armed(&self) -> bool {
        self.rollback && !self.force
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunArgs {
        let cli = Cli::parse_from(args);
        match cli.command {
            Command::Generate(args) | Command::Destroy(args) => args,
            Command::Schema => panic!("expected a run command"),
        }
    }

    #[test]
    fn rollback_on_by_default() {
        let args = parse(&["scaffold", "generate", "--manifest", "plan.json"]);
        assert!(args.rollback);
        assert!(args.rollback_armed());
    }

    #[test]
    fn force_disarms_rollback() {
        let args = parse(&["scaffold", "generate", "--manifest", "plan.json", "--force"]);
        assert!(args.rollback);
        assert!(!args.rollback_armed());
    }

    #[test]
    fn no_rollback_flag() {
        let args = parse(&["scaffold", "destroy", "--manifest", "plan.json", "--no-rollback"]);
        assert!(!args.rollback_armed());
    }
}
