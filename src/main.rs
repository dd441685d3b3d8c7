//! `scaffold` - project file generator with rollback on failure.
//!
//! See `README.md` for user documentation and `DESIGN.md` for architecture.

use clap::Parser;
use colored::Colorize;
use tracing::error;
use tracing_subscriber::EnvFilter;

use scaffold::cli::{Cli, Command};
use scaffold::exit_codes::exit;

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let result = match cli.command {
        Command::Schema => scaffold::model::generate_schema().map(|schema| {
            println!("{}", schema);
            exit::SUCCESS
        }),
        Command::Generate(args) => scaffold::engine::generate(args).await,
        Command::Destroy(args) => scaffold::engine::destroy(args).await,
    };
    let exit_code = match result {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{err:#}"), "command failed");
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            scaffold::error::exit_code_of(&err)
        }
    };
    std::process::exit(exit_code);
}
