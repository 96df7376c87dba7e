use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "keycycle",
    about = "Rotate, deactivate and delete aging IAM access keys",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML). Environment variables override its values.
    #[arg(long, global = true, env = "KEYCYCLE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate accounts and apply (or report) key lifecycle actions
    Run(commands::run::RunArgs),

    /// Load and validate settings, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let guard = match keycycle_log::auto_init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("warning: logging disabled: {e}");
            keycycle_log::LoggerGuard::noop()
        }
    };

    match cli.command {
        Commands::Run(args) => {
            commands::run::execute(args, cli.config.as_deref(), guard.root_span()).await
        }
        Commands::CheckConfig => commands::check::execute(cli.config.as_deref()),
    }
}
