use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxrate::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fxrate::AppCommand {
    fn from(cmd: Commands) -> fxrate::AppCommand {
        match cmd {
            Commands::Rate { from, to, refresh } => fxrate::AppCommand::Rate { from, to, refresh },
            Commands::Convert { amount, from, to } => {
                fxrate::AppCommand::Convert { amount, from, to }
            }
            Commands::Table { base, codes } => fxrate::AppCommand::Table { base, codes },
            Commands::Stored => fxrate::AppCommand::Stored,
            Commands::Clear => fxrate::AppCommand::Clear,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show the exchange rate between two currencies
    Rate {
        from: String,
        to: String,
        /// Bypass cached rates and ask the market-rate provider
        #[arg(short, long)]
        refresh: bool,
    },
    /// Convert an amount between currencies
    Convert {
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        from: String,
        to: String,
    },
    /// Show rates from a base currency to several others
    Table {
        /// Base currency, defaults to `base_currency` from the config
        #[arg(short, long)]
        base: Option<String>,
        /// Target currencies, defaults to `watchlist` from the config
        codes: Vec<String>,
    },
    /// List rates kept in the local store
    Stored,
    /// Remove all rates from the local store
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fxrate::cli::setup::setup(),
        Some(cmd) => fxrate::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
