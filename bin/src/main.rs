//! klinevault CLI - verified mirror of Binance Vision kline archives.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod settings;

use display::Format;
use settings::{Selection, Settings};

#[derive(Parser)]
#[command(name = "klinevault")]
#[command(about = "Mirror, verify and parse Binance Vision kline archives", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Commands {
    /// List symbols published for the selected data kind
    Symbols {
        /// Only print symbols containing this pattern
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show exchange metadata for symbols
    ExchangeInfo {
        /// Symbols to show (all when omitted)
        symbols: Vec<String>,

        /// Only show symbols currently trading
        #[arg(long)]
        trading: bool,
    },

    /// List remote archives for symbols
    Files {
        #[command(flatten)]
        selection: Selection,
    },

    /// Download archives and their checksum sidecars
    Download {
        #[command(flatten)]
        selection: Selection,
    },

    /// Verify downloaded archives against their sidecars
    Verify {
        #[command(flatten)]
        selection: Selection,
    },

    /// Parse verified archives, optionally exporting them
    Parse {
        #[command(flatten)]
        selection: Selection,

        /// Write one output file per archive under <data-root>/parsed
        #[arg(short, long, value_enum)]
        format: Option<Format>,
    },

    /// List, download, verify and optionally export in one run
    Sync {
        #[command(flatten)]
        selection: Selection,

        /// Write one output file per archive under <data-root>/parsed
        #[arg(short, long, value_enum)]
        format: Option<Format>,
    },

    /// Show local verification state per symbol
    Status {
        #[command(flatten)]
        selection: Selection,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "klinevault=info,klinevault_lib=info,klinevault_fetch=info",
        (false, 2) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    init_tracing(cli.verbose, cli.quiet);
    let settings = cli.settings;
    let quiet = cli.quiet;

    let run = async move {
        match command {
            Commands::Symbols { search } => {
                commands::symbols::symbols(&settings, search.as_deref()).await
            }
            Commands::ExchangeInfo { symbols, trading } => {
                commands::exchange_info::exchange_info(&settings, &symbols, trading).await
            }
            Commands::Files { selection } => commands::files::files(&settings, &selection).await,
            Commands::Download { selection } => {
                commands::download::download(&settings, &selection, quiet).await
            }
            Commands::Verify { selection } => {
                commands::verify::verify(&settings, &selection, quiet).await
            }
            Commands::Parse { selection, format } => {
                commands::parse::parse(&settings, &selection, format.map(Into::into), quiet).await
            }
            Commands::Sync { selection, format } => {
                commands::sync::sync(&settings, &selection, format.map(Into::into), quiet).await
            }
            Commands::Status { selection } => commands::status::status(&settings, &selection).await,
        }
    };

    // Returning drops the pending run, which kills any aria2c child and
    // leaves only `.part` files behind.
    tokio::select! {
        result = run => result.map(|()| ExitCode::SUCCESS),
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted; partial downloads are retried on the next run.");
            Ok(ExitCode::from(130))
        }
    }
}
