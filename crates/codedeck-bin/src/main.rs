//! CodeDeck command-line client.

mod browser;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use codedeck_core::{init_logging, Config, Paths};

/// CodeDeck command-line interface.
#[derive(Parser)]
#[command(name = "codedeck")]
#[command(about = "Sign in to CodeDeck and work with your projects and snippets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Base directory for config and token files. Defaults to ~/.codedeck
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in through the identity provider in a browser
    Login {
        /// Create a new account instead of signing in
        #[arg(long)]
        signup: bool,
        /// Local port for the sign-in callback (0 picks a free port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Clear stored tokens and end the provider session
    Logout,
    /// Show the current session state
    Status,
    /// Show the signed-in profile
    Whoami,
    /// List your projects
    Projects,
    /// List your snippets
    Snippets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    match cli.command {
        Commands::Login { signup, port } => commands::login(&config, &paths, signup, port).await,
        Commands::Logout => commands::logout(&config, &paths),
        Commands::Status => commands::status(&config, &paths).await,
        Commands::Whoami => commands::whoami(&config, &paths).await,
        Commands::Projects => commands::projects(&config, &paths).await,
        Commands::Snippets => commands::snippets(&config, &paths).await,
    }
}
