mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, user::UserSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "reune",
    about = "Performance management backend: people, reviews, OKRs and feedback",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .reune/)
    #[arg(long, global = true, env = "REUNE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .reune/, its config and the database
    Init {
        /// Organization name (default: the root directory's name)
        #[arg(long)]
        organization: Option<String>,
    },

    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(long, short = 'p')]
        port: Option<u16>,
        /// Address to bind (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Manage users and API tokens
    User {
        #[command(subcommand)]
        subcommand: UserSubcommand,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { organization } => cmd::init::run(&root, organization.as_deref()),
        Commands::Serve { port, bind } => cmd::serve::run(&root, port, bind.as_deref()),
        Commands::User { subcommand } => cmd::user::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
