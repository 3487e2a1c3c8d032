//! rexec CLI
//!
//! Single binary for all client operations:
//! - Account management (login, register, logout)
//! - Deploying executables and listing them
//! - Running executables and relaying their output

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rexec::client::ClientOptions;
use rexec::commands;
use rexec::output::print_error;
use rx_core::config;

#[derive(Parser)]
#[command(name = "rexec")]
#[command(author, version, about = "Deploy executables to a remote backend and run them")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "REXEC_CONFIG")]
    config: Option<PathBuf>,

    /// WebSocket URL of the backend (overrides config)
    #[arg(long, global = true, env = "REXEC_SERVER")]
    server: Option<String>,

    /// Upload endpoint (overrides config)
    #[arg(long, global = true, env = "REXEC_DEPLOY_URL")]
    deploy_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and cache credentials for later invocations
    Login {
        /// Account name
        username: String,
        /// Account password
        #[arg(short, long, env = "REXEC_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create a new account
    Register {
        /// Account name
        username: String,
        /// Account password
        #[arg(short, long, env = "REXEC_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the session and forget cached credentials
    Logout,

    /// List deployed executables
    /// Alias: ls
    #[command(alias = "ls")]
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a file as a new executable
    Deploy {
        /// File to upload
        file: PathBuf,
        /// Name for the executable (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Run a deployed executable
    /// Alias: run
    #[command(alias = "run")]
    Exec {
        /// Executable id or name
        target: String,
        /// Arguments passed to the executable
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show connection and session status
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get specific config value
    Get { key: String },
    /// Set config value
    Set { key: String, value: String },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let options = ClientOptions {
        config_path: cli.config,
        server_url: cli.server,
        deploy_url: cli.deploy_url,
    };

    let result = match cli.command {
        Commands::Login { username, password } => {
            commands::login_command(&options, &username, &password).await
        }

        Commands::Register { username, password } => {
            commands::register_command(&options, &username, &password).await
        }

        Commands::Logout => commands::logout_command(&options).await,

        Commands::List { json } => commands::list_command(&options, json).await,

        Commands::Deploy { file, name } => {
            commands::deploy_command(&options, &file, name.as_deref()).await
        }

        Commands::Exec { target, args } => {
            match commands::exec_command(&options, &target, &args).await {
                Ok(0) => Ok(()),
                Ok(code) => std::process::exit(code),
                Err(e) => Err(e),
            }
        }

        Commands::Status { json } => commands::status_command(&options, json).await,

        Commands::Config { action } => {
            let path = options.config_path();
            match action {
                ConfigAction::Show => commands::config_show(&path),
                ConfigAction::Get { key } => commands::config_get(&path, &key),
                ConfigAction::Set { key, value } => commands::config_set(&path, &key, &value),
                ConfigAction::Init { force } => commands::config_init(&path, force),
                ConfigAction::Path => {
                    println!("{}", path.display());
                    tracing::debug!(
                        "Credential cache defaults to {}",
                        config::default_credential_path().display()
                    );
                    Ok(())
                }
            }
        }
    };

    if let Err(e) = &result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
