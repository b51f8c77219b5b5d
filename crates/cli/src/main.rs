//! Tablewise CLI - Migrations, bootstrap and offline policy checks.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! tw-cli migrate
//!
//! # Seed the permission catalog and the first Administrator
//! tw-cli admin bootstrap -e owner@example.com -p 'correct horse battery'
//!
//! # Print the per-collection policy table
//! tw-cli policy show
//!
//! # Evaluate requests described in a YAML file
//! tw-cli policy check fixtures/requests.yaml
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin bootstrap` - Create the Administrator role and account
//! - `policy show` / `policy check` - Inspect the access policy without a database

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tw-cli")]
#[command(author, version, about = "Tablewise CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage administrator accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Inspect the access policy
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Seed the permission catalog, the Administrator role and an
    /// Administrator account
    Bootstrap {
        /// Administrator email address
        #[arg(short, long)]
        email: String,

        /// Administrator password
        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Print the static policy table
    Show,
    /// Evaluate the requests in a YAML file and print the decisions
    Check {
        /// Path to the YAML file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Bootstrap { email, password } => {
                commands::admin::bootstrap(&email, &password).await?;
            }
        },
        Commands::Policy { action } => match action {
            PolicyAction::Show => commands::policy::show(),
            PolicyAction::Check { file } => {
                let failures = commands::policy::check_file(&file)?;
                if failures > 0 {
                    return Err(format!("{failures} request(s) did not match the expected decision").into());
                }
            }
        },
    }
    Ok(())
}
