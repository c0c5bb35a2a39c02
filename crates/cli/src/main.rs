//! Parley CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! parley migrate
//!
//! # Create a tenant account
//! parley tenant create -e owner@example.com -b "Asha Traders" -p 'long password'
//!
//! # Generate a PARLEY_SETTINGS_KEY
//! parley keygen
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `tenant create` - Create tenant accounts
//! - `keygen` - Print a fresh settings encryption key

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "parley")]
#[command(author, version, about = "Parley CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage tenant accounts
    Tenant {
        #[command(subcommand)]
        action: TenantAction,
    },
    /// Print a new base64 AES-256 key for `PARLEY_SETTINGS_KEY`
    Keygen,
}

#[derive(Subcommand)]
enum TenantAction {
    /// Create a new tenant
    Create {
        /// Login email address
        #[arg(short, long)]
        email: String,

        /// Business display name
        #[arg(short, long)]
        business_name: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
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
        Commands::Tenant { action } => match action {
            TenantAction::Create {
                email,
                business_name,
                password,
            } => {
                commands::tenant::create(&email, &business_name, &password).await?;
            }
        },
        Commands::Keygen => commands::keygen::run(),
    }
    Ok(())
}
