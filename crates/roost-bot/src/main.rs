mod builtins;
mod controller;
mod tenant;

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use roost_types::{TenantId, UserId};

/// Roost -- multi-tenant Telegram bot controller.
#[derive(Parser, Debug)]
#[command(name = "roost", version, about)]
struct Cli {
    /// Data root: registry, tenant configs, tenant data, logs
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controller bot
    Controller {
        /// Controller bot token (falls back to ROOST_BOT_TOKEN)
        #[arg(long)]
        token: Option<String>,

        /// User id allowed to manage tenants (falls back to ROOST_ADMIN_ID)
        #[arg(long)]
        admin: Option<i64>,
    },

    /// Run one tenant bot (spawned by the controller)
    Tenant {
        /// Tenant id; the runtime config is loaded from the data root
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Controller { token, admin } => {
            let token = match token.or_else(|| std::env::var("ROOST_BOT_TOKEN").ok()) {
                Some(token) => token,
                None => bail!("no bot token: pass --token or set ROOST_BOT_TOKEN"),
            };
            let admin = match admin.or_else(|| {
                std::env::var("ROOST_ADMIN_ID")
                    .ok()
                    .and_then(|v| v.parse().ok())
            }) {
                Some(admin) => UserId(admin),
                None => bail!("no admin id: pass --admin or set ROOST_ADMIN_ID"),
            };
            controller::run(cli.data_dir, token, admin).await
        }
        Commands::Tenant { id } => tenant::run(cli.data_dir, TenantId::new(id)).await,
    }
}
