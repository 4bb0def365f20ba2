use anyhow::Context;
use clap::{Parser, Subcommand};

use bookstore_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "bookstore", version, about = "Bookstore backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API with background sweepers
    Serve,
    /// Apply pending schema migrations and exit
    Migrate,
    /// Remove expired tokens and idle carts once and exit
    Sweep,
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        /// Falls back to BOOKSTORE_ADMIN_PASSWORD
        #[arg(long, env = "BOOKSTORE_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Load and validate configuration without touching the database
    CheckConfig,
}

fn load_settings() -> anyhow::Result<Settings> {
    Settings::load().context("failed to load bookstore settings")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let settings = bookstore_app::app::bootstrap()?;
            bookstore_app::app::run(settings).await
        }
        Command::Migrate => {
            let settings = bookstore_app::app::bootstrap()?;
            let applied = bookstore_app::app::migrate(&settings).await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Command::Sweep => {
            let settings = bookstore_app::app::bootstrap()?;
            let report = bookstore_app::app::run_sweeps_once(&settings).await?;
            println!("removed {} token(s), {} cart(s)", report.tokens, report.carts);
            Ok(())
        }
        Command::CreateAdmin { email, password } => {
            let settings = bookstore_app::app::bootstrap()?;
            let id = bookstore_app::app::create_admin(&settings, &email, &password).await?;
            println!("created admin {email} with id {id}");
            Ok(())
        }
        Command::CheckConfig => {
            let settings = load_settings()?;
            tracing::debug!(?settings, "configuration loaded");
            println!(
                "configuration ok: env={:?} listen={}:{}",
                settings.environment, settings.server.host, settings.server.port
            );
            Ok(())
        }
    }
}
