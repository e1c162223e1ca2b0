use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// The main entry point for the rowstream service.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from the .env file when present.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command-line arguments and execute the appropriate command.
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
        Commands::Migrate => handle_migrate().await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A demonstration service for streaming reads and atomic multi-statement
/// writes over PostgreSQL.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Apply pending database migrations and exit.
    Migrate,
}

#[derive(Parser)]
struct ServeArgs {
    /// Override the listen address from config.toml (e.g. "0.0.0.0:8080").
    #[arg(long)]
    addr: Option<SocketAddr>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_serve(args: ServeArgs) -> anyhow::Result<()> {
    let addr = match args.addr {
        Some(addr) => addr,
        None => {
            let config = configuration::load_config()?;
            config.server.listen_addr.parse()?
        }
    };
    web_server::run_server(addr).await
}

async fn handle_migrate() -> anyhow::Result<()> {
    let pool = database::connect().await?;
    database::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied.");
    Ok(())
}
