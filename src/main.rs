use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use lifestyle_api::auth::{generate_jwt, Claims};
use lifestyle_api::config;
use lifestyle_api::database::{schema, DatabaseManager};

#[derive(Parser)]
#[command(name = "lifestyle-api")]
#[command(about = "Lifestyle API - shared planning backend for partners and groups")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "LIFESTYLE_API_PORT")]
        port: Option<u16>,
    },

    #[command(about = "Mint a bearer token for local testing")]
    Token {
        user_id: Uuid,

        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve {
        host: "0.0.0.0".to_string(),
        port: std::env::var("LIFESTYLE_API_PORT").ok().and_then(|s| s.parse().ok()),
    });
    match command {
        Commands::Serve { host, port } => serve(host, port).await,
        Commands::Token { user_id, email } => {
            println!("{}", generate_jwt(&Claims::new(user_id, email))?);
            Ok(())
        }
    }
}

async fn serve(host: String, port: Option<u16>) -> anyhow::Result<()> {
    let config = config::config();
    tracing::info!("Starting Lifestyle API in {:?} mode", config.environment);

    if config.database.auto_migrate {
        let pool = DatabaseManager::pool().await?;
        schema::migrate(&pool).await?;
    }

    // Hosting platforms hand us PORT; LIFESTYLE_API_PORT wins when both are set
    let port = port
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(3000);

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Lifestyle API listening on http://{}", bind_addr);

    axum::serve(listener, lifestyle_api::app()).await?;
    DatabaseManager::close().await;
    Ok(())
}
