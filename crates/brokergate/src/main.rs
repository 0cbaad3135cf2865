//! Brokergate daemon - authenticating proxy for the Fyers trading API

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use brokergate::BrokerGateError;
use brokergate::analyst::{GeminiProvider, SignalProvider};
use brokergate::config::Config;
use brokergate::error::Result;
use brokergate::proxy::{AppState, ProxyServer};
use brokergate::session::SessionManager;

/// Brokergate - a single-session HTTP proxy in front of the Fyers API
#[derive(Parser)]
#[command(name = "brokergate")]
#[command(about = "An authenticating HTTP proxy in front of the Fyers trading API")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the proxy server (default command)
    #[command(name = "serve")]
    Serve,
    /// Check the configured access token against the broker and exit
    #[command(name = "check-token")]
    CheckToken,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    load_dotenv();
    init_logging();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env();
    tracing::debug!("Config loaded: {:?}", config);

    match cli.command {
        None | Some(Command::Serve) => serve(config).await,
        Some(Command::CheckToken) => check_token(config).await,
    }
}

fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        // Only a missing .env is expected
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: failed to load .env file: {e}");
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,brokergate=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_session(config: &Config) -> Result<Arc<SessionManager>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.timeout_secs))
        .build()
        .map_err(|e| BrokerGateError::Server(format!("Failed to create HTTP client: {e}")))?;

    Ok(Arc::new(SessionManager::new(config.broker.clone(), http)))
}

/// Install a pre-provisioned token, if any; returns whether one was installed
fn install_configured_token(session: &SessionManager) -> bool {
    let broker = session.config();
    let (Some(token), Some(app_id)) = (broker.access_token(), broker.client_id()) else {
        if broker.access_token().is_some() {
            tracing::warn!("FYERS_ACCESS_TOKEN is set but FYERS_CLIENT_ID is not; ignoring token");
        }
        return false;
    };
    session.configure_from_token(token, app_id);
    true
}

async fn serve(config: Config) -> Result<()> {
    tracing::info!("Starting brokergate");

    let session = build_session(&config)?;
    if install_configured_token(&session) && config.broker.verify_token_on_startup {
        match session.verify_current().await {
            Ok(name) => tracing::info!("Access token verified for: {name}"),
            Err(e) => tracing::warn!("Configured access token dropped: {e}"),
        }
    }
    if config.broker.oauth_settings().is_err() {
        tracing::warn!("Broker login settings are incomplete; /login will fail until configured");
    }

    let analyst: Option<Arc<dyn SignalProvider>> = match GeminiProvider::new(&config.gemini) {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            tracing::warn!("Signal analysis disabled: {e}");
            None
        }
    };

    let state = Arc::new(AppState { session, analyst });
    let server = ProxyServer::new(config.server, state);
    server.serve().await
}

async fn check_token(config: Config) -> Result<()> {
    let session = build_session(&config)?;
    if !install_configured_token(&session) {
        return Err(BrokerGateError::Config(
            "no access token configured (set FYERS_ACCESS_TOKEN and FYERS_CLIENT_ID)".to_string(),
        ));
    }

    let name = session.verify_current().await?;
    println!("Access token is valid for: {name}");
    Ok(())
}
