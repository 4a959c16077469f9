use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use tracing_subscriber::EnvFilter;

use podsync::{
    ClientConfig, CredentialStore, EventReporter, HttpAuthenticator, LoginDetails, NoopReporter,
    ReqwestClient, SessionEvent, SessionStore, SharedEventReporter, SyncServerClient,
};

// Emoji with fallback for terminals without Unicode support
static KEY: Emoji<'_, '_> = Emoji("🔑 ", "[k] ");
static RETRY: Emoji<'_, '_> = Emoji("🔁 ", "[r] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static WAVE: Emoji<'_, '_> = Emoji("👋 ", "[-] ");

/// Talk to a podcast sync server with automatic token refresh
#[derive(Parser, Debug)]
#[command(name = "podsync")]
#[command(about = "Talk to a podcast sync server with automatic token refresh")]
#[command(version)]
struct Args {
    /// Base URL of the sync server
    #[arg(short, long, env = "PODSYNC_SERVER")]
    server: String,

    /// Account email, used to log in when no refresh token works
    #[arg(short, long, env = "PODSYNC_EMAIL")]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "PODSYNC_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Refresh token from a previous session
    #[arg(long, env = "PODSYNC_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "30")]
    timeout: u64,

    /// Quiet mode - suppress session messages
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Obtain an access token and print the refresh token to reuse
    Token,

    /// GET an API path and print the JSON response
    Get { path: String },

    /// POST a JSON body to an API path and print the JSON response
    Post { path: String, body: String },

    /// DELETE an API path
    Delete { path: String },
}

/// Session reporter printing colored messages to stderr
struct ConsoleReporter;

impl EventReporter for ConsoleReporter {
    fn report(&self, event: SessionEvent) {
        match event {
            SessionEvent::RefreshStarted => {
                eprintln!("{KEY}{}", "Obtaining access token...".dimmed());
            }
            SessionEvent::RefreshSucceeded => {
                eprintln!("{SUCCESS}{}", "Access token ready".green());
            }
            SessionEvent::RefreshFailed { error } => {
                eprintln!("{FAILURE}{} {}", "Could not obtain token:".red().bold(), error.red());
            }
            SessionEvent::RetryingAfterUnauthorized { message } => {
                eprintln!(
                    "{RETRY}{} {}",
                    "Token rejected, retrying once:".yellow(),
                    message.dimmed()
                );
            }
            SessionEvent::SignedOut => {
                eprintln!("{WAVE}{}", "Signed out".cyan());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("podsync=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = ClientConfig::new(&args.server)
        .context("Invalid server URL")?
        .with_timeout(Duration::from_secs(args.timeout));

    let auth_http = ReqwestClient::from_config(&config).context("Failed to create HTTP client")?;
    let mut store = SessionStore::new(HttpAuthenticator::new(auth_http, config.clone()));
    if let Some(refresh_token) = args.refresh_token.clone() {
        store = store.with_refresh_token(refresh_token);
    }
    if let (Some(email), Some(password)) = (args.email.clone(), args.password.clone()) {
        store = store.with_login(LoginDetails::new(email, password));
    }
    let store = Arc::new(store);

    let reporter: SharedEventReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(ConsoleReporter)
    };

    let client = SyncServerClient::connect(config, store.clone())
        .context("Failed to create sync client")?
        .with_reporter(reporter);

    let result = match &args.command {
        Command::Token => store
            .refresh_credential()
            .await
            .map(|_| None)
            .map_err(podsync::SyncError::from),
        Command::Get { path } => client.get_json::<serde_json::Value>(path).await.map(Some),
        Command::Post { path, body } => {
            let body: serde_json::Value =
                serde_json::from_str(body).context("Request body is not valid JSON")?;
            client
                .post_json::<_, serde_json::Value>(path, &body)
                .await
                .map(Some)
        }
        Command::Delete { path } => client.delete(path).await.map(|_| None),
    };

    match result {
        Ok(Some(value)) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Ok(None) => {
            if let Command::Token = args.command
                && let Some(refresh_token) = store.refresh_token().await
            {
                println!("{refresh_token}");
            }
        }
        Err(e) => {
            eprintln!("{FAILURE}{} {}", "Request failed:".red().bold(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
