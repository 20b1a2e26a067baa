//! mailboxd - HTTP front end for the mailbox exporter
//!
//! Serves `/get-user-email`, `/fetch-emails` and `/clear-session`.

use anyhow::Context;
use log::{error, info};
use mailbox::{GmailCredentials, MailboxService, MailboxSettings};

mod error;
mod routes;

use routes::AppState;

const DEFAULT_ADDR: &str = "127.0.0.1:8000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let settings = MailboxSettings::from_env().context("Invalid mailbox settings")?;
    let client = GmailCredentials::resolve(&settings.client_secret_file, None)
        .context("Gmail OAuth client not configured")?;
    let service = MailboxService::gmail(&settings, client);

    let addr = std::env::var("MAILBOXD_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Token file: {}", settings.token_file.display());
    info!("Batch file: {}", settings.batch_file.display());
    info!("Listening on http://{}", addr);

    let app = routes::router(AppState::new(service, settings.fetch_limit));
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
