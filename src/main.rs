use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;

use tandem_client::auth::{CredentialBundle, Session, SqliteCredentialStore, TokenManager};
use tandem_client::client::ApiClient;
use tandem_client::config::{Command, Config};
use tandem_client::endpoint::HttpMethod;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!("API base URL: {}", config.base_url);

    let store = Arc::new(
        SqliteCredentialStore::open(&config.db_file, &config.store_key)
            .context("Failed to open credential store")?,
    );
    let session = Session::new(Arc::new(TokenManager::new()), store);

    // Startup load: the in-memory copy is authoritative from here on
    if let Err(e) = session.restore().await {
        tracing::error!(status = e.status(), "Failed to restore session: {}", e);
        tracing::warn!("Continuing without a stored session");
    }

    match command {
        Command::Status => print_status(&session).await,

        Command::SignIn {
            access_token,
            refresh_token,
            expires_in,
        } => {
            let expires_at = Duration::try_seconds(expires_in)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                .context("expires-in is out of range")?;
            let bundle = CredentialBundle::new(access_token, refresh_token, expires_at);
            session.sign_in(bundle).await.context("Sign-in failed")?;
            println!("Signed in.");
            Ok(())
        }

        Command::SignOut => {
            session.sign_out().await.context("Sign-out failed")?;
            println!("Signed out.");
            Ok(())
        }

        Command::Get { path, public } => {
            let client = ApiClient::new(&config.client_settings(), session.clone())?;
            let target = client
                .endpoint(HttpMethod::Get, path)
                .requires_auth(!public)
                .feature("cli.get");

            match client.request::<serde_json::Value>(target).await {
                Ok(body) => {
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    Ok(())
                }
                Err(e) if e.is_authorization() => {
                    // Unrecovered 401: the stored session is no longer usable
                    tracing::warn!("Authorization failed after refresh, clearing session");
                    if let Err(store_err) = session.sign_out().await {
                        tracing::error!(status = store_err.status(), "Failed to clear session: {}", store_err);
                    }
                    anyhow::bail!("{} ({})", e.user_message(), e)
                }
                Err(e) => anyhow::bail!("{} ({})", e.user_message(), e),
            }
        }
    }
}

async fn print_status(session: &Session) -> Result<()> {
    match session.tokens().current_token().await {
        Some(bundle) => {
            let state = if session.tokens().is_expired().await {
                "expired"
            } else {
                "valid"
            };
            println!(
                "Signed in (access token {}, expires {}, token: {}...)",
                state,
                bundle.expires_at.to_rfc3339(),
                bundle.access_token.chars().take(8).collect::<String>()
            );
        }
        None => println!("Not signed in."),
    }
    Ok(())
}
