//! Gmail OAuth2 authentication
//!
//! Implements OAuth2 authorization code flow for Gmail API authentication.
//! Uses a local HTTP server to receive the OAuth callback.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use super::AuthorizationFlow;
use crate::config::GmailCredentials;
use crate::models::Credential;

/// OAuth2 client for Google's authorization-code flow
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    /// Space-separated granted scopes
    scope: Option<String>,
    #[allow(dead_code)]
    token_type: String,
}

impl GmailAuth {
    /// Gmail API OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Port range to try for local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// How long the user has to finish consent in the browser
    const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

    /// Lifetime assumed when the provider omits `expires_in`
    const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

    /// Create a new GmailAuth instance
    ///
    /// # Arguments
    /// * `credentials` - OAuth2 client ID and secret
    /// * `scopes` - Scopes requested during consent
    pub fn new(credentials: GmailCredentials, scopes: Vec<String>) -> Self {
        Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            scopes,
        }
    }

    /// Build the consent URL the user is sent to
    fn authorization_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.scopes.join(" ")),
        )
    }

    /// Start a local TCP server on an available port
    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for OAuth callback and extract authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let mut stream = accept_before(&listener, Instant::now() + Self::CALLBACK_TIMEOUT)?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        // Format: GET /?code=AUTH_CODE&scope=... HTTP/1.1
        let outcome = parse_callback(&request_line);

        let (status, body) = if outcome.is_ok() {
            ("200 OK", "Authentication successful! You can close this window.")
        } else {
            ("400 Bad Request", "Authentication failed. Please try again.")
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        outcome
    }

    /// Exchange an authorization code for tokens
    fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .context("Failed to exchange authorization code")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")
    }

    /// Turn a token response into a credential
    fn credential_from(&self, token: TokenResponse) -> Credential {
        let scopes: Vec<String> = match token.scope {
            Some(granted) => granted.split_whitespace().map(str::to_string).collect(),
            None => self.scopes.clone(),
        };

        Credential::new(
            token.access_token,
            token.refresh_token,
            scopes,
            token.expires_in.unwrap_or(Self::DEFAULT_EXPIRES_IN_SECS),
        )
    }
}

impl AuthorizationFlow for GmailAuth {
    fn authorize(&self) -> Result<Credential> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);
        let auth_url = self.authorization_url(&redirect_uri);

        info!("Opening browser for Gmail consent");
        info!("If the browser doesn't open, visit: {}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            warn!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        info!("Waiting for authorization callback on port {}", port);
        let code = self.wait_for_callback(listener)?;

        info!("Exchanging authorization code for tokens");
        let token = self.exchange_code(&code, &redirect_uri)?;
        Ok(self.credential_from(token))
    }

    fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .context("Credential has no refresh token")?;

        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Preserve the refresh token if not returned
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        let mut refreshed = self.credential_from(token);
        refreshed.mailbox_identity = credential.mailbox_identity.clone();
        Ok(refreshed)
    }
}

/// Accept one connection, giving up once `deadline` passes
fn accept_before(listener: &TcpListener, deadline: Instant) -> Result<TcpStream> {
    listener
        .set_nonblocking(true)
        .context("Failed to configure callback listener")?;

    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream
                    .set_nonblocking(false)
                    .context("Failed to configure callback connection")?;
                return Ok(stream);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    anyhow::bail!("Timed out waiting for the authorization callback");
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(e).context("Failed to accept connection"),
        }
    }
}

/// Extract the authorization code from the callback's request line
fn parse_callback(request_line: &str) -> Result<String> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .context("Malformed callback request")?;
    let url = url::Url::parse("http://localhost")?
        .join(target)
        .context("Malformed callback path")?;

    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => anyhow::bail!("OAuth error: {}", value),
            "code" => code = Some(value.into_owned()),
            _ => {}
        }
    }

    code.context("No authorization code received")
}
