//! Configuration loading for mailbox services
//!
//! OAuth client credentials are resolved (in order of priority) from:
//! 1. JSON client-secret file (Google Cloud Console format)
//! 2. Runtime environment variables
//! 3. A cloud provisioning collaborator, when one is supplied
//!
//! Runtime settings are read from environment variables.

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::fetch::{BatchPolicy, FetchOptions};

/// Read-only Gmail scope used when none is configured
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Boundary to a cloud platform that can create OAuth client material
/// (project lookup or creation, API enablement, OAuth client creation).
pub trait Provisioner: Send + Sync {
    fn provision(&self) -> Result<GmailCredentials>;
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Resolve client credentials from file, then environment, then provisioner
    pub fn resolve(path: &Path, provisioner: Option<&dyn Provisioner>) -> Result<Self> {
        Self::resolve_with(path, provisioner, |key| std::env::var(key).ok())
    }

    fn resolve_with<F>(
        path: &Path,
        provisioner: Option<&dyn Provisioner>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if path.exists() {
            info!("Loading OAuth client from {}", path.display());
            return Self::from_file(path);
        }

        if let Ok(creds) = Self::from_lookup(&lookup) {
            info!("Loading OAuth client from environment");
            return Ok(creds);
        }

        match provisioner {
            Some(provisioner) => {
                info!("Provisioning OAuth client");
                provisioner
                    .provision()
                    .context("Cloud provisioning did not yield client credentials")
            }
            None => anyhow::bail!(
                "No OAuth client configured: place a client secret at {} or set GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                path.display()
            ),
        }
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Parse credentials from a GoogleCredentialFile
    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Support both "installed" (desktop) and "web" credential types
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = lookup("GMAIL_CLIENT_ID").context("GMAIL_CLIENT_ID not set")?;
        let client_secret = lookup("GMAIL_CLIENT_SECRET").context("GMAIL_CLIENT_SECRET not set")?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

/// Runtime settings for the mailbox service
#[derive(Debug, Clone)]
pub struct MailboxSettings {
    pub scopes: Vec<String>,
    pub client_secret_file: PathBuf,
    pub token_file: PathBuf,
    pub batch_file: PathBuf,
    /// Fetch limit used when the caller doesn't give one
    pub fetch_limit: usize,
    pub fetch: FetchOptions,
}

impl MailboxSettings {
    const DEFAULT_FETCH_LIMIT: usize = 5;

    /// Build settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scopes = match lookup("GOOGLE_SCOPES") {
            Some(raw) => parse_scopes(&raw),
            None => vec![DEFAULT_SCOPE.to_string()],
        };

        let client_secret_file =
            path_or_config(lookup("MAILBOX_CLIENT_SECRET_FILE"), "credentials.json")?;
        let token_file = path_or_config(lookup("MAILBOX_TOKEN_FILE"), "token.json")?;
        let batch_file = lookup("MAILBOX_BATCH_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("emails.json"));

        let fetch_limit = match lookup("MAILBOX_FETCH_LIMIT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid MAILBOX_FETCH_LIMIT: {}", raw))?,
            None => Self::DEFAULT_FETCH_LIMIT,
        };

        let eager_attachment_fetch = match lookup("MAILBOX_EAGER_ATTACHMENTS") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("Invalid MAILBOX_EAGER_ATTACHMENTS: {}", raw))?,
            None => false,
        };

        let policy = match lookup("MAILBOX_BATCH_POLICY") {
            Some(raw) => raw.parse()?,
            None => BatchPolicy::default(),
        };

        Ok(Self {
            scopes: if scopes.is_empty() {
                vec![DEFAULT_SCOPE.to_string()]
            } else {
                scopes
            },
            client_secret_file,
            token_file,
            batch_file,
            fetch_limit,
            fetch: FetchOptions {
                eager_attachment_fetch,
                policy,
            },
        })
    }
}

/// Split a scope list on commas and whitespace
fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Use the given path, or a file in the mailbox config directory
fn path_or_config(value: Option<String>, filename: &str) -> Result<PathBuf> {
    match value {
        Some(path) => Ok(PathBuf::from(path)),
        None => config::config_path(filename).context("Could not determine config directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    struct FixedProvisioner;

    impl Provisioner for FixedProvisioner {
        fn provision(&self) -> Result<GmailCredentials> {
            Ok(GmailCredentials {
                client_id: "provisioned".to_string(),
                client_secret: "provisioned-secret".to_string(),
            })
        }
    }

    #[test]
    fn test_parse_installed_credentials() {
        let json = r#"{
            "installed": {
                "client_id": "test-client-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;

        let creds = GmailCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn test_parse_web_credentials() {
        let json = r#"{"web": {"client_id": "web-id", "client_secret": "web-secret"}}"#;
        let creds = GmailCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-id");
    }

    #[test]
    fn test_invalid_json() {
        assert!(GmailCredentials::from_json(r#"{ "other": {} }"#).is_err());
    }

    #[test]
    fn test_resolve_prefers_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"installed": {"client_id": "file", "client_secret": "s"}}"#)
            .unwrap();

        let env = lookup(&[("GMAIL_CLIENT_ID", "env"), ("GMAIL_CLIENT_SECRET", "s")]);
        let creds = GmailCredentials::resolve_with(&path, Some(&FixedProvisioner), env).unwrap();
        assert_eq!(creds.client_id, "file");
    }

    #[test]
    fn test_resolve_falls_back_to_env_then_provisioner() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");

        let env = lookup(&[("GMAIL_CLIENT_ID", "env"), ("GMAIL_CLIENT_SECRET", "s")]);
        let creds = GmailCredentials::resolve_with(&path, Some(&FixedProvisioner), env).unwrap();
        assert_eq!(creds.client_id, "env");

        let creds =
            GmailCredentials::resolve_with(&path, Some(&FixedProvisioner), lookup(&[])).unwrap();
        assert_eq!(creds.client_id, "provisioned");

        assert!(GmailCredentials::resolve_with(&path, None, lookup(&[])).is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = MailboxSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.scopes, vec![DEFAULT_SCOPE.to_string()]);
        assert_eq!(settings.batch_file, PathBuf::from("emails.json"));
        assert!(settings.token_file.ends_with("mailbox/token.json"));
        assert_eq!(settings.fetch_limit, 5);
        assert!(!settings.fetch.eager_attachment_fetch);
        assert_eq!(settings.fetch.policy, BatchPolicy::Strict);
    }

    #[test]
    fn test_settings_overrides() {
        let settings = MailboxSettings::from_lookup(lookup(&[
            ("GOOGLE_SCOPES", "scope-a, scope-b"),
            ("MAILBOX_TOKEN_FILE", "/tmp/t.json"),
            ("MAILBOX_BATCH_FILE", "/tmp/out.json"),
            ("MAILBOX_FETCH_LIMIT", "50"),
            ("MAILBOX_EAGER_ATTACHMENTS", "true"),
            ("MAILBOX_BATCH_POLICY", "lenient"),
        ]))
        .unwrap();

        assert_eq!(settings.scopes, vec!["scope-a", "scope-b"]);
        assert_eq!(settings.token_file, PathBuf::from("/tmp/t.json"));
        assert_eq!(settings.batch_file, PathBuf::from("/tmp/out.json"));
        assert_eq!(settings.fetch_limit, 50);
        assert!(settings.fetch.eager_attachment_fetch);
        assert_eq!(settings.fetch.policy, BatchPolicy::Lenient);
    }

    #[test]
    fn test_settings_reject_bad_values() {
        assert!(MailboxSettings::from_lookup(lookup(&[("MAILBOX_FETCH_LIMIT", "many")])).is_err());
        assert!(
            MailboxSettings::from_lookup(lookup(&[("MAILBOX_EAGER_ATTACHMENTS", "maybe")])).is_err()
        );
        assert!(MailboxSettings::from_lookup(lookup(&[("MAILBOX_BATCH_POLICY", "lax")])).is_err());
    }
}
