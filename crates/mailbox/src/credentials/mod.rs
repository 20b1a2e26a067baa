//! Credential storage
//!
//! Credentials live in an ordered list of sources queried in priority
//! order; the first source holding a credential is authoritative. The
//! default order is the caller's session, then the on-disk token file.

mod session;
mod token_file;

pub use session::{SESSION_CREDENTIAL_KEY, SessionSource};
pub use token_file::TokenFileSource;

use anyhow::Context;
use log::{debug, info};
use std::path::PathBuf;

use crate::context::Session;
use crate::error::{MailboxError, Result};
use crate::gmail::MailApi;
use crate::models::Credential;

/// A place credentials can be persisted
pub trait CredentialSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Read the stored credential, if any
    fn load(&self, session: &Session) -> anyhow::Result<Option<Credential>>;

    /// Replace the stored credential
    fn save(&self, session: &mut Session, credential: &Credential) -> anyhow::Result<()>;

    /// Remove the stored credential; absence is not an error
    fn clear(&self, session: &mut Session) -> anyhow::Result<()>;
}

/// Ordered set of credential sources
pub struct CredentialStore {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialStore {
    /// Create a store over sources in priority order
    pub fn new(sources: Vec<Box<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// Session first, then the token file at `token_path`
    pub fn with_token_file(token_path: impl Into<PathBuf>) -> Self {
        Self::new(vec![
            Box::new(SessionSource),
            Box::new(TokenFileSource::new(token_path)),
        ])
    }

    /// Load the credential from the highest-priority source holding one
    pub fn load(&self, session: &Session) -> Result<Option<Credential>> {
        for source in &self.sources {
            let loaded = source
                .load(session)
                .with_context(|| format!("Failed to load credential from {}", source.name()))
                .map_err(MailboxError::Storage)?;

            if let Some(credential) = loaded {
                debug!("Loaded credential from {}", source.name());
                return Ok(Some(credential));
            }
        }
        debug!("No stored credential found");
        Ok(None)
    }

    /// Persist the credential to every source
    pub fn save(&self, session: &mut Session, credential: &Credential) -> Result<()> {
        for source in &self.sources {
            source
                .save(session, credential)
                .with_context(|| format!("Failed to save credential to {}", source.name()))
                .map_err(MailboxError::Storage)?;
        }
        Ok(())
    }

    /// Remove the credential from every source
    pub fn clear(&self, session: &mut Session) -> Result<()> {
        for source in &self.sources {
            source
                .clear(session)
                .with_context(|| format!("Failed to clear credential from {}", source.name()))
                .map_err(MailboxError::Storage)?;
        }
        info!("Cleared stored credentials");
        Ok(())
    }
}

/// Confirm a credential against the provider and bind it to its mailbox.
///
/// This is the only place mailbox identity is established. Any failure,
/// whether network, rejection or a malformed response, is a validation error.
pub fn validate(api: &dyn MailApi, credential: Credential) -> Result<Credential> {
    let profile = api
        .get_profile(&credential)
        .map_err(MailboxError::Validation)?;

    let email = profile.email_address.trim();
    if email.is_empty() {
        return Err(MailboxError::Validation(anyhow::anyhow!(
            "Profile response has no email address"
        )));
    }

    debug!("Credential validated for {}", email);
    Ok(credential.with_identity(email))
}
