//! Credential source backed by the caller's session

use anyhow::{Context, Result};

use super::CredentialSource;
use crate::context::Session;
use crate::models::Credential;

/// Session key holding the serialized credential
pub const SESSION_CREDENTIAL_KEY: &str = "credentials";

/// Stores the credential as JSON under [`SESSION_CREDENTIAL_KEY`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionSource;

impl CredentialSource for SessionSource {
    fn name(&self) -> &'static str {
        "session"
    }

    fn load(&self, session: &Session) -> Result<Option<Credential>> {
        session
            .get(SESSION_CREDENTIAL_KEY)
            .map(|raw| serde_json::from_str(raw).context("Session credential is malformed"))
            .transpose()
    }

    fn save(&self, session: &mut Session, credential: &Credential) -> Result<()> {
        let raw = serde_json::to_string(credential)?;
        session.insert(SESSION_CREDENTIAL_KEY, raw);
        Ok(())
    }

    fn clear(&self, session: &mut Session) -> Result<()> {
        session.remove(SESSION_CREDENTIAL_KEY);
        Ok(())
    }
}
