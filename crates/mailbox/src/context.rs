//! Per-caller context passed to every mailbox operation
//!
//! A context replaces process-wide service state: it owns the caller's
//! session values, the current auth state and the live credential.

use std::collections::HashMap;

use crate::models::Credential;

/// Auth state of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    NoCredential,
    Validating,
    Authenticated,
}

/// String key-value store scoped to one caller, like a web session
#[derive(Debug, Clone, Default)]
pub struct Session {
    values: HashMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// State carried by one caller across mailbox operations
#[derive(Debug, Default)]
pub struct MailboxContext {
    pub session: Session,
    state: AuthState,
    credential: Option<Credential>,
}

impl MailboxContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// True when the context holds nothing worth keeping between requests
    pub fn is_idle(&self) -> bool {
        self.state == AuthState::NoCredential && self.session.is_empty()
    }

    /// The validated credential, present only while authenticated
    pub fn credential(&self) -> Option<&Credential> {
        match self.state {
            AuthState::Authenticated => self.credential.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn begin_validation(&mut self) {
        self.state = AuthState::Validating;
        self.credential = None;
    }

    pub(crate) fn authenticated(&mut self, credential: Credential) {
        self.state = AuthState::Authenticated;
        self.credential = Some(credential);
    }

    pub(crate) fn reset(&mut self) {
        self.state = AuthState::NoCredential;
        self.credential = None;
    }
}
