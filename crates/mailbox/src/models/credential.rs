//! Credential model: the serializable bearer of mailbox access

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// OAuth token material for one mailbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scopes: BTreeSet<String>,
    /// When the access token stops being accepted
    pub expiry: DateTime<Utc>,
    /// Mailbox address, only trustworthy after validation
    pub mailbox_identity: Option<String>,
}

impl Credential {
    /// Seconds before expiry at which a token is treated as stale
    pub const EXPIRY_MARGIN_SECS: i64 = 300;

    /// Create a credential that expires `expires_in_secs` from now
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        scopes: impl IntoIterator<Item = String>,
        expires_in_secs: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            scopes: scopes.into_iter().collect(),
            expiry: Utc::now() + Duration::seconds(expires_in_secs),
            mailbox_identity: None,
        }
    }

    /// Whether the access token is expired or about to expire
    pub fn is_expired(&self) -> bool {
        self.expiry <= Utc::now() + Duration::seconds(Self::EXPIRY_MARGIN_SECS)
    }

    /// Bind the credential to a confirmed mailbox address
    pub fn with_identity(mut self, email: impl Into<String>) -> Self {
        self.mailbox_identity = Some(email.into());
        self
    }
}
