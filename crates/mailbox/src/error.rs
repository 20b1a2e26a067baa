//! Error taxonomy for mailbox operations

/// Result type alias for mailbox operations
pub type Result<T> = std::result::Result<T, MailboxError>;

/// Errors surfaced by the mailbox core.
///
/// Each variant wraps the underlying cause; its context chain names the stage
/// that failed. Display renders the full chain.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    /// A credential failed the identity check against the provider
    #[error("Credential validation failed: {0:#}")]
    Validation(anyhow::Error),

    /// The authorization flow failed or was rejected
    #[error("Authentication failed: {0:#}")]
    Auth(anyhow::Error),

    /// Listing or retrieving a message failed
    #[error("Failed to fetch emails: {0:#}")]
    Fetch(anyhow::Error),

    /// Token or batch file could not be read or written
    #[error("Storage error: {0:#}")]
    Storage(anyhow::Error),
}

impl MailboxError {
    /// Whether this failure should be reported to a client as access denied
    /// rather than as a server fault
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Auth(_))
    }
}
