//! Mailbox crate - OAuth-authenticated Gmail export
//!
//! This crate provides:
//! - OAuth2 credential lifecycle (authorize, refresh, validate, clear)
//! - Credential storage over ordered sources (session, token file)
//! - Gmail API client and payload decoding
//! - Batch fetching of recent messages into JSON
//!
//! Every operation takes an explicit [`MailboxContext`]; the crate holds no
//! process-wide state.

pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod fetch;
pub mod gmail;
pub mod models;
pub mod service;
pub mod session;
pub mod storage;

pub use config::{DEFAULT_SCOPE, GmailCredentials, MailboxSettings, Provisioner};
pub use context::{AuthState, MailboxContext, Session};
pub use credentials::{
    CredentialSource, CredentialStore, SESSION_CREDENTIAL_KEY, SessionSource, TokenFileSource,
    validate,
};
pub use error::{MailboxError, Result};
pub use fetch::{BatchPolicy, FetchBatch, FetchFailure, FetchOptions, MessageFetcher};
pub use gmail::{AuthorizationFlow, GmailAuth, GmailClient, MailApi};
pub use models::{AttachmentRef, Credential, EmailRecord};
pub use service::MailboxService;
pub use session::AuthSessionManager;
pub use storage::BatchFile;
