//! MailboxService: the composition root
//!
//! Wires the credential store, auth session manager and message fetcher
//! together behind the three caller-facing operations.

use log::info;
use std::sync::Arc;

use crate::config::{GmailCredentials, MailboxSettings};
use crate::context::MailboxContext;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::fetch::{FetchBatch, FetchOptions, MessageFetcher};
use crate::gmail::{AuthorizationFlow, GmailAuth, GmailClient, MailApi};
use crate::models::Credential;
use crate::session::AuthSessionManager;
use crate::storage::BatchFile;

/// Main service object for mailbox operations
pub struct MailboxService {
    sessions: AuthSessionManager,
    fetcher: MessageFetcher,
}

impl MailboxService {
    /// Build a service from explicit parts
    pub fn new(
        store: CredentialStore,
        flow: Arc<dyn AuthorizationFlow>,
        api: Arc<dyn MailApi>,
        batch_file: BatchFile,
        options: FetchOptions,
    ) -> Self {
        Self {
            sessions: AuthSessionManager::new(store, flow, Arc::clone(&api)),
            fetcher: MessageFetcher::new(api, batch_file, options),
        }
    }

    /// Build a service talking to Gmail
    pub fn gmail(settings: &MailboxSettings, client: GmailCredentials) -> Self {
        Self::new(
            CredentialStore::with_token_file(&settings.token_file),
            Arc::new(GmailAuth::new(client, settings.scopes.clone())),
            Arc::new(GmailClient::new()),
            BatchFile::new(&settings.batch_file),
            settings.fetch,
        )
    }

    pub fn batch_file(&self) -> &BatchFile {
        self.fetcher.batch_file()
    }

    /// Obtain a validated credential for the context
    pub fn authenticate(&self, ctx: &mut MailboxContext, force_new: bool) -> Result<Credential> {
        self.sessions.authenticate(ctx, force_new)
    }

    /// Return the validated mailbox address for the context
    pub fn get_user_email(&self, ctx: &mut MailboxContext) -> Result<String> {
        self.sessions.get_user_email(ctx)
    }

    /// Fetch up to `limit` recent emails and persist them as the current batch
    pub fn fetch_emails(&self, ctx: &mut MailboxContext, limit: usize) -> Result<FetchBatch> {
        let credential = match ctx.credential() {
            Some(credential) if !credential.is_expired() => credential.clone(),
            _ => self.sessions.authenticate(ctx, false)?,
        };
        self.fetcher.fetch_messages(&credential, limit)
    }

    /// Drop stored credentials for the context; idempotent
    pub fn clear_session(&self, ctx: &mut MailboxContext) -> Result<()> {
        self.sessions.clear(ctx)?;
        info!("Session cleared");
        Ok(())
    }
}
