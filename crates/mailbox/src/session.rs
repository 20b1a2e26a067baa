//! Auth session management
//!
//! Drives a context through `NoCredential -> Validating -> Authenticated`.
//! A stored credential is never trusted until the provider confirms it;
//! when confirmation fails the context drops back to `NoCredential` and a
//! fresh authorization is run.

use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;

use crate::context::MailboxContext;
use crate::credentials::{CredentialStore, validate};
use crate::error::{MailboxError, Result};
use crate::gmail::{AuthorizationFlow, MailApi};
use crate::models::Credential;

/// Produces validated credentials for a context
pub struct AuthSessionManager {
    store: CredentialStore,
    flow: Arc<dyn AuthorizationFlow>,
    api: Arc<dyn MailApi>,
}

impl AuthSessionManager {
    pub fn new(
        store: CredentialStore,
        flow: Arc<dyn AuthorizationFlow>,
        api: Arc<dyn MailApi>,
    ) -> Self {
        Self { store, flow, api }
    }

    /// Obtain a validated credential for the context.
    ///
    /// With `force_new`, stored credentials are cleared first. Otherwise a
    /// stored credential is refreshed if stale, then validated; failure falls
    /// through to a fresh authorization. A failed fresh authorization is
    /// returned as [`MailboxError::Auth`] and not retried.
    pub fn authenticate(&self, ctx: &mut MailboxContext, force_new: bool) -> Result<Credential> {
        if force_new {
            info!("Forcing re-authentication");
            self.clear(ctx)?;
        } else if let Some(stored) = self.store.load(&ctx.session)? {
            ctx.begin_validation();
            match self.revalidate(stored) {
                Ok(credential) => {
                    self.store.save(&mut ctx.session, &credential)?;
                    info!(
                        "Authenticated from stored credential ({})",
                        credential.mailbox_identity.as_deref().unwrap_or_default()
                    );
                    ctx.authenticated(credential.clone());
                    return Ok(credential);
                }
                Err(e) => {
                    warn!("Stored credential rejected, re-authorizing: {}", e);
                    ctx.reset();
                }
            }
        }

        let fresh = self
            .flow
            .authorize()
            .context("Authorization flow failed")
            .map_err(MailboxError::Auth)?;

        ctx.begin_validation();
        let credential = match validate(self.api.as_ref(), fresh) {
            Ok(credential) => credential,
            Err(e) => {
                ctx.reset();
                return Err(MailboxError::Auth(
                    anyhow::Error::new(e).context("New credential failed validation"),
                ));
            }
        };

        self.store.save(&mut ctx.session, &credential)?;
        info!(
            "Authenticated {}",
            credential.mailbox_identity.as_deref().unwrap_or_default()
        );
        ctx.authenticated(credential.clone());
        Ok(credential)
    }

    /// Return the validated mailbox address for the context.
    ///
    /// Forces a fresh login only when nothing is loadable from storage.
    pub fn get_user_email(&self, ctx: &mut MailboxContext) -> Result<String> {
        let force_new = !matches!(self.store.load(&ctx.session), Ok(Some(_)));
        let credential = self.authenticate(ctx, force_new)?;

        credential.mailbox_identity.ok_or_else(|| {
            MailboxError::Validation(anyhow::anyhow!(
                "Validated credential has no mailbox identity"
            ))
        })
    }

    /// Drop every stored credential and reset the context
    pub fn clear(&self, ctx: &mut MailboxContext) -> Result<()> {
        self.store.clear(&mut ctx.session)?;
        ctx.reset();
        Ok(())
    }

    /// Refresh a stale credential, then confirm it with the provider
    fn revalidate(&self, stored: Credential) -> Result<Credential> {
        let candidate = if stored.is_expired() && stored.refresh_token.is_some() {
            info!("Refreshing expired access token");
            self.flow
                .refresh(&stored)
                .map_err(MailboxError::Validation)?
        } else {
            stored
        };

        validate(self.api.as_ref(), candidate)
    }
}
