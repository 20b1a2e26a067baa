//! Message fetching
//!
//! Lists recent message IDs, fetches each message in turn, decodes it
//! into an [`EmailRecord`] and writes the batch to disk.

use anyhow::{Context, Result as AnyResult};
use log::{debug, info, warn};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{MailboxError, Result};
use crate::gmail::api::GmailMessage;
use crate::gmail::{MailApi, decode_attachments, decode_body, extract_header};
use crate::models::{Credential, EmailRecord};
use crate::storage::BatchFile;

/// How a batch reacts to a single message failing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// The first failing message aborts the whole batch
    #[default]
    Strict,
    /// Failing messages are reported next to the successful ones
    Lenient,
}

impl FromStr for BatchPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> AnyResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => anyhow::bail!("Unknown batch policy: {}", other),
        }
    }
}

/// Options controlling a fetch
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Download attachment bytes instead of returning references only
    pub eager_attachment_fetch: bool,
    pub policy: BatchPolicy,
}

/// A message that could not be fetched or decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub id: String,
    pub reason: String,
}

/// Result of one fetch call
#[derive(Debug, Default)]
pub struct FetchBatch {
    /// Records in provider order
    pub emails: Vec<EmailRecord>,
    /// Always empty under [`BatchPolicy::Strict`]
    pub failures: Vec<FetchFailure>,
}

/// Fetches and persists batches of messages
pub struct MessageFetcher {
    api: Arc<dyn MailApi>,
    batch_file: BatchFile,
    options: FetchOptions,
}

impl MessageFetcher {
    pub fn new(api: Arc<dyn MailApi>, batch_file: BatchFile, options: FetchOptions) -> Self {
        Self {
            api,
            batch_file,
            options,
        }
    }

    pub fn batch_file(&self) -> &BatchFile {
        &self.batch_file
    }

    /// Fetch up to `limit` recent messages and overwrite the batch file.
    ///
    /// Messages are fetched one at a time in the order the provider lists
    /// them; nothing is re-sorted.
    pub fn fetch_messages(&self, credential: &Credential, limit: usize) -> Result<FetchBatch> {
        let listed = self
            .api
            .list_messages(credential, limit)
            .map_err(MailboxError::Fetch)?;

        let mut refs = listed.messages.unwrap_or_default();
        refs.truncate(limit);
        info!("Fetching {} messages", refs.len());

        let mut batch = FetchBatch::default();
        for msg_ref in &refs {
            match self.fetch_one(credential, &msg_ref.id) {
                Ok(record) => batch.emails.push(record),
                Err(e) => match self.options.policy {
                    BatchPolicy::Strict => {
                        return Err(MailboxError::Fetch(e.context("Batch aborted")));
                    }
                    BatchPolicy::Lenient => {
                        warn!("Skipping message {}: {:#}", msg_ref.id, e);
                        batch.failures.push(FetchFailure {
                            id: msg_ref.id.clone(),
                            reason: format!("{:#}", e),
                        });
                    }
                },
            }
        }

        self.batch_file.save(&batch.emails)?;
        info!(
            "Fetched {} messages ({} failed) into {}",
            batch.emails.len(),
            batch.failures.len(),
            self.batch_file.path().display()
        );
        Ok(batch)
    }

    /// Fetch and decode a single message
    fn fetch_one(&self, credential: &Credential, id: &str) -> AnyResult<EmailRecord> {
        debug!("Fetching message {}", id);
        let message = self.api.get_message(credential, id)?;
        let mut record = build_record(id, &message);

        if self.options.eager_attachment_fetch {
            for attachment in &mut record.attachments {
                if let Some(attachment_id) = &attachment.attachment_id {
                    let content = self
                        .api
                        .get_attachment(credential, id, attachment_id)
                        .with_context(|| format!("Failed to download {}", attachment.filename))?;
                    attachment.content = Some(content);
                }
            }
        }

        Ok(record)
    }
}

/// Assemble a record from a fetched message
fn build_record(id: &str, message: &GmailMessage) -> EmailRecord {
    let Some(payload) = &message.payload else {
        return EmailRecord {
            id: id.to_string(),
            subject: None,
            from: None,
            date: None,
            body: None,
            attachments: Vec::new(),
        };
    };

    EmailRecord {
        id: id.to_string(),
        subject: extract_header(payload, "Subject"),
        from: extract_header(payload, "From"),
        date: extract_header(payload, "Date"),
        body: decode_body(payload),
        attachments: decode_attachments(payload),
    }
}
