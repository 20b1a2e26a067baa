//! Fetched-batch persistence
//!
//! A batch is one pretty-printed JSON array of [`EmailRecord`], replaced
//! wholesale on every successful fetch.

use anyhow::Context;
use log::debug;
use std::path::{Path, PathBuf};

use crate::error::{MailboxError, Result};
use crate::models::EmailRecord;

/// JSON file holding the most recent batch
#[derive(Debug, Clone)]
pub struct BatchFile {
    path: PathBuf,
}

impl BatchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the file with `emails`
    pub fn save(&self, emails: &[EmailRecord]) -> Result<()> {
        config::save_json_file(&self.path, &emails)
            .context("Failed to write email batch")
            .map_err(MailboxError::Storage)?;
        debug!("Wrote {} emails to {}", emails.len(), self.path.display());
        Ok(())
    }

    /// Read the last batch back; `None` if nothing was ever written
    pub fn load(&self) -> Result<Option<Vec<EmailRecord>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        config::load_json_file(&self.path)
            .context("Failed to read email batch")
            .map(Some)
            .map_err(MailboxError::Storage)
    }
}
