//! Credential source backed by a JSON token file

use anyhow::Result;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::CredentialSource;
use crate::context::Session;
use crate::models::Credential;

/// Persists the credential as a pretty-printed JSON file.
///
/// Reads and writes of the file are serialised, so callers on different
/// contexts never observe a half-written token.
#[derive(Debug)]
pub struct TokenFileSource {
    path: PathBuf,
    io: Mutex<()>,
}

impl TokenFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is (), so a poisoned lock is still usable
        self.io.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialSource for TokenFileSource {
    fn name(&self) -> &'static str {
        "token file"
    }

    fn load(&self, _session: &Session) -> Result<Option<Credential>> {
        let _io = self.lock();
        // Absence means never authenticated
        if !self.path.exists() {
            return Ok(None);
        }
        config::load_json_file(&self.path).map(Some)
    }

    fn save(&self, _session: &mut Session, credential: &Credential) -> Result<()> {
        let _io = self.lock();
        config::save_json_file(&self.path, credential)
    }

    fn clear(&self, _session: &mut Session) -> Result<()> {
        let _io = self.lock();
        if config::remove_file_if_exists(&self.path)? {
            info!("Removed token file {}", self.path.display());
        }
        Ok(())
    }
}
