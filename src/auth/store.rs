//! File-backed persistence for the provider session and pending PKCE verifier.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::auth::AuthResult;
use crate::auth::types::Session;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoredState {
    #[serde(default)]
    session: Option<Session>,
    #[serde(default)]
    code_verifier: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_session(&self) -> AuthResult<Option<Session>> {
        Ok(self.read()?.session)
    }

    pub fn save_session(&self, session: &Session) -> AuthResult<()> {
        let mut state = self.read()?;
        state.session = Some(session.clone());
        self.write(&state)
    }

    pub fn clear_session(&self) -> AuthResult<()> {
        let mut state = self.read()?;
        if state.session.is_none() {
            return Ok(());
        }
        state.session = None;
        self.write(&state)
    }

    pub fn save_code_verifier(&self, verifier: &str) -> AuthResult<()> {
        let mut state = self.read()?;
        state.code_verifier = Some(verifier.to_string());
        self.write(&state)
    }

    /// Remove and return the pending verifier; a verifier is single use.
    pub fn take_code_verifier(&self) -> AuthResult<Option<String>> {
        let mut state = self.read()?;
        let verifier = state.code_verifier.take();
        if verifier.is_some() {
            self.write(&state)?;
        }
        Ok(verifier)
    }

    fn read(&self) -> AuthResult<StoredState> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(StoredState::default()),
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => Ok(state),
                Err(err) => {
                    log::warn!(
                        "discarding unreadable session file {}: {}",
                        self.path.display(),
                        err
                    );
                    Ok(StoredState::default())
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StoredState::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, state: &StoredState) -> AuthResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut file = NamedTempFile::new_in(&dir)?;
        file.write_all(&serde_json::to_vec_pretty(state)?)?;
        file.flush()?;
        file.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}
