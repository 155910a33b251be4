//! Location of the messaging client's persisted session
//!
//! The client writes its credentials under `<root>/session-<client id>`.
//! dragonpair never reads those files; it only creates the directory up front
//! and wipes it when a fresh pairing is forced.

use dragonpair_core::Config;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SessionResult;

/// Session directory handle
#[derive(Debug, Clone)]
pub struct SessionDir {
    path: PathBuf,
}

impl SessionDir {
    /// Use an explicit directory
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the directory from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.session_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a previous session left files behind
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Create the directory (and parents) if missing
    pub fn ensure(&self) -> SessionResult<()> {
        if !self.exists() {
            std::fs::create_dir_all(&self.path)?;
            debug!("Created session directory {:?}", self.path);
        }
        Ok(())
    }

    /// Remove the stored session so the next start issues a new pairing token
    pub fn clear(&self) -> SessionResult<()> {
        if self.exists() {
            std::fs::remove_dir_all(&self.path)?;
            info!("Cleared stored session at {:?}", self.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_and_clear() {
        let dir = tempdir().unwrap();
        let session = SessionDir::new(dir.path().join("auth").join("session-test"));
        assert!(!session.exists());

        session.ensure().unwrap();
        assert!(session.exists());

        // Files written by the client go away with the directory
        std::fs::write(session.path().join("creds.json"), "{}").unwrap();
        session.clear().unwrap();
        assert!(!session.exists());

        // Clearing twice is fine
        session.clear().unwrap();
    }

    #[test]
    fn test_ensure_keeps_existing_files() {
        let dir = tempdir().unwrap();
        let session = SessionDir::new(dir.path().join("session-keep"));
        session.ensure().unwrap();
        std::fs::write(session.path().join("Default"), "x").unwrap();

        session.ensure().unwrap();
        assert!(session.path().join("Default").exists());
    }

    #[test]
    fn test_from_config() {
        let dir = tempdir().unwrap();
        let config = Config::new()
            .with_session_root(dir.path())
            .with_client_id("dragons-md");
        let session = SessionDir::from_config(&config);
        assert_eq!(session.path(), dir.path().join("session-dragons-md"));
    }
}
