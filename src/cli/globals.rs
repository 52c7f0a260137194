use crate::{
    client::{AuthenticatedClient, ClientConfig},
    session::{CredentialStore, FileStore},
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc, time::Duration};

const DEFAULT_STORE_DIR: &str = ".resfeed";
const DEFAULT_STORE_FILE: &str = "session.json";

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub base_url: String,
    pub store_path: PathBuf,
    pub request_timeout: Duration,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(base_url: String, store_path: PathBuf) -> Self {
        Self {
            base_url,
            store_path,
            request_timeout: crate::client::config::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    /// Opens the session file and builds a client around it.
    /// # Errors
    /// Returns an error if the base URL is invalid or the session file is unreadable.
    pub fn client(&self) -> Result<AuthenticatedClient> {
        let config = ClientConfig::new(&self.base_url)
            .with_context(|| format!("invalid base URL: {}", self.base_url))?
            .with_request_timeout(self.request_timeout);

        let backend = Arc::new(FileStore::new(self.store_path.clone()));
        let credentials = CredentialStore::open(backend).with_context(|| {
            format!("failed to open session file {}", self.store_path.display())
        })?;

        Ok(AuthenticatedClient::new(&config, Arc::new(credentials))?)
    }
}

/// `$HOME/.resfeed/session.json`, or the working directory when `HOME` is unset.
#[must_use]
pub fn default_store_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(DEFAULT_STORE_DIR)
        .join(DEFAULT_STORE_FILE)
}
