//! Session credentials for the Resident Feedback API. `CredentialStore` is the
//! single source of truth for the token pair and the cached identity, and the
//! only component that writes them to the secure store.
//!
//! Every mutation happens inside one critical section that covers both memory
//! and persistence, so readers never observe a mixed old/new pair. Each
//! mutation that starts a new session generation bumps the epoch; a refresh
//! that started under an older epoch is discarded instead of resurrecting a
//! cleared session.

pub mod storage;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

pub use storage::{FileStore, MemoryStore, SecretStore, StoreError};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const SAVED_EMAIL_KEY: &str = "savedEmail";
pub const SAVED_PASSWORD_KEY: &str = "savedPassword";

/// The authenticated user's profile, as returned by `auth/me`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub role: String,
}

/// Access and refresh token, always stored and cleared together.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
        }
    }
}

/// Credentials remembered for a later sign-in.
#[derive(Clone, Debug)]
pub struct SavedLogin {
    pub email: String,
    pub password: SecretString,
}

/// Snapshot taken when a refresh starts.
#[derive(Clone, Debug)]
pub struct RefreshTicket {
    pub refresh_token: SecretString,
    pub epoch: u64,
}

#[derive(Default)]
struct Credentials {
    tokens: Option<TokenPair>,
    identity: Option<Identity>,
    epoch: u64,
}

pub struct CredentialStore {
    state: Mutex<Credentials>,
    backend: Arc<dyn SecretStore>,
}

impl CredentialStore {
    /// Empty store over `backend`, ignoring anything already persisted.
    #[must_use]
    pub fn new(backend: Arc<dyn SecretStore>) -> Self {
        Self {
            state: Mutex::new(Credentials::default()),
            backend,
        }
    }

    /// Hydrates the token pair from `backend`. A half pair is treated as no
    /// session and the stray key is removed.
    /// # Errors
    /// Returns an error if the backend cannot be read or cleaned up.
    pub fn open(backend: Arc<dyn SecretStore>) -> Result<Self, StoreError> {
        let access = backend.get(ACCESS_TOKEN_KEY)?;
        let refresh = backend.get(REFRESH_TOKEN_KEY)?;

        let tokens = match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => Some(TokenPair {
                access_token,
                refresh_token,
            }),
            (None, None) => None,
            _ => {
                warn!("discarding incomplete token pair from secure store");
                backend.remove_all(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])?;
                None
            }
        };

        debug!("credential store opened, session present: {}", tokens.is_some());

        Ok(Self {
            state: Mutex::new(Credentials {
                tokens,
                ..Credentials::default()
            }),
            backend,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Credentials> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.lock()
            .tokens
            .as_ref()
            .map(|pair| pair.access_token.clone())
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.lock()
            .tokens
            .as_ref()
            .map(|pair| pair.refresh_token.clone())
    }

    #[must_use]
    pub fn tokens(&self) -> Option<TokenPair> {
        self.lock().tokens.clone()
    }

    /// True when an access token is present. The token may still be expired.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock().tokens.is_some()
    }

    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Replaces both tokens in memory and in the secure store.
    /// # Errors
    /// Returns an error if the pair cannot be persisted; memory is left unchanged.
    pub fn set_tokens(&self, pair: TokenPair) -> Result<(), StoreError> {
        let mut state = self.lock();
        self.persist(&pair)?;
        state.tokens = Some(pair);
        state.epoch += 1;
        Ok(())
    }

    /// Commits a freshly authenticated pair together with its identity.
    /// # Errors
    /// Returns an error if the pair cannot be persisted; memory is left unchanged.
    pub fn set_session(&self, pair: TokenPair, identity: Identity) -> Result<(), StoreError> {
        let mut state = self.lock();
        self.persist(&pair)?;
        state.tokens = Some(pair);
        state.identity = Some(identity);
        state.epoch += 1;
        Ok(())
    }

    /// Stores `identity` unless the session it was fetched for has ended.
    /// Returns whether it was stored.
    pub fn set_identity(&self, identity: Identity, epoch: u64) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch || state.tokens.is_none() {
            return false;
        }
        state.identity = Some(identity);
        true
    }

    /// Snapshot of the refresh token and the epoch it belongs to.
    #[must_use]
    pub fn refresh_ticket(&self) -> Option<RefreshTicket> {
        let state = self.lock();
        state.tokens.as_ref().map(|pair| RefreshTicket {
            refresh_token: pair.refresh_token.clone(),
            epoch: state.epoch,
        })
    }

    /// Applies a refresh result if the session is still the one the refresh
    /// started from. A refresh token of `None` keeps the current one.
    /// Returns whether the result was applied.
    /// # Errors
    /// Returns an error if the new pair cannot be persisted.
    pub fn apply_refresh(
        &self,
        ticket: &RefreshTicket,
        access_token: SecretString,
        refresh_token: Option<SecretString>,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();

        let Some(current) = state.tokens.as_ref() else {
            return Ok(false);
        };
        if state.epoch != ticket.epoch
            || current.refresh_token.expose_secret() != ticket.refresh_token.expose_secret()
        {
            return Ok(false);
        }

        let pair = TokenPair {
            access_token,
            refresh_token: refresh_token.unwrap_or_else(|| current.refresh_token.clone()),
        };
        self.persist(&pair)?;
        state.tokens = Some(pair);
        Ok(true)
    }

    /// Removes tokens and identity from memory and the secure store. Idempotent.
    /// Memory is cleared even when the secure store fails.
    /// # Errors
    /// Returns an error if the persisted tokens cannot be removed.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.tokens = None;
        state.identity = None;
        state.epoch += 1;
        self.backend
            .remove_all(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
    }

    /// # Errors
    /// Returns an error if the credentials cannot be persisted.
    pub fn remember_login(&self, email: &str, password: &SecretString) -> Result<(), StoreError> {
        let email = SecretString::from(email.to_string());
        self.backend
            .set_all(&[(SAVED_EMAIL_KEY, &email), (SAVED_PASSWORD_KEY, password)])
    }

    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub fn saved_login(&self) -> Result<Option<SavedLogin>, StoreError> {
        let email = self.backend.get(SAVED_EMAIL_KEY)?;
        let password = self.backend.get(SAVED_PASSWORD_KEY)?;

        Ok(match (email, password) {
            (Some(email), Some(password)) => Some(SavedLogin {
                email: email.expose_secret().to_string(),
                password,
            }),
            _ => None,
        })
    }

    /// # Errors
    /// Returns an error if the credentials cannot be removed.
    pub fn forget_login(&self) -> Result<(), StoreError> {
        self.backend
            .remove_all(&[SAVED_EMAIL_KEY, SAVED_PASSWORD_KEY])
    }

    fn persist(&self, pair: &TokenPair) -> Result<(), StoreError> {
        self.backend.set_all(&[
            (ACCESS_TOKEN_KEY, &pair.access_token),
            (REFRESH_TOKEN_KEY, &pair.refresh_token),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use std::thread;

    fn store() -> (Arc<MemoryStore>, CredentialStore) {
        let backend = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(backend.clone());
        (backend, store)
    }

    fn exposed(secret: Option<SecretString>) -> Option<String> {
        secret.map(|value| value.expose_secret().to_string())
    }

    fn identity() -> Identity {
        Identity {
            id: "1".to_string(),
            email: "u@x.com".to_string(),
            display_name: "U".to_string(),
            role: "surgeon".to_string(),
        }
    }

    #[test]
    fn set_tokens_overwrites_pair() -> Result<()> {
        let (backend, store) = store();
        store.set_tokens(TokenPair::new("a1", "r1"))?;
        store.set_tokens(TokenPair::new("a2", "r2"))?;

        assert_eq!(exposed(store.access_token()), Some("a2".to_string()));
        assert_eq!(exposed(store.refresh_token()), Some("r2".to_string()));
        assert_eq!(
            exposed(backend.get(ACCESS_TOKEN_KEY)?),
            Some("a2".to_string())
        );
        assert_eq!(
            exposed(backend.get(REFRESH_TOKEN_KEY)?),
            Some("r2".to_string())
        );
        Ok(())
    }

    #[test]
    fn concurrent_readers_never_see_mixed_pair() -> Result<()> {
        let (_, store) = store();
        let store = Arc::new(store);
        store.set_tokens(TokenPair::new("a0", "r0"))?;

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || -> Result<(), StoreError> {
                for n in 1..200 {
                    store.set_tokens(TokenPair::new(format!("a{n}"), format!("r{n}")))?;
                }
                Ok(())
            })
        };

        for _ in 0..500 {
            let pair = store.tokens().ok_or_else(|| anyhow!("pair missing"))?;
            let access = pair.access_token.expose_secret().trim_start_matches('a').to_string();
            let refresh = pair.refresh_token.expose_secret().trim_start_matches('r').to_string();
            assert_eq!(access, refresh);
        }

        writer
            .join()
            .map_err(|_| anyhow!("writer panicked"))??;
        Ok(())
    }

    #[test]
    fn clear_is_idempotent_and_wipes_backend() -> Result<()> {
        let (backend, store) = store();
        store.set_session(TokenPair::new("a1", "r1"), identity())?;

        store.clear()?;
        store.clear()?;

        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.identity().is_none());
        assert!(!store.is_authenticated());
        assert!(!backend.contains(ACCESS_TOKEN_KEY));
        assert!(!backend.contains(REFRESH_TOKEN_KEY));
        Ok(())
    }

    #[test]
    fn open_hydrates_persisted_pair() -> Result<()> {
        let backend = Arc::new(MemoryStore::new());
        CredentialStore::new(backend.clone()).set_tokens(TokenPair::new("a1", "r1"))?;

        let reopened = CredentialStore::open(backend)?;
        assert!(reopened.is_authenticated());
        assert_eq!(exposed(reopened.refresh_token()), Some("r1".to_string()));
        assert!(reopened.identity().is_none());
        Ok(())
    }

    #[test]
    fn open_discards_half_pair() -> Result<()> {
        let backend = Arc::new(MemoryStore::new());
        backend.set(ACCESS_TOKEN_KEY, &SecretString::from("a1".to_string()))?;

        let store = CredentialStore::open(backend.clone())?;
        assert!(!store.is_authenticated());
        assert!(!backend.contains(ACCESS_TOKEN_KEY));
        Ok(())
    }

    #[test]
    fn apply_refresh_keeps_refresh_token_when_not_rotated() -> Result<()> {
        let (_, store) = store();
        store.set_tokens(TokenPair::new("a1", "r1"))?;
        let ticket = store.refresh_ticket().ok_or_else(|| anyhow!("no ticket"))?;

        let applied = store.apply_refresh(&ticket, SecretString::from("a2".to_string()), None)?;

        assert!(applied);
        assert_eq!(exposed(store.access_token()), Some("a2".to_string()));
        assert_eq!(exposed(store.refresh_token()), Some("r1".to_string()));
        Ok(())
    }

    #[test]
    fn apply_refresh_after_clear_is_discarded() -> Result<()> {
        let (backend, store) = store();
        store.set_tokens(TokenPair::new("a1", "r1"))?;
        let ticket = store.refresh_ticket().ok_or_else(|| anyhow!("no ticket"))?;

        store.clear()?;
        let applied = store.apply_refresh(
            &ticket,
            SecretString::from("a2".to_string()),
            Some(SecretString::from("r2".to_string())),
        )?;

        assert!(!applied);
        assert!(store.access_token().is_none());
        assert!(!backend.contains(ACCESS_TOKEN_KEY));
        Ok(())
    }

    #[test]
    fn apply_refresh_after_new_login_is_discarded() -> Result<()> {
        let (_, store) = store();
        store.set_tokens(TokenPair::new("a1", "r1"))?;
        let ticket = store.refresh_ticket().ok_or_else(|| anyhow!("no ticket"))?;

        store.set_tokens(TokenPair::new("b1", "s1"))?;
        let applied = store.apply_refresh(&ticket, SecretString::from("a2".to_string()), None)?;

        assert!(!applied);
        assert_eq!(exposed(store.access_token()), Some("b1".to_string()));
        Ok(())
    }

    #[test]
    fn set_identity_ignored_for_ended_session() -> Result<()> {
        let (_, store) = store();
        store.set_tokens(TokenPair::new("a1", "r1"))?;
        let epoch = store.epoch();
        store.clear()?;

        assert!(!store.set_identity(identity(), epoch));
        assert!(store.identity().is_none());
        Ok(())
    }

    #[test]
    fn remembered_login_round_trip() -> Result<()> {
        let (_, store) = store();
        assert!(store.saved_login()?.is_none());

        store.remember_login("u@x.com", &SecretString::from("pw".to_string()))?;
        let saved = store.saved_login()?.ok_or_else(|| anyhow!("nothing saved"))?;
        assert_eq!(saved.email, "u@x.com");
        assert_eq!(saved.password.expose_secret(), "pw");

        store.clear()?;
        assert!(store.saved_login()?.is_some());

        store.forget_login()?;
        assert!(store.saved_login()?.is_none());
        Ok(())
    }
}
