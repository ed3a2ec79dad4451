//! Access-token cache.
//!
//! KIS tokens last 24 hours; re-issuing one invalidates the previous token
//! account-wide, so the client reuses a cached token whenever it has enough
//! life left. The store is an injected capability: the client never touches
//! the filesystem directly.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Minimum remaining validity for a cached token to be reused.
/// Guards against the token expiring while a request is in flight.
const REUSE_BUFFER_SECS: i64 = 60;

/// A bearer token with its absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token is still safely usable at `now`.
    pub fn usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::seconds(REUSE_BUFFER_SECS)
    }
}

/// Key-value storage for access tokens, scoped by credential identity.
pub trait TokenStore {
    /// Load the token stored for `key`, if any. A corrupt or unreadable
    /// record reads as absent, never as an error.
    fn load(&self, key: &str) -> Option<AccessToken>;

    /// Persist `token` under `key`, replacing any previous record.
    fn store(&self, key: &str, token: &AccessToken) -> std::io::Result<()>;
}

/// File-backed token store: one JSON file per credential key under a cache
/// directory.
///
/// Known limitation: concurrent processes sharing one credential race on
/// the read-modify-write of the cache file. Acceptable for a
/// single-operator batch tool.
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache file for a credential key. Only a stable prefix of the key
    /// material is used in the file name, so distinct credentials never
    /// collide while the full key stays off disk.
    fn path_for(&self, key: &str) -> PathBuf {
        let prefix: String = key.chars().take(8).collect();
        self.dir.join(format!("token-{prefix}.json"))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, key: &str) -> Option<AccessToken> {
        let path = self.path_for(key);
        let contents = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<AccessToken>(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("ignoring corrupt token cache {}: {e}", path.display());
                None
            }
        }
    }

    fn store(&self, key: &str, token: &AccessToken) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let json = serde_json::to_string(token)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, json)?;
        debug!("cached token to {}", path.display());
        Ok(())
    }
}

/// In-memory store for tests and one-shot runs that must not touch disk.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: std::cell::RefCell<std::collections::HashMap<String, AccessToken>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, key: &str) -> Option<AccessToken> {
        self.tokens.borrow().get(key).cloned()
    }

    fn store(&self, key: &str, token: &AccessToken) -> std::io::Result<()> {
        self.tokens
            .borrow_mut()
            .insert(key.to_string(), token.clone());
        Ok(())
    }
}
