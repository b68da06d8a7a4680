//! Typed view over a [`ResourceStore`] for the values the engine persists.
//!
//! Values are JSON documents under fixed keys. Persistence failures are logged
//! and swallowed: losing a bookmark must never stop narration.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use super::backend::ResourceStore;

pub const CREDENTIALS_KEY: &str = "narrator.credentials";
pub const POSITION_KEY: &str = "narrator.position";
pub const PREFERENCES_KEY: &str = "narrator.preferences";

/// Subscription key and the region it is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub speech_key: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Set once a user typed the region explicitly; suppresses auto-discovery.
    #[serde(default)]
    pub region_locked: bool,
    /// Unix milliseconds of the last update.
    #[serde(default)]
    pub updated_at: u64,
}

impl StoredCredentials {
    pub fn new(speech_key: impl Into<String>, region: Option<String>, region_locked: bool) -> Self {
        Self {
            speech_key: speech_key.into(),
            region,
            region_locked,
            updated_at: now_millis(),
        }
    }

    /// Whether these credentials belong to `speech_key` (whitespace-insensitive).
    pub fn matches_key(&self, speech_key: &str) -> bool {
        self.speech_key.trim() == speech_key.trim()
    }
}

/// Last spoken position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub paragraph_id: Option<String>,
    pub paragraph_index: usize,
}

/// Voice and rate the user last chose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub voice: String,
    pub rate: f32,
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Typed accessors over the shared [`ResourceStore`].
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn ResourceStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn ResourceStore>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn ResourceStore> {
        &self.backend
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read '{}' from {} store: {}", key, self.backend.backend_type(), e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring malformed '{}' entry: {}", key, e);
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize '{}': {}", key, e);
                return;
            }
        };
        if let Err(e) = self.backend.set(key, &raw) {
            warn!("Failed to persist '{}': {}", key, e);
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!("Failed to remove '{}': {}", key, e);
        }
    }

    pub fn credentials(&self) -> Option<StoredCredentials> {
        self.read(CREDENTIALS_KEY)
    }

    pub fn save_credentials(&self, credentials: &StoredCredentials) {
        debug!(
            region = ?credentials.region,
            locked = credentials.region_locked,
            "Persisting credentials"
        );
        self.write(CREDENTIALS_KEY, credentials);
    }

    /// Drops the region bound to `speech_key`, keeping the key itself.
    ///
    /// Used when a cached region stops accepting the key so the next start
    /// runs discovery again.
    pub fn forget_region(&self, speech_key: &str) {
        if let Some(mut credentials) = self.credentials()
            && credentials.matches_key(speech_key)
        {
            credentials.region = None;
            credentials.region_locked = false;
            credentials.updated_at = now_millis();
            self.save_credentials(&credentials);
        }
    }

    pub fn clear_credentials(&self) {
        self.delete(CREDENTIALS_KEY);
    }

    pub fn bookmark(&self) -> Option<Bookmark> {
        self.read(POSITION_KEY)
    }

    pub fn save_bookmark(&self, bookmark: &Bookmark) {
        self.write(POSITION_KEY, bookmark);
    }

    pub fn clear_bookmark(&self) {
        self.delete(POSITION_KEY);
    }

    pub fn preferences(&self) -> Option<Preferences> {
        self.read(PREFERENCES_KEY)
    }

    pub fn save_preferences(&self, preferences: &Preferences) {
        self.write(PREFERENCES_KEY, preferences);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryResourceStore;

    fn session() -> (Arc<MemoryResourceStore>, SessionStore) {
        let backend = Arc::new(MemoryResourceStore::new());
        let store = SessionStore::new(backend.clone());
        (backend, store)
    }

    #[test]
    fn test_credentials_round_trip() {
        let (_, store) = session();
        assert!(store.credentials().is_none());

        let credentials = StoredCredentials::new("key-1", Some("westeurope".into()), true);
        store.save_credentials(&credentials);
        assert_eq!(store.credentials(), Some(credentials));
    }

    #[test]
    fn test_forget_region_only_for_matching_key() {
        let (_, store) = session();
        store.save_credentials(&StoredCredentials::new("key-1", Some("eastus".into()), true));

        store.forget_region("other-key");
        assert_eq!(store.credentials().unwrap().region.as_deref(), Some("eastus"));

        store.forget_region(" key-1 ");
        let credentials = store.credentials().unwrap();
        assert_eq!(credentials.region, None);
        assert!(!credentials.region_locked);
        assert_eq!(credentials.speech_key, "key-1");
    }

    #[test]
    fn test_malformed_entry_reads_as_missing() {
        let (backend, store) = session();
        backend.set(POSITION_KEY, "{oops").unwrap();
        assert!(store.bookmark().is_none());
    }

    #[test]
    fn test_bookmark_and_preferences() {
        let (_, store) = session();
        let bookmark = Bookmark {
            paragraph_id: Some("p-3".into()),
            paragraph_index: 3,
        };
        store.save_bookmark(&bookmark);
        assert_eq!(store.bookmark(), Some(bookmark));
        store.clear_bookmark();
        assert!(store.bookmark().is_none());

        let preferences = Preferences {
            voice: "en-GB-SoniaNeural".into(),
            rate: 1.25,
        };
        store.save_preferences(&preferences);
        assert_eq!(store.preferences(), Some(preferences));
    }

    #[test]
    fn test_credentials_tolerate_missing_optional_fields() {
        let (backend, store) = session();
        backend
            .set(CREDENTIALS_KEY, r#"{"speech_key":"abc"}"#)
            .unwrap();
        let credentials = store.credentials().unwrap();
        assert_eq!(credentials.region, None);
        assert!(!credentials.region_locked);
        assert_eq!(credentials.updated_at, 0);
    }
}
