//! Persistence for credentials, playback position and preferences.
//!
//! [`ResourceStore`] is the raw get/set/remove surface (memory or JSON file
//! backed); [`SessionStore`] layers typed documents on top of it.

pub mod backend;
pub mod session;

pub use backend::{
    FileResourceStore, MemoryResourceStore, ResourceStore, Result, StoreError, open_resource_store,
};
pub use session::{Bookmark, Preferences, SessionStore, StoredCredentials, now_millis};
