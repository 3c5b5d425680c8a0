use crate::storage::{self, Storage, StorageError};
use std::sync::Arc;

pub const TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Bearer and refresh tokens persisted between runs.
#[derive(Clone)]
pub struct Session {
    storage: Arc<dyn Storage>,
}

impl Session {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn token(&self) -> Option<String> {
        storage::load(self.storage.as_ref(), TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        storage::load(self.storage.as_ref(), REFRESH_TOKEN_KEY)
    }

    /// Stores a new token pair. A missing refresh token keeps the previous one.
    pub fn store(&self, token: &str, refresh_token: Option<&str>) -> Result<(), StorageError> {
        storage::save(self.storage.as_ref(), TOKEN_KEY, token)?;
        if let Some(refresh_token) = refresh_token {
            storage::save(self.storage.as_ref(), REFRESH_TOKEN_KEY, refresh_token)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(REFRESH_TOKEN_KEY)
    }
}
