use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{Credentials, RefreshTokenRecord};
use crate::db::store::{CredentialStore, RefreshTokenStore};
use crate::error::DatabaseError;

/// In-process store with the same semantics as `PgStore`, for tests and
/// local runs without a database.
#[derive(Default)]
pub struct MemoryStore {
    credentials: RwLock<HashMap<String, Credentials>>,
    refresh_tokens: RwLock<HashMap<Uuid, RefreshTokenRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn credential_count(&self) -> usize {
        self.credentials.read().await.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn username_exists(&self, username: &str) -> Result<bool, DatabaseError> {
        Ok(self.credentials.read().await.contains_key(username))
    }

    async fn create_credentials(&self, credentials: &Credentials) -> Result<(), DatabaseError> {
        let mut rows = self.credentials.write().await;
        let id_taken = rows.values().any(|c| c.id == credentials.id);
        if id_taken || rows.contains_key(&credentials.username) {
            return Err(DatabaseError::Duplicate);
        }
        rows.insert(credentials.username.clone(), credentials.clone());
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Credentials>, DatabaseError> {
        Ok(self.credentials.read().await.get(username).cloned())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<RefreshTokenRecord>, DatabaseError> {
        Ok(self.refresh_tokens.read().await.get(&user_id).cloned())
    }

    async fn upsert(&self, record: &RefreshTokenRecord) -> Result<(), DatabaseError> {
        self.refresh_tokens
            .write()
            .await
            .insert(record.user_id, record.clone());
        Ok(())
    }
}
