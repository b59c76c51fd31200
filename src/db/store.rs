use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{Credentials, RefreshTokenRecord};
use crate::error::DatabaseError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn username_exists(&self, username: &str) -> Result<bool, DatabaseError>;

    /// Fails with `DatabaseError::Duplicate` when the id or username is taken.
    async fn create_credentials(&self, credentials: &Credentials) -> Result<(), DatabaseError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Credentials>, DatabaseError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<RefreshTokenRecord>, DatabaseError>;

    /// Create the record or overwrite the existing one for the same account.
    async fn upsert(&self, record: &RefreshTokenRecord) -> Result<(), DatabaseError>;
}
