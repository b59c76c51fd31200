use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::{Claims, IssuedToken, TokenIssuer};
use crate::db::{CredentialStore, Credentials, RefreshTokenRecord, RefreshTokenStore};
use crate::error::{AppError, AuthError, DatabaseError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    /// Expiry of the access token, unix seconds.
    pub access_token_duration: i64,
    pub refresh_token: String,
}

pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    issuer: TokenIssuer,
    password_hash_cost: u32,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        issuer: TokenIssuer,
        password_hash_cost: u32,
    ) -> Self {
        Self {
            credentials,
            refresh_tokens,
            issuer,
            password_hash_cost,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Store credentials for a new account. `id` is supplied by the user
    /// service when it already created the profile row; otherwise one is
    /// generated.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        id: Option<Uuid>,
        username: &str,
        password: &str,
    ) -> Result<Credentials, AppError> {
        if username.trim().is_empty() {
            return Err(AppError::ValidationError("username must not be empty".into()));
        }
        if password.is_empty() {
            return Err(AppError::ValidationError("password must not be empty".into()));
        }

        // Not race-proof on its own; the store's unique constraint backs it up.
        if self.credentials.username_exists(username).await? {
            return Err(DatabaseError::Duplicate.into());
        }

        let password_hash = hash_password(password.to_string(), self.password_hash_cost).await?;
        let credentials = Credentials::new(
            id.unwrap_or_else(Uuid::new_v4),
            username.to_string(),
            password_hash,
        );
        self.credentials.create_credentials(&credentials).await?;

        info!("Registered account {} ({})", credentials.id, credentials.username);
        Ok(credentials)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AppError> {
        let credentials = self
            .credentials
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password.to_string(), credentials.password_hash.clone()).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let access = self.issuer.issue_access_token(credentials.id)?;
        let refresh = self.issuer.issue_refresh_token(credentials.id)?;

        // Overwrites any earlier refresh token, which stops working from here on.
        self.refresh_tokens
            .upsert(&RefreshTokenRecord::new(credentials.id, refresh.token.clone()))
            .await?;

        info!("Login succeeded for account {}", credentials.id);
        Ok(LoginResponse {
            access_token: access.token,
            access_token_duration: access.expires_at,
            refresh_token: refresh.token,
        })
    }

    /// Exchange a refresh token for a new access token. `access_claims` come
    /// from an access token that verified correctly but has expired.
    #[instrument(skip(self, presented_refresh_token, access_claims), fields(account = %access_claims.sub))]
    pub async fn refresh(
        &self,
        presented_refresh_token: &str,
        access_claims: &Claims,
    ) -> Result<IssuedToken, AppError> {
        let refresh_claims = self.issuer.verify_refresh_token(presented_refresh_token)?;
        if refresh_claims.sub != access_claims.sub {
            debug!("Refresh token subject does not match access token subject");
            return Err(AuthError::RefreshTokenMismatch.into());
        }

        let stored = self
            .refresh_tokens
            .find_by_user_id(access_claims.sub)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if !tokens_match(&stored.token, presented_refresh_token) {
            debug!("Presented refresh token is not the latest one issued");
            return Err(AuthError::RefreshTokenMismatch.into());
        }

        Ok(self.issuer.issue_access_token(access_claims.sub)?)
    }
}

// Compare digests so the comparison time does not depend on a shared prefix.
fn tokens_match(stored: &str, presented: &str) -> bool {
    Sha256::digest(stored.as_bytes()) == Sha256::digest(presented.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::{MockCredentialStore, MockRefreshTokenStore};
    use crate::db::MemoryStore;
    use crate::error::TokenError;
    use crate::keys::test_keys;
    use chrono::{Duration, Utc};

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            Arc::new(test_keys::material()),
            Duration::minutes(1),
            Duration::minutes(43200),
        )
    }

    fn memory_service() -> AuthService {
        let store = Arc::new(MemoryStore::new());
        AuthService::new(store.clone(), store, issuer(), 4)
    }

    fn expired_claims(service: &AuthService, id: Uuid) -> Claims {
        let token = service
            .issuer()
            .issue_access_token_at(id, Utc::now().timestamp() - 600)
            .unwrap();
        match service.issuer().verify_access_token(&token.token) {
            Err(TokenError::Expired(claims)) => claims,
            other => panic!("expected expired token, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = memory_service();
        let account = service.register(None, "alice", "s3cret").await.unwrap();
        assert_ne!(account.password_hash, "s3cret");

        let tokens = service.login("alice", "s3cret").await.unwrap();
        let claims = service.issuer().verify_access_token(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, account.id);
        assert_eq!(tokens.access_token_duration, claims.exp);
        assert_eq!(service.issuer().verify_refresh_token(&tokens.refresh_token).unwrap().sub, account.id);
    }

    #[tokio::test]
    async fn test_register_keeps_supplied_id() {
        let service = memory_service();
        let id = Uuid::new_v4();
        let account = service.register(Some(id), "bob", "pw").await.unwrap();
        assert_eq!(account.id, id);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_fields() {
        let service = memory_service();
        assert!(matches!(
            service.register(None, "  ", "pw").await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            service.register(None, "carol", "").await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username_leaves_first_account() {
        let service = memory_service();
        let first = service.register(None, "dave", "first").await.unwrap();

        let second = service.register(None, "dave", "second").await;
        assert!(matches!(second, Err(AppError::DatabaseError(DatabaseError::Duplicate))));

        let tokens = service.login("dave", "first").await.unwrap();
        let claims = service.issuer().verify_access_token(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, first.id);
        assert!(service.login("dave", "second").await.unwrap_err().is_unauthorized());
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_unauthorized() {
        let service = memory_service();
        service.register(None, "erin", "right").await.unwrap();

        let err = service.login("erin", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidCredentials)));

        let err = service.login("nobody", "right").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_refresh_with_latest_token() {
        let service = memory_service();
        let account = service.register(None, "frank", "pw").await.unwrap();
        let tokens = service.login("frank", "pw").await.unwrap();

        let claims = expired_claims(&service, account.id);
        let fresh = service.refresh(&tokens.refresh_token, &claims).await.unwrap();
        assert_eq!(service.issuer().verify_access_token(&fresh.token).unwrap().sub, account.id);
    }

    #[tokio::test]
    async fn test_refresh_with_superseded_token_fails() {
        let service = memory_service();
        let account = service.register(None, "grace", "pw").await.unwrap();
        let first = service.login("grace", "pw").await.unwrap();
        // Distinct iat so the second refresh token differs from the first.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let second = service.login("grace", "pw").await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        let claims = expired_claims(&service, account.id);
        let err = service.refresh(&first.refresh_token, &claims).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::RefreshTokenMismatch)));

        assert!(service.refresh(&second.refresh_token, &claims).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_token_of_another_account_rejected() {
        let service = memory_service();
        let heidi = service.register(None, "heidi", "pw").await.unwrap();
        service.register(None, "ivan", "pw").await.unwrap();
        let ivan_tokens = service.login("ivan", "pw").await.unwrap();

        let claims = expired_claims(&service, heidi.id);
        let err = service.refresh(&ivan_tokens.refresh_token, &claims).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_refresh_without_stored_token_rejected() {
        let service = memory_service();
        let id = Uuid::new_v4();
        let refresh = service.issuer().issue_refresh_token(id).unwrap();
        let claims = expired_claims(&service, id);

        let err = service.refresh(&refresh.token, &claims).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_refresh_with_garbage_token_rejected() {
        let service = memory_service();
        let claims = expired_claims(&service, Uuid::new_v4());
        let err = service.refresh("not-a-token", &claims).await.unwrap_err();
        assert!(matches!(err, AppError::TokenError(TokenError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal_error() {
        let mut credentials = MockCredentialStore::new();
        credentials
            .expect_find_by_username()
            .returning(|_| Err(DatabaseError::ConnectionError("down".into())));
        let service = AuthService::new(
            Arc::new(credentials),
            Arc::new(MockRefreshTokenStore::new()),
            issuer(),
            4,
        );

        let err = service.login("alice", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::ConnectionError(_))));
        assert!(!err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_failed_refresh_token_persist_fails_login() {
        let hash = hash_password("pw".to_string(), 4).await.unwrap();
        let stored = Credentials::new(Uuid::new_v4(), "judy".into(), hash);

        let mut credentials = MockCredentialStore::new();
        credentials
            .expect_find_by_username()
            .returning(move |_| Ok(Some(stored.clone())));
        let mut refresh_tokens = MockRefreshTokenStore::new();
        refresh_tokens
            .expect_upsert()
            .times(1)
            .returning(|_| Err(DatabaseError::QueryError("disk full".into())));

        let service = AuthService::new(Arc::new(credentials), Arc::new(refresh_tokens), issuer(), 4);
        let err = service.login("judy", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::QueryError(_))));
    }

    #[tokio::test]
    async fn test_wrong_password_never_touches_refresh_store() {
        let hash = hash_password("pw".to_string(), 4).await.unwrap();
        let stored = Credentials::new(Uuid::new_v4(), "ken".into(), hash);

        let mut credentials = MockCredentialStore::new();
        credentials
            .expect_find_by_username()
            .returning(move |_| Ok(Some(stored.clone())));
        let mut refresh_tokens = MockRefreshTokenStore::new();
        refresh_tokens.expect_upsert().never();

        let service = AuthService::new(Arc::new(credentials), Arc::new(refresh_tokens), issuer(), 4);
        let err = service.login("ken", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidCredentials)));
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", "abcd"));
    }
}
