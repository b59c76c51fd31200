pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod jwks;
pub mod key_cache;
pub mod keys;

use std::sync::Arc;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AccessTokenVerifier, AuthService, AuthenticatedUser, MaybeUser, TokenIssuer};
pub use client::AuthClient;
pub use db::{CredentialStore, MemoryStore, PgStore, RefreshTokenStore};
pub use key_cache::PublicKeyCache;
pub use keys::KeyMaterial;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub keys: Arc<KeyMaterial>,
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    /// Load key material, connect to Postgres and apply migrations.
    pub async fn new(config: Settings) -> Result<Self> {
        let keys = Arc::new(KeyMaterial::load(&config.auth)?);

        let store = Arc::new(PgStore::connect(&config.database).await?);
        store.migrate().await?;

        Ok(Self::with_stores(config, keys, store.clone(), store))
    }

    pub fn with_stores(
        config: Settings,
        keys: Arc<KeyMaterial>,
        credentials: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        let issuer = TokenIssuer::from_config(keys.clone(), &config.auth);
        let auth_service = AuthService::new(
            credentials,
            refresh_tokens,
            issuer,
            config.auth.password_hash_cost,
        );

        Self {
            config: Arc::new(config),
            keys,
            auth_service: Arc::new(auth_service),
        }
    }

    /// Verifier for this process: the issuer checks tokens with its own key.
    pub fn verifier(&self) -> AccessTokenVerifier {
        AccessTokenVerifier::Static(self.keys.clone())
    }
}

/// Routes served by the auth service. Expects `web::Data<AppState>` and
/// `web::Data<AccessTokenVerifier>` to be registered on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(auth::handlers::json_config())
        .route("/health", web::get().to(health_check))
        .route("/register", web::post().to(auth::handlers::register))
        .route("/login", web::post().to(auth::handlers::login))
        .route("/refresh", web::post().to(auth::handlers::refresh))
        .route("/public-keys", web::get().to(auth::handlers::public_keys));
}
