use std::sync::Arc;

use chrono::Utc;

use crate::auth::tokens::{decode_at, Claims, ACCESS_TOKEN_ALGORITHM};
use crate::error::TokenError;
use crate::key_cache::PublicKeyCache;
use crate::keys::KeyMaterial;

/// Where access tokens get their verification key from: the issuer uses its
/// own keypair, every other service the polled key cache.
#[derive(Clone)]
pub enum AccessTokenVerifier {
    Static(Arc<KeyMaterial>),
    Cached(Arc<PublicKeyCache>),
}

impl AccessTokenVerifier {
    pub async fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp()).await
    }

    pub async fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        match self {
            AccessTokenVerifier::Static(keys) => {
                decode_at(token, keys.access_decoding_key(), ACCESS_TOKEN_ALGORITHM, now)
            }
            AccessTokenVerifier::Cached(cache) => {
                let key = cache.current().await.ok_or(TokenError::KeyUnavailable)?;
                decode_at(token, &key.decoding_key, ACCESS_TOKEN_ALGORITHM, now)
            }
        }
    }
}
