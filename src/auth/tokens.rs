use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::TokenError;
use crate::keys::KeyMaterial;

pub const ACCESS_TOKEN_ALGORITHM: Algorithm = Algorithm::RS256;
pub const REFRESH_TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Account ID
    pub iat: i64,   // Issued at
    pub exp: i64,   // Expiration time
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Mints access tokens (RS256, short-lived) and refresh tokens (HS256,
/// long-lived) and verifies both.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyMaterial>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(keys: Arc<KeyMaterial>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            keys,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(keys: Arc<KeyMaterial>, config: &AuthConfig) -> Self {
        Self::new(
            keys,
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::minutes(config.refresh_token_ttl_minutes),
        )
    }

    pub fn keys(&self) -> &Arc<KeyMaterial> {
        &self.keys
    }

    pub fn issue_access_token(&self, account_id: Uuid) -> Result<IssuedToken, TokenError> {
        self.issue_access_token_at(account_id, Utc::now().timestamp())
    }

    pub fn issue_access_token_at(&self, account_id: Uuid, now: i64) -> Result<IssuedToken, TokenError> {
        let mut header = Header::new(ACCESS_TOKEN_ALGORITHM);
        header.kid = self.keys.key_id().map(str::to_string);

        let claims = Claims {
            sub: account_id,
            iat: now,
            exp: now + self.access_ttl.num_seconds(),
        };
        let token = encode(&header, &claims, self.keys.access_encoding_key())
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    pub fn issue_refresh_token(&self, account_id: Uuid) -> Result<IssuedToken, TokenError> {
        self.issue_refresh_token_at(account_id, Utc::now().timestamp())
    }

    pub fn issue_refresh_token_at(&self, account_id: Uuid, now: i64) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            sub: account_id,
            iat: now,
            exp: now + self.refresh_ttl.num_seconds(),
        };
        let token = encode(
            &Header::new(REFRESH_TOKEN_ALGORITHM),
            &claims,
            self.keys.refresh_encoding_key(),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_access_token_at(token, Utc::now().timestamp())
    }

    pub fn verify_access_token_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        decode_at(token, self.keys.access_decoding_key(), ACCESS_TOKEN_ALGORITHM, now)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_refresh_token_at(token, Utc::now().timestamp())
    }

    pub fn verify_refresh_token_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        decode_at(token, self.keys.refresh_decoding_key(), REFRESH_TOKEN_ALGORITHM, now)
    }
}

/// Verifies signature and claim shape with `algorithm` pinned, then applies
/// the expiry rule itself: a token expiring at `t` is valid strictly before
/// `t`. Expired tokens keep their decoded claims in the error.
pub fn decode_at(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    now: i64,
) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<Claims>(token, key, &validation)
        .map_err(|e| TokenError::Invalid(e.to_string()))?;

    if now >= data.claims.exp {
        return Err(TokenError::Expired(data.claims));
    }

    Ok(data.claims)
}
