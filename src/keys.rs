//! Signing and verification key material, loaded once at startup.

use std::fmt;
use std::fs;

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::info;

use crate::config::AuthConfig;
use crate::error::KeyError;
use crate::jwks::{JwkSet, RsaJwk};

/// RSA keypair for access tokens plus the HMAC secret for refresh tokens.
/// Immutable after construction; share it behind an `Arc`.
pub struct KeyMaterial {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    public_jwk: RsaJwk,
}

impl KeyMaterial {
    pub fn load(config: &AuthConfig) -> Result<Self, KeyError> {
        let private_pem = read_key_file(&config.private_key_path)?;
        let public_pem = read_key_file(&config.public_key_path)?;
        let hmac_secret = read_key_file(&config.hmac_key_path)?;

        let material = Self::from_pem(&private_pem, &public_pem, &hmac_secret)?;
        info!(
            "Loaded key material (kid: {})",
            material.key_id().unwrap_or("none")
        );
        Ok(material)
    }

    pub fn from_pem(private_pem: &[u8], public_pem: &[u8], hmac_secret: &[u8]) -> Result<Self, KeyError> {
        if hmac_secret.is_empty() {
            return Err(KeyError::EmptySecret);
        }

        let private_key = parse_private_key(private_pem)?;
        let public_key = parse_public_key(public_pem)?;
        if RsaPublicKey::from(&private_key) != public_key {
            return Err(KeyError::InvalidPublicKey(
                "public key does not belong to the private key".to_string(),
            ));
        }

        let access_encoding = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;
        let access_decoding = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;

        Ok(Self {
            access_encoding,
            access_decoding,
            refresh_encoding: EncodingKey::from_secret(hmac_secret),
            refresh_decoding: DecodingKey::from_secret(hmac_secret),
            public_jwk: RsaJwk::from_public_key(&public_key),
        })
    }

    pub fn access_encoding_key(&self) -> &EncodingKey {
        &self.access_encoding
    }

    pub fn access_decoding_key(&self) -> &DecodingKey {
        &self.access_decoding
    }

    pub fn refresh_encoding_key(&self) -> &EncodingKey {
        &self.refresh_encoding
    }

    pub fn refresh_decoding_key(&self) -> &DecodingKey {
        &self.refresh_decoding
    }

    pub fn key_id(&self) -> Option<&str> {
        self.public_jwk.kid.as_deref()
    }

    pub fn public_key_set(&self) -> JwkSet {
        JwkSet::single(self.public_jwk.clone())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("kid", &self.public_jwk.kid)
            .finish_non_exhaustive()
    }
}

fn read_key_file(path: &str) -> Result<Vec<u8>, KeyError> {
    fs::read(path).map_err(|source| KeyError::Read {
        path: path.to_string(),
        source,
    })
}

fn pem_str(pem: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(pem).map_err(|e| e.to_string())
}

// Accepts both "BEGIN PRIVATE KEY" (PKCS#8) and "BEGIN RSA PRIVATE KEY" (PKCS#1).
fn parse_private_key(pem: &[u8]) -> Result<RsaPrivateKey, KeyError> {
    let pem = pem_str(pem).map_err(KeyError::InvalidPrivateKey)?;
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))
}

fn parse_public_key(pem: &[u8]) -> Result<RsaPublicKey, KeyError> {
    let pem = pem_str(pem).map_err(KeyError::InvalidPublicKey)?;
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
}
