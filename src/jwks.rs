//! JSON Web Key Set representation of the access-token verification key.
//!
//! Only RSA signing keys are published, so the types here model exactly
//! that subset of RFC 7517.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::DecodingKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::KeyError;

pub const KEY_TYPE_RSA: &str = "RSA";
pub const KEY_USE_SIGNATURE: &str = "sig";
pub const ALGORITHM_RS256: &str = "RS256";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaJwk {
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    pub n: String,
    pub e: String,
}

impl RsaJwk {
    pub fn from_public_key(key: &RsaPublicKey) -> Self {
        let n = URL_SAFE_NO_PAD.encode(key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(key.e().to_bytes_be());
        let kid = thumbprint(&n, &e);

        Self {
            kty: KEY_TYPE_RSA.to_string(),
            key_use: Some(KEY_USE_SIGNATURE.to_string()),
            alg: Some(ALGORITHM_RS256.to_string()),
            kid: Some(kid),
            n,
            e,
        }
    }

    /// Builds a verification key, refusing anything that is not an RS256
    /// signing key.
    pub fn decoding_key(&self) -> Result<DecodingKey, KeyError> {
        if self.kty != KEY_TYPE_RSA {
            return Err(KeyError::InvalidKeySet(format!("unsupported key type {}", self.kty)));
        }
        if let Some(key_use) = self.key_use.as_deref() {
            if key_use != KEY_USE_SIGNATURE {
                return Err(KeyError::InvalidKeySet(format!("unsupported key use {}", key_use)));
            }
        }
        if let Some(alg) = self.alg.as_deref() {
            if alg != ALGORITHM_RS256 {
                return Err(KeyError::InvalidKeySet(format!("unsupported algorithm {}", alg)));
            }
        }

        DecodingKey::from_rsa_components(&self.n, &self.e)
            .map_err(|e| KeyError::InvalidKeySet(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<RsaJwk>,
}

impl JwkSet {
    pub fn single(key: RsaJwk) -> Self {
        Self { keys: vec![key] }
    }

    /// The issuer publishes one key; take the first RSA entry.
    pub fn first_rsa_key(&self) -> Result<&RsaJwk, KeyError> {
        self.keys
            .iter()
            .find(|k| k.kty == KEY_TYPE_RSA)
            .ok_or_else(|| KeyError::InvalidKeySet("no RSA key in key set".to_string()))
    }
}

/// RFC 7638 thumbprint: SHA-256 over the required members in lexicographic
/// order, no whitespace.
pub fn thumbprint(n: &str, e: &str) -> String {
    let canonical = format!(r#"{{"e":"{}","kty":"{}","n":"{}"}}"#, e, KEY_TYPE_RSA, n);
    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::DecodePublicKey;

    const FIXTURE_PUBLIC_KEY: &str = include_str!("../tests/fixtures/keys/app.rsa.pub");

    #[test]
    fn test_thumbprint_matches_rfc7638_example() {
        let n = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";
        assert_eq!(thumbprint(n, "AQAB"), "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs");
    }

    #[test]
    fn test_jwk_from_public_key() {
        let key = RsaPublicKey::from_public_key_pem(FIXTURE_PUBLIC_KEY).unwrap();
        let jwk = RsaJwk::from_public_key(&key);

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.e, "AQAB");
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert_eq!(jwk.kid.as_deref(), Some(thumbprint(&jwk.n, &jwk.e).as_str()));
        assert!(jwk.decoding_key().is_ok());
    }

    #[test]
    fn test_key_set_serialization_shape() {
        let key = RsaPublicKey::from_public_key_pem(FIXTURE_PUBLIC_KEY).unwrap();
        let set = JwkSet::single(RsaJwk::from_public_key(&key));
        let json = serde_json::to_value(&set).unwrap();

        assert_eq!(json["keys"].as_array().unwrap().len(), 1);
        assert_eq!(json["keys"][0]["kty"], "RSA");
        assert_eq!(json["keys"][0]["use"], "sig");

        let parsed: JwkSet = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_rejects_foreign_keys() {
        let key = RsaPublicKey::from_public_key_pem(FIXTURE_PUBLIC_KEY).unwrap();
        let mut jwk = RsaJwk::from_public_key(&key);
        jwk.alg = Some("RS512".to_string());
        assert!(matches!(jwk.decoding_key(), Err(KeyError::InvalidKeySet(_))));

        let empty = JwkSet { keys: vec![] };
        assert!(empty.first_rsa_key().is_err());
    }

    #[test]
    fn test_minimal_key_set_parses() {
        let set: JwkSet = serde_json::from_str(r#"{"keys":[{"kty":"RSA","n":"sXch","e":"AQAB"}]}"#).unwrap();
        let key = set.first_rsa_key().unwrap();
        assert!(key.kid.is_none());
        assert!(key.key_use.is_none());
    }
}
