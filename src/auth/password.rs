//! Password hashing with bcrypt, run off the async workers.

use tracing::warn;

use crate::error::AppError;

/// Hash a password with the given bcrypt cost. The salt is generated per call.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await?
        .map_err(|e| AppError::InternalError(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored hash.
///
/// A stored hash that cannot be parsed counts as a mismatch: the caller
/// reports bad credentials rather than a server error.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    let result = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?;

    match result {
        Ok(matches) => Ok(matches),
        Err(e) => {
            warn!("Stored password hash could not be verified: {}", e);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("correct horse".to_string(), 4).await.unwrap();
        assert!(hash.starts_with("$2"));
        assert_ne!(hash, "correct horse");

        assert!(verify_password("correct horse".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("battery staple".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let first = hash_password("same".to_string(), 4).await.unwrap();
        let second = hash_password("same".to_string(), 4).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_a_mismatch() {
        let result = verify_password("anything".to_string(), "not-a-bcrypt-hash".to_string()).await;
        assert!(!result.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_cost_is_internal_error() {
        let result = hash_password("pw".to_string(), 99).await;
        assert!(matches!(result, Err(AppError::InternalError(_))));
    }
}
