use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError};
use crate::jwks::JwkSet;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct RegisterCredentials<'a> {
    id: Uuid,
    username: &'a str,
    password: &'a str,
}

/// HTTP client for the auth service, used by the other services.
#[derive(Clone, Debug)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("invalid auth service url {}: {}", base_url, e)))?;
        // Url::join drops the last path segment unless it ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::ConfigError(e.to_string()))
    }

    pub async fn fetch_key_set(&self) -> Result<JwkSet, AppError> {
        let response = self
            .http
            .get(self.endpoint("public-keys")?)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<JwkSet>().await?)
    }

    /// Register credentials under an account id created by the caller.
    /// There is no retry: on error the caller is expected to delete the
    /// account row it created.
    pub async fn register_credentials(
        &self,
        id: Uuid,
        username: &str,
        password: &str,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.endpoint("register")?)
            .json(&RegisterCredentials { id, username, password })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(DatabaseError::Duplicate.into()),
            StatusCode::BAD_REQUEST => Err(AppError::ValidationError(
                "auth service rejected the registration".to_string(),
            )),
            status => Err(AppError::InternalError(format!(
                "auth service registration failed with status {}",
                status
            ))),
        }
    }
}
