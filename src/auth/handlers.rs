use std::fmt;

use actix_web::{web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, Level};
use uuid::Uuid;

use crate::auth::middleware::ExpiredAccessToken;
use crate::error::AppError;
use crate::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub id: Option<Uuid>,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Client mistakes stay at debug; only server-side failures are errors.
fn failure_level(e: &AppError) -> Level {
    if e.status_code().is_server_error() {
        Level::ERROR
    } else {
        Level::DEBUG
    }
}

fn log_failure(action: &str, username: &str, e: &AppError) {
    if failure_level(e) == Level::ERROR {
        error!("{} failed for username: {}: {}", action, username, e);
    } else {
        debug!("{} rejected for username: {}: {}", action, username, e);
    }
}

/// Malformed JSON bodies become 400s in the service's error format.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into())
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received registration request for username: {}", req.username);

    match state.auth_service.register(req.id, &req.username, &req.password).await {
        Ok(_) => Ok(HttpResponse::Ok().finish()),
        Err(e) => {
            log_failure("Registration", &req.username, &e);
            Err(e)
        }
    }
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for username: {}", req.username);

    match state.auth_service.login(&req.username, &req.password).await {
        Ok(tokens) => Ok(HttpResponse::Ok().json(tokens)),
        Err(e) => {
            log_failure("Login", &req.username, &e);
            Err(e)
        }
    }
}

pub async fn refresh(
    expired: ExpiredAccessToken,
    req: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let access = state
        .auth_service
        .refresh(&req.refresh_token, &expired.claims)
        .await?;

    info!("Issued refreshed access token for account {}", expired.claims.sub);
    Ok(HttpResponse::Ok().json(RefreshResponse {
        access_token: access.token,
    }))
}

pub async fn public_keys(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.keys.public_key_set())
}
