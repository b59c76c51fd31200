//! Request authentication as actix-web extractors.
//!
//! Handlers declare the identity they need as a parameter:
//!
//! * [`AuthenticatedUser`] rejects the request with 401 unless it carries a
//!   valid, unexpired access token.
//! * [`MaybeUser`] only rejects when the server itself is misconfigured;
//!   the identity is `None` for anonymous callers and for callers with a
//!   bad token.
//! * [`ExpiredAccessToken`] only accepts a correctly signed token whose sole
//!   problem is that it expired. It guards the refresh endpoint.
//!
//! All of them look up an [`AccessTokenVerifier`] registered as app data,
//! after the Authorization header has been checked.

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::tokens::Claims;
use crate::auth::verifier::AccessTokenVerifier;
use crate::error::{AppError, AuthError, TokenError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub claims: Claims,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl MaybeUser {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|u| u.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredAccessToken {
    pub claims: Claims,
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(req: &HttpRequest) -> Result<String, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::Unauthorized)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
            Ok(token.to_string())
        }
        _ => Err(AuthError::Unauthorized),
    }
}

fn verifier(req: &HttpRequest) -> Result<AccessTokenVerifier, AppError> {
    req.app_data::<web::Data<AccessTokenVerifier>>()
        .map(|v| v.get_ref().clone())
        .ok_or_else(|| {
            error!("No AccessTokenVerifier registered as app data");
            AppError::InternalError("access token verifier not configured".to_string())
        })
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let checked = bearer_token(req)
            .map_err(AppError::from)
            .and_then(|token| verifier(req).map(|verifier| (token, verifier)));

        Box::pin(async move {
            let (token, verifier) = checked?;
            let claims = verifier.verify(&token).await.map_err(|e| {
                debug!("Access token rejected: {}", e);
                e
            })?;

            Ok(AuthenticatedUser {
                user_id: claims.sub,
                claims,
            })
        })
    }
}

impl FromRequest for MaybeUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let user = AuthenticatedUser::from_request(req, payload);

        Box::pin(async move {
            match user.await {
                Ok(user) => Ok(MaybeUser(Some(user))),
                Err(e @ AppError::InternalError(_)) => Err(e),
                Err(e) => {
                    debug!("Continuing without identity: {}", e);
                    Ok(MaybeUser(None))
                }
            }
        })
    }
}

impl FromRequest for ExpiredAccessToken {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let checked = bearer_token(req)
            .map_err(AppError::from)
            .and_then(|token| verifier(req).map(|verifier| (token, verifier)));

        Box::pin(async move {
            let (token, verifier) = checked?;
            match verifier.verify(&token).await {
                Err(TokenError::Expired(claims)) => Ok(ExpiredAccessToken { claims }),
                Ok(_) => {
                    debug!("Refresh attempted with an access token that is still valid");
                    Err(AuthError::Unauthorized.into())
                }
                Err(e) => {
                    debug!("Refresh rejected, access token is not merely expired: {}", e);
                    Err(e.into())
                }
            }
        })
    }
}
