//! Authentication core: token issuance and verification, the
//! login/register/refresh flows and the request extractors shared by
//! protected services.

pub mod handlers;
pub mod middleware;
mod password;
mod service;
pub mod tokens;
mod verifier;

pub use middleware::{AuthenticatedUser, ExpiredAccessToken, MaybeUser};
pub use password::{hash_password, verify_password};
pub use service::{AuthService, LoginResponse};
pub use tokens::{Claims, IssuedToken, TokenIssuer};
pub use verifier::AccessTokenVerifier;
