//! Credential and refresh-token persistence.
//!
//! Services talk to the `CredentialStore` and `RefreshTokenStore` traits;
//! `PgStore` backs them with Postgres and `MemoryStore` keeps everything
//! in process.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::MemoryStore;
pub use models::{Credentials, RefreshTokenRecord};
pub use operations::PgStore;
pub use store::{CredentialStore, RefreshTokenStore};
