//! # banners-auth
//!
//! Authentication and authorization for the banners service.
//!
//! This crate provides:
//! - HS256 token issuance and validation
//! - Argon2id password hashing
//! - The [`UserStorage`] trait implemented by the storage backends
//! - [`AuthService`], which ties them together
//!
//! The serving path consumes one capability only: [`AuthService::is_admin`].
//!
//! ## Modules
//!
//! - [`config`] - Secret and token lifetime
//! - [`token`] - Token claims and the JWT service
//! - [`password`] - Password hashing
//! - [`storage`] - User model and storage trait
//! - [`service`] - Account creation, login and role checks

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod storage;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, ErrorCategory};
pub use service::{AuthService, CreateUserRequest};
pub use storage::{NewUser, User, UserRole, UserStorage};
pub use token::{Claims, JwtService};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Type alias for a shareable user store.
pub type DynUserStorage = std::sync::Arc<dyn UserStorage>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use banners_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::AuthConfig;
    pub use crate::error::AuthError;
    pub use crate::service::AuthService;
    pub use crate::storage::{User, UserRole, UserStorage};
    pub use crate::AuthResult;
}
