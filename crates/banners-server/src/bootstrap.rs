//! Creates the first administrator account from configuration.
//!
//! Creating an admin through the API requires an admin token, so a fresh
//! deployment gets its first admin here.

use banners_auth::{AuthResult, AuthService};
use tracing::info;

use crate::config::BootstrapConfig;

/// Ensures the configured admin user exists. Does nothing without one.
///
/// An existing account with the same name is left untouched, password
/// included.
///
/// # Errors
///
/// Returns storage or hashing failures.
pub async fn bootstrap_admin_user(auth: &AuthService, config: &BootstrapConfig) -> AuthResult<()> {
    let Some(admin) = &config.admin_user else {
        return Ok(());
    };

    if auth.ensure_admin(&admin.username, &admin.password).await? {
        info!(username = %admin.username, "Admin user created");
    } else {
        info!(username = %admin.username, "Admin user already exists, skipping");
    }
    Ok(())
}
