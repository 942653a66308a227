//! Account creation, login and role checks.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::config::AuthConfig;
use crate::password::{hash_password, verify_password};
use crate::storage::{NewUser, UserRole, UserStorage};
use crate::token::{Claims, JwtService};
use crate::{AuthError, AuthResult};

/// Request to register a new account.
///
/// Creating an `admin` requires `token` to belong to an existing admin.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub feature_id: Option<i32>,
    #[serde(default)]
    pub tag_ids: Vec<i32>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Authorization collaborator of the serving path.
pub struct AuthService {
    users: Arc<dyn UserStorage>,
    jwt: JwtService,
}

impl AuthService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStorage>, config: &AuthConfig) -> Self {
        Self {
            users,
            jwt: JwtService::new(config),
        }
    }

    /// Validates `token` and returns its claims.
    ///
    /// # Errors
    ///
    /// `TokenExpired` or `InvalidToken`.
    pub fn authenticate(&self, token: &str) -> AuthResult<Claims> {
        self.jwt.verify(token)
    }

    /// Returns whether `token` belongs to an administrator.
    ///
    /// # Errors
    ///
    /// `TokenExpired` or `InvalidToken`; a valid non-admin token is `Ok(false)`.
    pub fn is_admin(&self, token: &str) -> AuthResult<bool> {
        Ok(self.authenticate(token)?.is_admin())
    }

    /// Registers a user and returns a token for it.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for an empty username or password
    /// - `Forbidden` when an admin is requested without an admin token
    /// - `UserExists` when the username is taken
    #[instrument(skip(self, request), fields(username = %request.username, role = %request.role))]
    pub async fn create_user(&self, request: CreateUserRequest) -> AuthResult<String> {
        if request.username.trim().is_empty() {
            return Err(AuthError::invalid_request("username must not be empty"));
        }
        if request.password.is_empty() {
            return Err(AuthError::invalid_request("password must not be empty"));
        }

        if request.role.is_admin() {
            let token = request
                .token
                .as_deref()
                .ok_or_else(|| AuthError::forbidden("only admins can create admins"))?;
            if !self.is_admin(token)? {
                return Err(AuthError::forbidden("only admins can create admins"));
            }
        }

        let password_hash = hash_off_runtime(request.password.clone()).await?;

        let user = NewUser {
            username: request.username,
            password_hash,
            role: request.role,
            feature_id: request.feature_id,
            tag_ids: request.tag_ids,
        };
        let id = self.users.create(&user).await?;
        info!(user_id = id, "user created");

        self.jwt.issue(&user.username, user.role)
    }

    /// Checks credentials and returns a fresh token.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown user or a wrong password.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<String> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::internal(format!("password check aborted: {e}")))?
        .map_err(|e| AuthError::internal(format!("stored hash is invalid: {e}")))?;
        if !matches {
            debug!("password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        self.jwt.issue(&user.username, user.role)
    }

    /// Creates the administrator account unless a user with that name exists.
    ///
    /// Returns `true` if the account was created.
    ///
    /// # Errors
    ///
    /// Returns storage failures and hashing failures.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> AuthResult<bool> {
        if self.users.find_by_username(username).await?.is_some() {
            return Ok(false);
        }

        let password_hash = hash_off_runtime(password.to_string()).await?;
        let user = NewUser {
            username: username.to_string(),
            password_hash,
            role: UserRole::Admin,
            feature_id: None,
            tag_ids: Vec::new(),
        };

        match self.users.create(&user).await {
            Ok(_) => Ok(true),
            // Another instance won the race.
            Err(AuthError::UserExists { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Argon2 is CPU-bound; keep it off the async workers.
async fn hash_off_runtime(password: String) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::internal(format!("password hashing aborted: {e}")))?
        .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::User;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockUsers {
        users: Mutex<HashMap<String, User>>,
    }

    #[async_trait]
    impl UserStorage for MockUsers {
        async fn create(&self, user: &NewUser) -> AuthResult<i64> {
            let mut users = self.users.lock().unwrap();
            if users.contains_key(&user.username) {
                return Err(AuthError::user_exists(&user.username));
            }
            let id = users.len() as i64 + 1;
            users.insert(user.username.clone(), user.clone().into_user(id));
            Ok(id)
        }

        async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
            Ok(self.users.lock().unwrap().get(username).cloned())
        }
    }

    fn service() -> AuthService {
        AuthService::new(Arc::new(MockUsers::default()), &AuthConfig::new("secret"))
    }

    fn request(username: &str, role: UserRole, token: Option<String>) -> CreateUserRequest {
        CreateUserRequest {
            username: username.into(),
            password: "pw".into(),
            role,
            feature_id: None,
            tag_ids: Vec::new(),
            token,
        }
    }

    #[tokio::test]
    async fn test_create_user_and_login() {
        let auth = service();
        let token = auth
            .create_user(request("alice", UserRole::User, None))
            .await
            .unwrap();
        assert!(!auth.is_admin(&token).unwrap());

        let token = auth.login("alice", "pw").await.unwrap();
        assert_eq!(auth.authenticate(&token).unwrap().sub, "alice");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let auth = service();
        auth.create_user(request("alice", UserRole::User, None))
            .await
            .unwrap();

        assert!(matches!(
            auth.login("alice", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "pw").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let auth = service();
        auth.create_user(request("alice", UserRole::User, None))
            .await
            .unwrap();
        let err = auth
            .create_user(request("alice", UserRole::User, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserExists { .. }));
    }

    #[tokio::test]
    async fn test_admin_creation_requires_admin_token() {
        let auth = service();

        let err = auth
            .create_user(request("root", UserRole::Admin, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));

        let user_token = auth
            .create_user(request("alice", UserRole::User, None))
            .await
            .unwrap();
        let err = auth
            .create_user(request("root", UserRole::Admin, Some(user_token)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));

        assert!(auth.ensure_admin("boot", "pw").await.unwrap());
        let admin_token = auth.login("boot", "pw").await.unwrap();
        let token = auth
            .create_user(request("root", UserRole::Admin, Some(admin_token)))
            .await
            .unwrap();
        assert!(auth.is_admin(&token).unwrap());
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let auth = service();
        assert!(auth.ensure_admin("admin", "pw").await.unwrap());
        assert!(!auth.ensure_admin("admin", "other").await.unwrap());
        // The first password stays in effect.
        assert!(auth.login("admin", "pw").await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_fields_rejected() {
        let auth = service();
        let mut req = request("", UserRole::User, None);
        assert!(matches!(
            auth.create_user(req.clone()).await,
            Err(AuthError::InvalidRequest { .. })
        ));
        req.username = "bob".into();
        req.password.clear();
        assert!(matches!(
            auth.create_user(req).await,
            Err(AuthError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_is_admin_rejects_garbage_token() {
        let auth = service();
        assert!(matches!(
            auth.is_admin("not-a-jwt"),
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[tokio::test]
    async fn test_hashing_leaves_runtime_responsive() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let auth = service();
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        });
        tokio::task::yield_now().await;
        let before = ticks.load(Ordering::Relaxed);

        // Single-threaded runtime: the ticker only advances if hashing yields.
        assert!(auth.ensure_admin("admin", "pw").await.unwrap());
        auth.login("admin", "pw").await.unwrap();

        assert!(ticks.load(Ordering::Relaxed) > before);
        ticker.abort();
    }
}
