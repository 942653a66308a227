//! PostgreSQL implementation of the UserStorage trait.

use async_trait::async_trait;
use sqlx_postgres::PgPool;

use banners_auth::{AuthResult, NewUser, User, UserStorage};

use crate::queries::users;
use crate::transaction::{begin, commit_or_rollback};

/// User accounts stored next to the banner catalog.
///
/// Shares the banner store's pool; see [`crate::PostgresBannerStore::pool`].
#[derive(Debug, Clone)]
pub struct PostgresUserStorage {
    pool: PgPool,
}

impl PostgresUserStorage {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStorage for PostgresUserStorage {
    async fn create(&self, user: &NewUser) -> AuthResult<i64> {
        let mut tx = begin(&self.pool, "create user").await?;
        let result = users::insert(&mut tx, user).await;
        commit_or_rollback(tx, result, "create user").await
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let mut tx = begin(&self.pool, "get user").await?;
        let result = users::find_by_username(&mut tx, username).await;
        commit_or_rollback(tx, result, "get user").await
    }
}
