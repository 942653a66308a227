//! User table statements.

use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgTransaction;

use banners_auth::{AuthError, AuthResult, NewUser, User, UserRole};

use crate::error::{PostgresError, is_unique_violation};

type UserRow = (i64, String, String, String, Option<i32>, Option<Vec<i32>>);

fn into_user(row: UserRow) -> AuthResult<User> {
    let (id, username, password_hash, role, feature_id, tag_ids) = row;
    let role: UserRole = role
        .parse()
        .map_err(|_| PostgresError::decode(format!("user {id} has unknown role {role:?}")))?;
    Ok(User {
        id,
        username,
        password_hash,
        role,
        feature_id,
        tag_ids: tag_ids.unwrap_or_default(),
    })
}

/// Inserts a user and returns its generated ID.
pub async fn insert(tx: &mut PgTransaction<'_>, user: &NewUser) -> AuthResult<i64> {
    let id: i64 = query_scalar(
        r#"INSERT INTO users (username, password_hash, user_role, feature_id, tag_ids)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id"#,
    )
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.feature_id)
    .bind(user.tag_ids.as_slice())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AuthError::user_exists(&user.username)
        } else {
            PostgresError::from(e).into()
        }
    })?;

    Ok(id)
}

/// Reads a user by username.
pub async fn find_by_username(
    tx: &mut PgTransaction<'_>,
    username: &str,
) -> AuthResult<Option<User>> {
    let row: Option<UserRow> = query_as(
        r#"SELECT id, username, password_hash, user_role, feature_id, tag_ids
           FROM users
           WHERE username = $1"#,
    )
    .bind(username)
    .fetch_optional(&mut **tx)
    .await
    .map_err(PostgresError::from)?;

    row.map(into_user).transpose()
}
