//! Banner table statements.
//!
//! Every function runs inside the caller's transaction.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::types::Json;
use sqlx_postgres::PgTransaction;

use banners_storage::{Banner, BannerFilter, NewBanner, StorageError};

use crate::error::PostgresError;

type BannerRow = (
    i64,
    i32,
    Vec<i32>,
    bool,
    Json<Map<String, Value>>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn into_banner(row: BannerRow) -> Banner {
    let (id, feature_id, tag_ids, is_active, Json(content), created_at, updated_at) = row;
    Banner {
        id,
        feature_id,
        tag_ids,
        is_active,
        content,
        created_at,
        updated_at,
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, feature_id, tag_ids, is_active, content, created_at, updated_at FROM banners";

/// Inserts a banner and returns its generated ID.
pub async fn insert(
    tx: &mut PgTransaction<'_>,
    banner: &NewBanner,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Result<i64, StorageError> {
    let id: i64 = query_scalar(
        r#"INSERT INTO banners (feature_id, tag_ids, is_active, content, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id"#,
    )
    .bind(banner.feature_id)
    .bind(banner.tag_ids.as_slice())
    .bind(banner.is_active)
    .bind(Json(&banner.content))
    .bind(created_at)
    .bind(updated_at)
    .fetch_one(&mut **tx)
    .await
    .map_err(PostgresError::from)?;

    Ok(id)
}

/// Replaces the mutable fields of banner `id`.
pub async fn update(
    tx: &mut PgTransaction<'_>,
    id: i64,
    banner: &NewBanner,
    updated_at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let result = query(
        r#"UPDATE banners
           SET feature_id = $2, tag_ids = $3, is_active = $4, content = $5, updated_at = $6
           WHERE id = $1"#,
    )
    .bind(id)
    .bind(banner.feature_id)
    .bind(banner.tag_ids.as_slice())
    .bind(banner.is_active)
    .bind(Json(&banner.content))
    .bind(updated_at)
    .execute(&mut **tx)
    .await
    .map_err(PostgresError::from)?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("banner", id));
    }
    Ok(())
}

/// Deletes banner `id`.
pub async fn delete(tx: &mut PgTransaction<'_>, id: i64) -> Result<(), StorageError> {
    let result = query("DELETE FROM banners WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(PostgresError::from)?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("banner", id));
    }
    Ok(())
}

/// Reads banner `id`.
pub async fn get(tx: &mut PgTransaction<'_>, id: i64) -> Result<Option<Banner>, StorageError> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = $1");
    let row: Option<BannerRow> = query_as(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(PostgresError::from)?;

    Ok(row.map(into_banner))
}

/// Returns banners matching `filter`, ordered by ID.
///
/// A NULL feature matches every feature, an empty tag array matches every
/// tag set, and a NULL limit returns every row after the offset.
pub async fn select(
    tx: &mut PgTransaction<'_>,
    filter: &BannerFilter,
) -> Result<Vec<Banner>, StorageError> {
    let sql = format!(
        r#"{SELECT_COLUMNS}
           WHERE ($1::int4 IS NULL OR feature_id = $1)
             AND (cardinality($2::int4[]) = 0 OR tag_ids && $2)
             AND (NOT $3 OR is_active)
           ORDER BY id ASC
           OFFSET $4
           LIMIT $5"#
    );

    let rows: Vec<BannerRow> = query_as(&sql)
        .bind(filter.feature.as_option())
        .bind(filter.tag_ids.as_slice())
        .bind(filter.only_active)
        .bind(i64::from(filter.offset))
        .bind(filter.limit_opt().map(i64::from))
        .fetch_all(&mut **tx)
        .await
        .map_err(PostgresError::from)?;

    Ok(rows.into_iter().map(into_banner).collect())
}
