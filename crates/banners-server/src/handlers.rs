use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRef, FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::{Map, Value};

use banners_api::{
    ApiError, AuthRequest, BannerListQuery, BannerRequest, CreateBannerResponse, TokenResponse,
    UserBannerQuery,
};
use banners_auth::{AuthService, CreateUserRequest};
use banners_storage::Banner;

use crate::server::AppState;
use crate::service::{GetBannersRequest, ServiceError};

/// Header carrying the access token.
pub const TOKEN_HEADER: &str = "token";

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    pub status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Ready when both the durable store and the cache answer.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.service.store().ping().await;
    let cache = state.service.cache().ping().await;
    match (store, cache) {
        (Ok(()), Ok(())) => (StatusCode::OK, Json(HealthResponse { status: "ready" })),
        (store, cache) => {
            if let Err(e) = store {
                tracing::warn!(error = %e, "durable store not ready");
            }
            if let Err(e) = cache {
                tracing::warn!(error = %e, "cache not ready");
            }
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                }),
            )
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound => ApiError::not_found("banner not found"),
            ServiceError::InvalidInput(message) => ApiError::bad_request(message),
            ServiceError::Persistence(e) => ApiError::from(e),
        }
    }
}

fn token_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// A valid token of any role.
#[derive(Debug, Clone)]
pub struct UserToken {
    pub is_admin: bool,
}

impl<S> FromRequestParts<S> for UserToken
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token =
            token_from(&parts.headers).ok_or_else(|| ApiError::unauthorized("token required"))?;
        let auth = Arc::<AuthService>::from_ref(state);
        let is_admin = auth.is_admin(&token)?;
        Ok(Self { is_admin })
    }
}

/// A valid token with the admin role.
#[derive(Debug, Clone)]
pub struct AdminToken;

impl<S> FromRequestParts<S> for AdminToken
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("admin token required"))?;
        let auth = Arc::<AuthService>::from_ref(state);
        if !auth.is_admin(&token)? {
            tracing::debug!("admin access denied");
            return Err(ApiError::forbidden("admin access required"));
        }
        Ok(Self)
    }
}

fn bad_query(e: QueryRejection) -> ApiError {
    ApiError::bad_request(e.body_text())
}

fn bad_body(e: JsonRejection) -> ApiError {
    ApiError::bad_request(e.body_text())
}

fn bad_path(e: PathRejection) -> ApiError {
    ApiError::bad_request(e.body_text())
}

/// `GET /user_banner`: the content of one banner for `(feature, tag)`.
pub async fn user_banner(
    State(state): State<AppState>,
    user: UserToken,
    query: Result<Query<UserBannerQuery>, QueryRejection>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let Query(query) = query.map_err(bad_query)?;
    let banner = state
        .service
        .get_one_banner(
            query.feature_id,
            query.tag_id,
            user.is_admin,
            query.use_last_revision,
        )
        .await?;
    Ok(Json(banner.content))
}

/// `GET /banner`: filtered, paginated listing for admins.
pub async fn list_banners(
    State(state): State<AppState>,
    _admin: AdminToken,
    query: Result<Query<BannerListQuery>, QueryRejection>,
) -> Result<Json<Vec<Banner>>, ApiError> {
    let Query(query) = query.map_err(bad_query)?;
    let request = GetBannersRequest {
        feature: query.feature_id.into(),
        tag_ids: query.tag_id.into_iter().collect(),
        is_admin: true,
        use_last_revision: true,
        offset: query.offset,
        limit: query.limit,
    };
    let banners = state.service.get_banners(&request).await?;
    Ok(Json(banners))
}

/// `POST /banner`
pub async fn create_banner(
    State(state): State<AppState>,
    _admin: AdminToken,
    body: Result<Json<BannerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(bad_body)?;
    let banner = state.service.create_banner(body.into_new_banner()?).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateBannerResponse {
            banner_id: banner.id,
        }),
    ))
}

/// `PATCH /banner/{id}`: full replace of the mutable fields.
pub async fn update_banner(
    State(state): State<AppState>,
    _admin: AdminToken,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<BannerRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id.map_err(bad_path)?;
    let Json(body) = body.map_err(bad_body)?;
    state
        .service
        .update_banner(id, body.into_new_banner()?)
        .await?;
    Ok(StatusCode::OK)
}

/// `DELETE /banner/{id}`
pub async fn delete_banner(
    State(state): State<AppState>,
    _admin: AdminToken,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id.map_err(bad_path)?;
    state.service.delete_banner(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /auth`: exchanges credentials for a token.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(body) = body.map_err(bad_body)?;
    let token = state.auth.login(&body.username, &body.password).await?;
    Ok(Json(TokenResponse { token }))
}

/// `POST /user`: registers an account. Creating an admin needs an admin
/// token, taken from the body or the `token` header.
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(mut body) = body.map_err(bad_body)?;
    if body.token.is_none() {
        body.token = token_from(&headers);
    }
    let token = state.auth.create_user(body).await?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_header_is_trimmed() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from(&headers), None);

        headers.insert(TOKEN_HEADER, HeaderValue::from_static("  "));
        assert_eq!(token_from(&headers), None);

        headers.insert(TOKEN_HEADER, HeaderValue::from_static(" abc "));
        assert_eq!(token_from(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn service_errors_map_to_status() {
        assert_eq!(
            ApiError::from(ServiceError::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ServiceError::InvalidInput("x".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ServiceError::Persistence(
                banners_storage::StorageError::connection_error("down")
            ))
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
