//! Request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use banners_storage::NewBanner;

use crate::ApiError;

/// Body of `POST /banner` and `PATCH /banner/{id}`.
///
/// Both are full writes of the banner's mutable fields: `feature_id` and
/// `tag_ids` are required, `is_active` defaults to `true` and `content` to an
/// empty object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BannerRequest {
    pub feature_id: Option<i32>,
    pub tag_ids: Option<Vec<i32>>,
    pub is_active: Option<bool>,
    pub content: Option<Map<String, Value>>,
}

impl BannerRequest {
    /// Converts into a validated banner.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for a missing field or a banner that
    /// violates the catalog invariants.
    pub fn into_new_banner(self) -> Result<NewBanner, ApiError> {
        let feature_id = self
            .feature_id
            .ok_or_else(|| ApiError::bad_request("feature_id is required"))?;
        let tag_ids = self
            .tag_ids
            .ok_or_else(|| ApiError::bad_request("tag_ids is required"))?;

        NewBanner::new(feature_id, tag_ids)
            .with_active(self.is_active.unwrap_or(true))
            .with_content(self.content.unwrap_or_default())
            .validate()
            .map_err(ApiError::from)
    }
}

/// Body of a successful `POST /banner`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateBannerResponse {
    pub banner_id: i64,
}

/// Body of `POST /auth`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

/// Body of a successful `POST /auth` or `POST /user`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
}

/// Query of `GET /user_banner`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBannerQuery {
    pub feature_id: i32,
    pub tag_id: i32,
    #[serde(default)]
    pub use_last_revision: bool,
}

/// Query of `GET /banner`. Absent fields do not filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BannerListQuery {
    pub feature_id: Option<i32>,
    pub tag_id: Option<i32>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub limit: u32,
}
