//! Banner types shared by the durable store and the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageError;

/// A banner as stored in the durable store and mirrored into the cache.
///
/// The serialized form is both the HTTP representation and the cache payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    /// Assigned by the durable store on creation, immutable thereafter.
    #[serde(rename = "banner_id")]
    pub id: i64,
    pub feature_id: i32,
    pub tag_ids: Vec<i32>,
    pub is_active: bool,
    /// Opaque to the serving logic.
    pub content: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Banner {
    /// Builds a stored banner from caller-supplied fields.
    #[must_use]
    pub fn from_new(
        id: i64,
        banner: NewBanner,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            feature_id: banner.feature_id,
            tag_ids: banner.tag_ids,
            is_active: banner.is_active,
            content: banner.content,
            created_at,
            updated_at,
        }
    }

    /// Returns `true` if this banner is addressed by `(feature, tag)`.
    #[must_use]
    pub fn serves(&self, feature_id: i32, tag_id: i32) -> bool {
        self.feature_id == feature_id && self.tag_ids.contains(&tag_id)
    }

    /// Cache index keys this banner belongs to, one per tag.
    pub fn index_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.tag_ids
            .iter()
            .map(move |tag| index_key(self.feature_id, *tag))
    }
}

/// Caller-supplied banner fields for create and full-replace update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBanner {
    pub feature_id: i32,
    pub tag_ids: Vec<i32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub content: Map<String, Value>,
}

fn default_active() -> bool {
    true
}

impl NewBanner {
    /// Creates a new active banner with empty content.
    #[must_use]
    pub fn new(feature_id: i32, tag_ids: impl Into<Vec<i32>>) -> Self {
        Self {
            feature_id,
            tag_ids: tag_ids.into(),
            is_active: true,
            content: Map::new(),
        }
    }

    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: Map<String, Value>) -> Self {
        self.content = content;
        self
    }

    /// Checks the banner invariants and normalizes the tag set.
    ///
    /// A banner belongs to exactly one feature and one or more tags. Tags form
    /// a set, so duplicates are collapsed and the order is fixed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidBanner` if the tag set is empty or an
    /// identifier is negative.
    pub fn validate(mut self) -> Result<Self, StorageError> {
        if self.feature_id < 0 {
            return Err(StorageError::invalid_banner("feature_id must not be negative"));
        }
        if self.tag_ids.is_empty() {
            return Err(StorageError::invalid_banner("tag_ids must not be empty"));
        }
        if self.tag_ids.iter().any(|tag| *tag < 0) {
            return Err(StorageError::invalid_banner("tag_ids must not be negative"));
        }
        self.tag_ids.sort_unstable();
        self.tag_ids.dedup();
        Ok(self)
    }
}

/// Feature selector for durable store queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureFilter {
    /// Every feature. Used by the refresh loop and by admin listing.
    #[default]
    All,
    /// A single feature.
    Only(i32),
}

impl FeatureFilter {
    /// The feature ID, or `None` for the wildcard.
    #[must_use]
    pub fn as_option(self) -> Option<i32> {
        match self {
            Self::All => None,
            Self::Only(id) => Some(id),
        }
    }

    #[must_use]
    pub fn matches(self, feature_id: i32) -> bool {
        match self {
            Self::All => true,
            Self::Only(id) => id == feature_id,
        }
    }
}

impl From<Option<i32>> for FeatureFilter {
    fn from(value: Option<i32>) -> Self {
        value.map_or(Self::All, Self::Only)
    }
}

/// Filter for durable store queries.
///
/// Results are ordered by ID ascending. `offset` and `limit` are applied only
/// when non-zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BannerFilter {
    pub feature: FeatureFilter,
    /// Matches banners whose tag set intersects this one. Empty means any tag.
    pub tag_ids: Vec<i32>,
    pub only_active: bool,
    pub offset: u32,
    pub limit: u32,
}

impl BannerFilter {
    #[must_use]
    pub fn new(feature: FeatureFilter) -> Self {
        Self {
            feature,
            ..Default::default()
        }
    }

    /// The entire catalog, active and inactive.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tags(mut self, tag_ids: Vec<i32>) -> Self {
        self.tag_ids = tag_ids;
        self
    }

    #[must_use]
    pub fn only_active(mut self, only_active: bool) -> Self {
        self.only_active = only_active;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Returns `true` if the banner passes the feature, tag and activity
    /// predicates. Pagination is not considered.
    #[must_use]
    pub fn matches(&self, banner: &Banner) -> bool {
        if !self.feature.matches(banner.feature_id) {
            return false;
        }
        if !self.tag_ids.is_empty() && !self.tag_ids.iter().any(|t| banner.tag_ids.contains(t)) {
            return false;
        }
        !self.only_active || banner.is_active
    }

    /// `LIMIT` value, `None` when no limit applies.
    #[must_use]
    pub fn limit_opt(&self) -> Option<u32> {
        (self.limit != 0).then_some(self.limit)
    }
}

/// Cache key of a banner payload.
#[must_use]
pub fn payload_key(banner_id: i64) -> String {
    format!("banner:{banner_id}")
}

/// Cache key of the index set for a `(feature, tag)` pair.
#[must_use]
pub fn index_key(feature_id: i32, tag_id: i32) -> String {
    format!("feature:{feature_id}:tag:{tag_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn banner(id: i64, feature: i32, tags: &[i32], active: bool) -> Banner {
        let now = Utc::now();
        Banner::from_new(
            id,
            NewBanner::new(feature, tags.to_vec()).with_active(active),
            now,
            now,
        )
    }

    #[test]
    fn test_validate_normalizes_tags() {
        let b = NewBanner::new(5, vec![3, 1, 3, 2]).validate().unwrap();
        assert_eq!(b.tag_ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_validate_rejects_empty_tags() {
        let err = NewBanner::new(5, Vec::new()).validate().unwrap_err();
        assert!(matches!(err, StorageError::InvalidBanner { .. }));
    }

    #[test]
    fn test_validate_rejects_negative_ids() {
        assert!(NewBanner::new(-1, vec![1]).validate().is_err());
        assert!(NewBanner::new(1, vec![-4]).validate().is_err());
    }

    #[test]
    fn test_filter_tag_overlap() {
        let b = banner(1, 5, &[2, 6], true);
        assert!(BannerFilter::all().with_tags(vec![6, 9]).matches(&b));
        assert!(!BannerFilter::all().with_tags(vec![7, 9]).matches(&b));
        assert!(BannerFilter::all().matches(&b));
    }

    #[test]
    fn test_filter_feature_and_activity() {
        let inactive = banner(1, 3, &[2], false);
        assert!(!BannerFilter::new(FeatureFilter::Only(5)).matches(&inactive));
        assert!(BannerFilter::new(FeatureFilter::Only(3)).matches(&inactive));
        assert!(
            !BannerFilter::new(FeatureFilter::Only(3))
                .only_active(true)
                .matches(&inactive)
        );
    }

    #[test]
    fn test_zero_limit_means_unbounded() {
        assert_eq!(BannerFilter::all().limit_opt(), None);
        assert_eq!(BannerFilter::all().with_limit(3).limit_opt(), Some(3));
    }

    #[test]
    fn test_feature_filter_from_option() {
        assert_eq!(FeatureFilter::from(None), FeatureFilter::All);
        assert_eq!(FeatureFilter::from(Some(4)), FeatureFilter::Only(4));
        assert_eq!(FeatureFilter::Only(4).as_option(), Some(4));
    }

    #[test]
    fn test_keys() {
        let b = banner(7, 5, &[1, 2], true);
        assert_eq!(payload_key(b.id), "banner:7");
        let keys: Vec<_> = b.index_keys().collect();
        assert_eq!(keys, vec!["feature:5:tag:1", "feature:5:tag:2"]);
        assert!(b.serves(5, 2));
        assert!(!b.serves(3, 2));
    }

    #[test]
    fn test_wire_field_names() {
        let mut content = Map::new();
        content.insert("title".into(), json!("t"));
        let mut b = banner(9, 5, &[1], true);
        b.content = content;
        let value = serde_json::to_value(&b).unwrap();
        assert_eq!(value["banner_id"], 9);
        assert_eq!(value["is_active"], true);
        assert_eq!(value["content"]["title"], "t");

        let back: Banner = serde_json::from_value(value).unwrap();
        assert_eq!(back, b);
    }
}
