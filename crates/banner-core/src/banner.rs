//! Banner domain model.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Result, ValidationError};

/// Server-assigned banner identifier.
pub type BannerId = i64;

/// Feature under which a banner's tags are scoped.
pub type FeatureId = i64;

/// Tag (audience segment) addressing a banner within a feature.
pub type TagId = i64;

/// Banner payload: a string-keyed JSON object, opaque to the service.
pub type BannerContent = serde_json::Map<String, serde_json::Value>;

/// A stored banner together with its full association set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    #[serde(rename = "banner_id")]
    pub id: BannerId,
    /// Sorted ascending.
    pub tag_ids: Vec<TagId>,
    pub feature_id: FeatureId,
    pub content: BannerContent,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated input for creating a banner.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBanner {
    /// Non-empty, positive, sorted and de-duplicated.
    pub tag_ids: Vec<TagId>,
    pub feature_id: FeatureId,
    pub content: BannerContent,
    pub is_active: bool,
}

/// Validated partial update. `None` means "leave unchanged".
///
/// `tag_ids`, when present, replaces the whole association set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BannerPatch {
    pub tag_ids: Option<Vec<TagId>>,
    pub feature_id: Option<FeatureId>,
    pub content: Option<BannerContent>,
    pub is_active: Option<bool>,
}

/// The `(feature_id, tag_id)` pair that addresses exactly one banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BannerKey {
    pub feature_id: FeatureId,
    pub tag_id: TagId,
}

impl BannerKey {
    /// Builds a key from caller-supplied ids, rejecting non-positive values.
    pub fn new(feature_id: FeatureId, tag_id: TagId) -> Result<Self> {
        if feature_id <= 0 {
            return Err(ValidationError::BadFeatureIdParam);
        }
        if tag_id <= 0 {
            return Err(ValidationError::BadTagIdParam);
        }
        Ok(Self { feature_id, tag_id })
    }
}

/// Optional equality filters and pagination for listing banners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BannerFilter {
    pub feature_id: Option<FeatureId>,
    pub tag_id: Option<TagId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl BannerFilter {
    /// Builds a filter; zero means "no constraint", negative values are rejected.
    pub fn new(
        feature_id: Option<i64>,
        tag_id: Option<i64>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Self> {
        Ok(Self {
            feature_id: non_negative(feature_id, ValidationError::BadFeatureIdParam)?,
            tag_id: non_negative(tag_id, ValidationError::BadTagIdParam)?,
            limit: non_negative(limit, ValidationError::BadLimitParam)?,
            offset: non_negative(offset, ValidationError::BadOffsetParam)?,
        })
    }

    /// Returns `true` if the banner passes the feature/tag constraints.
    pub fn matches(&self, banner: &Banner) -> bool {
        self.feature_id.is_none_or(|f| banner.feature_id == f)
            && self.tag_id.is_none_or(|t| banner.tag_ids.contains(&t))
    }
}

fn non_negative(value: Option<i64>, err: ValidationError) -> Result<Option<i64>> {
    match value {
        Some(v) if v < 0 => Err(err),
        Some(0) | None => Ok(None),
        Some(v) => Ok(Some(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_banner_key_rejects_non_positive_ids() {
        assert_eq!(
            BannerKey::new(0, 1),
            Err(ValidationError::BadFeatureIdParam)
        );
        assert_eq!(BannerKey::new(1, -3), Err(ValidationError::BadTagIdParam));
        assert!(BannerKey::new(3, 1).is_ok());
    }

    #[test]
    fn test_filter_zero_means_unconstrained() {
        let filter = BannerFilter::new(Some(0), Some(4), Some(0), None).unwrap();
        assert_eq!(filter.feature_id, None);
        assert_eq!(filter.tag_id, Some(4));
        assert_eq!(filter.limit, None);
        assert_eq!(filter.offset, None);
    }

    #[test]
    fn test_filter_rejects_negative_values() {
        assert_eq!(
            BannerFilter::new(None, None, Some(-1), None),
            Err(ValidationError::BadLimitParam)
        );
        assert_eq!(
            BannerFilter::new(None, None, None, Some(-5)),
            Err(ValidationError::BadOffsetParam)
        );
    }

    #[test]
    fn test_filter_matches() {
        let banner = Banner {
            id: 1,
            tag_ids: vec![1, 2, 3],
            feature_id: 7,
            content: BannerContent::new(),
            is_active: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };

        assert!(BannerFilter::default().matches(&banner));
        let filter = |f, t| BannerFilter::new(f, t, None, None).unwrap();
        assert!(filter(Some(7), Some(2)).matches(&banner));
        assert!(!filter(Some(8), None).matches(&banner));
        assert!(!filter(None, Some(4)).matches(&banner));
    }

    #[test]
    fn test_banner_serializes_with_api_field_names() {
        let mut content = BannerContent::new();
        content.insert("title".into(), json!("x"));
        let banner = Banner {
            id: 42,
            tag_ids: vec![1],
            feature_id: 3,
            content,
            is_active: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };

        let value = serde_json::to_value(&banner).unwrap();
        assert_eq!(value["banner_id"], json!(42));
        assert_eq!(value["content"]["title"], json!("x"));
        assert_eq!(value["created_at"], json!("1970-01-01T00:00:00Z"));
    }
}
