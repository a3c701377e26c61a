//! Request parameters and their validation into domain inputs.
//!
//! JSON bodies are deserialized into these types first so that a missing field,
//! an explicit `null`, and a concrete value stay distinguishable.

use serde::{Deserialize, Deserializer};

use crate::banner::{BannerContent, BannerPatch, FeatureId, NewBanner, TagId};
use crate::error::{Result, ValidationError};

/// A JSON field that may be absent, explicitly `null`, or carry a value.
///
/// Use together with `#[serde(default)]` so a missing key becomes [`Field::Absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<T> Field<T> {
    /// Converts to `Option`, treating `null` as an error.
    pub fn into_option(self, err: ValidationError) -> Result<Option<T>> {
        match self {
            Field::Absent => Ok(None),
            Field::Null => Err(err),
            Field::Value(v) => Ok(Some(v)),
        }
    }

    /// Converts to a required value.
    pub fn required(self, err: ValidationError) -> Result<T> {
        match self {
            Field::Value(v) => Ok(v),
            Field::Absent | Field::Null => Err(err),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Field::Value(v),
            None => Field::Null,
        })
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBannerParams {
    #[serde(default)]
    pub tag_ids: Field<Vec<TagId>>,
    #[serde(default)]
    pub feature_id: Field<FeatureId>,
    #[serde(default)]
    pub content: Field<BannerContent>,
    #[serde(default)]
    pub is_active: Field<bool>,
}

impl CreateBannerParams {
    /// Validates the request. A missing `is_active` defaults to `false`.
    pub fn validate(self) -> Result<NewBanner> {
        let tag_ids = normalize_tag_ids(self.tag_ids.required(ValidationError::BadTagIds)?)?;
        let feature_id = positive(
            self.feature_id.required(ValidationError::BadFeatureId)?,
            ValidationError::BadFeatureId,
        )?;
        let content = self.content.required(ValidationError::BadContent)?;
        let is_active = self
            .is_active
            .into_option(ValidationError::BadIsActive)?
            .unwrap_or(false);

        Ok(NewBanner {
            tag_ids,
            feature_id,
            content,
            is_active,
        })
    }
}

/// Body of a partial update request. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchBannerParams {
    #[serde(default)]
    pub tag_ids: Field<Vec<TagId>>,
    #[serde(default)]
    pub feature_id: Field<FeatureId>,
    #[serde(default)]
    pub content: Field<BannerContent>,
    #[serde(default)]
    pub is_active: Field<bool>,
}

impl PatchBannerParams {
    pub fn validate(self) -> Result<BannerPatch> {
        let tag_ids = self
            .tag_ids
            .into_option(ValidationError::BadTagIds)?
            .map(normalize_tag_ids)
            .transpose()?;
        let feature_id = self
            .feature_id
            .into_option(ValidationError::BadFeatureId)?
            .map(|f| positive(f, ValidationError::BadFeatureId))
            .transpose()?;

        Ok(BannerPatch {
            tag_ids,
            feature_id,
            content: self.content.into_option(ValidationError::BadContent)?,
            is_active: self.is_active.into_option(ValidationError::BadIsActive)?,
        })
    }
}

/// Rejects empty or non-positive tag lists; returns the ids sorted and de-duplicated.
fn normalize_tag_ids(mut tag_ids: Vec<TagId>) -> Result<Vec<TagId>> {
    if tag_ids.is_empty() || tag_ids.iter().any(|&t| t <= 0) {
        return Err(ValidationError::BadTagIds);
    }
    tag_ids.sort_unstable();
    tag_ids.dedup();
    Ok(tag_ids)
}

fn positive(value: i64, err: ValidationError) -> Result<i64> {
    if value > 0 { Ok(value) } else { Err(err) }
}

/// Validates an id taken from a URL path segment.
pub fn parse_banner_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|&id| id > 0)
        .ok_or(ValidationError::BadBannerIdParam)
}
