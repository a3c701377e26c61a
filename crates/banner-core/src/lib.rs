//! Core banner types shared by the storage backends and the HTTP service.
//!
//! A banner is an opaque JSON object addressed by a `(feature_id, tag_id)` pair.
//! This crate owns the domain model and the validation that turns loosely typed
//! request parameters into well-formed storage inputs.

pub mod banner;
pub mod error;
pub mod params;

pub use banner::{
    Banner, BannerContent, BannerFilter, BannerId, BannerKey, BannerPatch, FeatureId, NewBanner,
    TagId,
};
pub use error::{Result, ValidationError};
pub use params::{CreateBannerParams, Field, PatchBannerParams, parse_banner_id};
