use thiserror::Error;

/// Input rejected before it reaches a storage backend.
///
/// The display strings are part of the HTTP contract: they are returned verbatim
/// in `{"error": "..."}` bodies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("bad tag_ids field")]
    BadTagIds,

    #[error("bad feature_id field")]
    BadFeatureId,

    #[error("bad content field")]
    BadContent,

    #[error("bad is_active field")]
    BadIsActive,

    #[error("bad banner id parameter")]
    BadBannerIdParam,

    #[error("bad feature id parameter")]
    BadFeatureIdParam,

    #[error("bad tag id parameter")]
    BadTagIdParam,

    #[error("bad limit parameter")]
    BadLimitParam,

    #[error("bad offset parameter")]
    BadOffsetParam,

    #[error("read request body error")]
    MalformedBody,
}

pub type Result<T> = std::result::Result<T, ValidationError>;
