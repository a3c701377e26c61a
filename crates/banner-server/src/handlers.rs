use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use banner_api::{ApiError, CreatedBanner};
use banner_core::{
    BannerFilter, BannerKey, CreateBannerParams, PatchBannerParams, ValidationError,
    parse_banner_id,
};
use serde::Serialize;

use crate::cache::Outcome;
use crate::middleware::Principal;
use crate::resolver::Audience;
use crate::server::AppState;

pub const USE_LAST_REVISION_PARAM: &str = "use_last_revision";

/// An integer query parameter and the error reported when it does not parse.
struct IntParam {
    name: &'static str,
    invalid: ValidationError,
}

const FEATURE_ID: IntParam = IntParam {
    name: "feature_id",
    invalid: ValidationError::BadFeatureIdParam,
};
const TAG_ID: IntParam = IntParam {
    name: "tag_id",
    invalid: ValidationError::BadTagIdParam,
};
const LIMIT: IntParam = IntParam {
    name: "limit",
    invalid: ValidationError::BadLimitParam,
};
const OFFSET: IntParam = IntParam {
    name: "offset",
    invalid: ValidationError::BadOffsetParam,
};

type QueryParams = HashMap<String, String>;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

#[derive(Serialize)]
pub struct ReadinessResponse<'a> {
    status: &'a str,
    storage: &'a str,
    storage_ok: bool,
    cache: &'a str,
    redis_available: bool,
    cache_entries: usize,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready once storage answers. A Redis outage only degrades the cache to
/// process-local, so it is reported but does not fail readiness.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let storage_ok = match state.storage.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Storage is not reachable");
            false
        }
    };

    let backend = state.cache.backend();
    let stats = backend.stats();
    let body = ReadinessResponse {
        status: if storage_ok { "ready" } else { "unavailable" },
        storage: state.storage.backend_name(),
        storage_ok,
        cache: stats.mode,
        redis_available: backend.is_redis_available().await,
        cache_entries: stats.l1_entries,
    };
    let status = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

// ---- Query parsing ----

fn required_i64(params: &QueryParams, param: &IntParam) -> Result<i64, ApiError> {
    params
        .get(param.name)
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| param.invalid.clone().into())
}

/// An empty value counts as absent.
fn optional_i64(params: &QueryParams, param: &IntParam) -> Result<Option<i64>, ApiError> {
    match params.get(param.name).map(String::as_str) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| param.invalid.clone().into()),
    }
}

/// `use_last_revision` bypasses the cache unless it is explicitly `false`.
fn wants_last_revision(params: &QueryParams) -> bool {
    params
        .get(USE_LAST_REVISION_PARAM)
        .is_some_and(|v| !v.eq_ignore_ascii_case("false"))
}

fn outcome_response(outcome: Outcome) -> Result<Response, ApiError> {
    let status = StatusCode::from_u16(outcome.status_code)
        .map_err(|e| ApiError::internal(format!("cached outcome has bad status: {e}")))?;
    Ok(match outcome.body {
        Some(body) => (status, Json(body)).into_response(),
        None => status.into_response(),
    })
}

// ---- Banner routes ----

pub async fn user_banner(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let tag_id = required_i64(&params, &TAG_ID)?;
    let feature_id = required_i64(&params, &FEATURE_ID)?;
    let key = BannerKey::new(feature_id, tag_id)?;

    let outcome = state
        .resolver
        .lookup(
            key,
            Audience::from_admin_flag(principal.is_admin),
            wants_last_revision(&params),
        )
        .await?;
    outcome_response(outcome)
}

pub async fn list_banners(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let filter = BannerFilter::new(
        optional_i64(&params, &FEATURE_ID)?,
        optional_i64(&params, &TAG_ID)?,
        optional_i64(&params, &LIMIT)?,
        optional_i64(&params, &OFFSET)?,
    )?;

    let banners = state.service.list(&filter).await?;
    Ok((StatusCode::OK, Json(banners)).into_response())
}

pub async fn create_banner(
    State(state): State<AppState>,
    payload: Result<Json<CreateBannerParams>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(params) = payload.map_err(body_error)?;
    let banner_id = state.service.create(params).await?;
    let body = Json(CreatedBanner { banner_id });
    Ok((StatusCode::CREATED, body).into_response())
}

pub async fn patch_banner(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PatchBannerParams>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_banner_id(&id)?;
    let Json(params) = payload.map_err(body_error)?;
    state.service.partial_update(id, params).await?;
    Ok(StatusCode::OK.into_response())
}

pub async fn delete_banner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_banner_id(&id)?;
    state.service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

fn body_error(rejection: JsonRejection) -> ApiError {
    tracing::debug!(error = %rejection, "Rejected request body");
    ValidationError::MalformedBody.into()
}
