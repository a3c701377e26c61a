//! SQL for banners and their `(feature_id, tag_id)` associations.
//!
//! Every mutation runs inside one transaction. A dropped transaction rolls
//! back, so any `?` before `commit` leaves the database untouched.

use banner_core::{
    Banner, BannerContent, BannerFilter, BannerId, BannerKey, BannerPatch, FeatureId, NewBanner,
    TagId,
};
use banner_storage::StorageError;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::types::Json;
use sqlx_postgres::{PgConnection, PgPool, PgTransaction};
use time::OffsetDateTime;

use crate::error::classify;

/// One aggregated row: a banner with all of its tags.
type BannerRow = (
    BannerId,
    Vec<TagId>,
    FeatureId,
    Json<BannerContent>,
    bool,
    OffsetDateTime,
    OffsetDateTime,
);

const SELECT_BANNER: &str = r#"
    SELECT b.id,
           ARRAY_AGG(br.tag_id ORDER BY br.tag_id) AS tag_ids,
           br.feature_id,
           b.content,
           b.is_active,
           b.created_at,
           b.updated_at
      FROM banners b
      JOIN banner_references br ON br.banner_id = b.id
"#;

fn into_banner(row: BannerRow) -> Banner {
    let (id, tag_ids, feature_id, Json(content), is_active, created_at, updated_at) = row;
    Banner {
        id,
        tag_ids,
        feature_id,
        content,
        is_active,
        created_at,
        updated_at,
    }
}

async fn begin(pool: &PgPool) -> Result<PgTransaction<'static>, StorageError> {
    pool.begin().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to begin transaction");
        StorageError::transaction_error(format!("Failed to begin transaction: {e}"))
    })
}

async fn commit(tx: PgTransaction<'static>) -> Result<(), StorageError> {
    tx.commit().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to commit transaction");
        StorageError::transaction_error(format!("Failed to commit transaction: {e}"))
    })
}

/// Inserts one association row per tag.
async fn insert_references(
    conn: &mut PgConnection,
    banner_id: BannerId,
    feature_id: FeatureId,
    tag_ids: &[TagId],
) -> Result<(), StorageError> {
    query(
        "INSERT INTO banner_references (banner_id, feature_id, tag_id) \
         SELECT $1, $2, UNNEST($3::BIGINT[])",
    )
    .bind(banner_id)
    .bind(feature_id)
    .bind(tag_ids)
    .execute(conn)
    .await
    .map_err(classify)?;
    Ok(())
}

pub async fn create(pool: &PgPool, banner: &NewBanner) -> Result<BannerId, StorageError> {
    let mut tx = begin(pool).await?;

    let id: BannerId =
        query_scalar("INSERT INTO banners (content, is_active) VALUES ($1, $2) RETURNING id")
            .bind(Json(&banner.content))
            .bind(banner.is_active)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;

    insert_references(&mut *tx, id, banner.feature_id, &banner.tag_ids).await?;

    commit(tx).await?;
    Ok(id)
}

pub async fn list(pool: &PgPool, filter: &BannerFilter) -> Result<Vec<Banner>, StorageError> {
    let sql = format!(
        "{SELECT_BANNER}
         WHERE b.id IN (
               SELECT banner_id FROM banner_references
                WHERE ($1::BIGINT IS NULL OR feature_id = $1)
                  AND ($2::BIGINT IS NULL OR tag_id = $2))
         GROUP BY b.id, br.feature_id
         ORDER BY b.id
         LIMIT $3 OFFSET $4"
    );

    let rows: Vec<BannerRow> = query_as(&sql)
        .bind(filter.feature_id)
        .bind(filter.tag_id)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(pool)
        .await
        .map_err(classify)?;

    Ok(rows.into_iter().map(into_banner).collect())
}

pub async fn get(pool: &PgPool, key: BannerKey) -> Result<Option<Banner>, StorageError> {
    let sql = format!(
        "{SELECT_BANNER}
         WHERE b.id = (
               SELECT banner_id FROM banner_references
                WHERE feature_id = $1 AND tag_id = $2)
         GROUP BY b.id, br.feature_id"
    );

    let row: Option<BannerRow> = query_as(&sql)
        .bind(key.feature_id)
        .bind(key.tag_id)
        .fetch_optional(pool)
        .await
        .map_err(classify)?;

    Ok(row.map(into_banner))
}

pub async fn partial_update(
    pool: &PgPool,
    id: BannerId,
    patch: &BannerPatch,
) -> Result<(), StorageError> {
    let mut tx = begin(pool).await?;

    let touched: Option<BannerId> = query_scalar(
        "UPDATE banners
            SET content = COALESCE($2, content),
                is_active = COALESCE($3, is_active),
                updated_at = now()
          WHERE id = $1
      RETURNING id",
    )
    .bind(id)
    .bind(patch.content.as_ref().map(Json))
    .bind(patch.is_active)
    .fetch_optional(&mut *tx)
    .await
    .map_err(classify)?;

    if touched.is_none() {
        return Err(StorageError::not_found(id));
    }

    if let Some(tag_ids) = &patch.tag_ids {
        let previous: Vec<FeatureId> =
            query_scalar("DELETE FROM banner_references WHERE banner_id = $1 RETURNING feature_id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(classify)?;

        let feature_id = patch
            .feature_id
            .or_else(|| previous.first().copied())
            .ok_or_else(|| {
                StorageError::internal(format!("banner {id} has no feature association"))
            })?;

        insert_references(&mut *tx, id, feature_id, tag_ids).await?;
    } else if let Some(feature_id) = patch.feature_id {
        query("UPDATE banner_references SET feature_id = $2 WHERE banner_id = $1")
            .bind(id)
            .bind(feature_id)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
    }

    commit(tx).await
}

pub async fn delete(pool: &PgPool, id: BannerId) -> Result<(), StorageError> {
    let result = query("DELETE FROM banners WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(classify)?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found(id));
    }
    Ok(())
}
