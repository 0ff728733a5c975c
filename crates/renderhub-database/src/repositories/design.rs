//! Design repository: read a design for rendering, write back the render patch.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use renderhub_core::error::{AppError, ErrorKind};
use renderhub_core::result::AppResult;
use renderhub_core::types::id::{BrandId, DesignId, ProductId};
use renderhub_entity::design::{DesignOptions, DesignRecord, DesignRenderPatch, DesignStatus};

/// Raw row; the status column is read as text so externally owned enum
/// types and plain text columns both decode.
#[derive(Debug, FromRow)]
struct DesignRow {
    id: Uuid,
    product_id: Option<Uuid>,
    brand_id: Option<Uuid>,
    status: String,
    product_model_url: Option<String>,
    high_res_url: Option<String>,
    options: Option<serde_json::Value>,
    gltf_url: Option<String>,
    stl_url: Option<String>,
    obj_url: Option<String>,
    usdz_url: Option<String>,
    metadata: Option<serde_json::Value>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<DesignRow> for DesignRecord {
    fn from(row: DesignRow) -> Self {
        Self {
            id: DesignId::from_uuid(row.id),
            product_id: row.product_id.map(ProductId::from_uuid),
            brand_id: row.brand_id.map(BrandId::from_uuid),
            status: DesignStatus::parse(&row.status),
            product_model_url: row.product_model_url,
            high_res_url: row.high_res_url,
            options: DesignOptions::from_json(row.options),
            gltf_url: row.gltf_url,
            stl_url: row.stl_url,
            obj_url: row.obj_url,
            usdz_url: row.usdz_url,
            metadata: row
                .metadata
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
            updated_at: row.updated_at,
        }
    }
}

const SELECT_DESIGN: &str = "SELECT d.id, d.product_id, d.brand_id, d.status::text AS status, \
     p.model_url AS product_model_url, d.high_res_url, d.options, \
     d.gltf_url, d.stl_url, d.obj_url, d.usdz_url, d.metadata, d.updated_at \
     FROM designs d LEFT JOIN products p ON p.id = d.product_id \
     WHERE d.id = $1";

/// Repository for the design records the pipeline renders.
#[derive(Debug, Clone)]
pub struct DesignRepository {
    pool: PgPool,
}

impl DesignRepository {
    /// Create a new design repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a design with its product's base mesh URL.
    pub async fn find_by_id(&self, id: DesignId) -> AppResult<Option<DesignRecord>> {
        let row = sqlx::query_as::<_, DesignRow>(SELECT_DESIGN)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find design", e))?;
        Ok(row.map(DesignRecord::from))
    }

    /// Apply a render patch: set one format URL column and replace
    /// `metadata.render`, leaving other metadata keys untouched.
    pub async fn apply_render_patch(
        &self,
        id: DesignId,
        patch: &DesignRenderPatch,
    ) -> AppResult<DesignRecord> {
        let metadata = serde_json::to_value(&patch.metadata)?;
        // Column names come from a closed enum, never from input.
        let sql = format!(
            "UPDATE designs SET {column} = $2, \
             metadata = jsonb_set(COALESCE(metadata, '{{}}'::jsonb), '{{render}}', $3, true), \
             updated_at = NOW() WHERE id = $1",
            column = patch.field.column()
        );

        let result = sqlx::query(&sql)
            .bind(id.into_uuid())
            .bind(&patch.url)
            .bind(&metadata)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update design", e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Design {id} not found")));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Design {id} not found")))
    }
}
