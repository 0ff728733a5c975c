//! PostgreSQL-backed implementations of the render crate's seams.

use async_trait::async_trait;

use renderhub_core::result::AppResult;
use renderhub_core::types::id::DesignId;
use renderhub_database::repositories::DesignRepository;
use renderhub_entity::design::{DesignRecord, DesignRenderPatch};
use renderhub_render::DesignStore;

/// Design store over the `designs` table.
#[derive(Debug, Clone)]
pub struct PgDesignStore {
    repo: DesignRepository,
}

impl PgDesignStore {
    /// Wrap a design repository.
    pub fn new(repo: DesignRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl DesignStore for PgDesignStore {
    async fn find_design(&self, id: DesignId) -> AppResult<Option<DesignRecord>> {
        self.repo.find_by_id(id).await
    }

    async fn update_design(
        &self,
        id: DesignId,
        patch: &DesignRenderPatch,
    ) -> AppResult<DesignRecord> {
        self.repo.apply_render_patch(id, patch).await
    }
}
