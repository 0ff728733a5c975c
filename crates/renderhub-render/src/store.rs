//! Design persistence as seen by the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use renderhub_core::types::id::DesignId;
use renderhub_core::{AppError, AppResult};
use renderhub_entity::design::{DesignRecord, DesignRenderPatch};

/// Find and patch design records.
#[async_trait]
pub trait DesignStore: Send + Sync + std::fmt::Debug + 'static {
    /// Load a design, `None` when absent.
    async fn find_design(&self, id: DesignId) -> AppResult<Option<DesignRecord>>;

    /// Apply a render patch and return the updated record.
    async fn update_design(&self, id: DesignId, patch: &DesignRenderPatch) -> AppResult<DesignRecord>;
}

/// In-process store for tests and the CLI dry run.
#[derive(Debug, Clone, Default)]
pub struct MemoryDesignStore {
    designs: Arc<RwLock<HashMap<DesignId, DesignRecord>>>,
}

impl MemoryDesignStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a design.
    pub async fn insert(&self, design: DesignRecord) {
        self.designs.write().await.insert(design.id, design);
    }

    /// Current copy of a design.
    pub async fn get(&self, id: DesignId) -> Option<DesignRecord> {
        self.designs.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl DesignStore for MemoryDesignStore {
    async fn find_design(&self, id: DesignId) -> AppResult<Option<DesignRecord>> {
        Ok(self.get(id).await)
    }

    async fn update_design(&self, id: DesignId, patch: &DesignRenderPatch) -> AppResult<DesignRecord> {
        let mut designs = self.designs.write().await;
        let design = designs
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Design {id} not found")))?;
        design.apply_render_patch(patch)?;
        Ok(design.clone())
    }
}
