use std::sync::Arc;
use std::time::Duration;

use coachbase_core::cache::Cache;
use coachbase_core::coaching::FocusArea;
use coachbase_core::entity::Entity;
use coachbase_core::storage::{DeleteOutcome, RepositoryError, Result, StorageClient};

use super::Repository;
use crate::transaction::TransactionCoordinator;

pub const FOCUS_AREAS_TABLE: &str = "focus_areas";

/// Storage for a user's focus areas.
pub struct FocusAreaRepository<S: StorageClient> {
    base: Repository<FocusArea, S>,
}

impl<S: StorageClient> FocusAreaRepository<S> {
    pub fn new(coordinator: Arc<TransactionCoordinator<S>>) -> Self {
        Self {
            base: Repository::new(FOCUS_AREAS_TABLE, coordinator),
        }
    }

    pub fn with_read_cache(mut self, cache: Arc<dyn Cache>, ttl: Option<Duration>) -> Self {
        self.base = self.base.with_read_cache(cache, ttl);
        self
    }

    pub fn base(&self) -> &Repository<FocusArea, S> {
        &self.base
    }

    pub async fn find_by_id(&self, id: &str, throw_if_not_found: bool) -> Result<Option<FocusArea>> {
        self.base.find_by_id(id, throw_if_not_found).await
    }

    pub async fn save(&self, focus_area: FocusArea) -> Result<FocusArea> {
        self.base.save(focus_area).await
    }

    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        self.base.delete(id).await
    }

    /// Creates a focus area for a user.
    pub async fn create(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<FocusArea> {
        self.base
            .validate_required_params("create", &[("user_id", Some(user_id)), ("name", Some(name))])?;
        let user_id = self.base.validate_id("create", user_id)?;

        let mut focus_area = FocusArea::new(user_id, name.trim());
        if let Some(description) = description {
            focus_area = focus_area.with_description(description);
        }
        self.base.save(focus_area).await
    }

    /// A user's focus areas, archived ones included, oldest first.
    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<FocusArea>> {
        let user_id = self.base.validate_id("find_by_user", user_id)?;
        let mut focus_areas = self
            .base
            .find_where("user_id", user_id.to_string())
            .await?;
        focus_areas.sort_by_key(|focus_area| focus_area.created_at);
        Ok(focus_areas)
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<FocusArea> {
        let mut focus_area = self.base.get(id).await?;
        focus_area
            .rename(name)
            .map_err(|e| RepositoryError::validation(FocusArea::ENTITY_TYPE, "rename", e.to_string()))?;
        self.base.save(focus_area).await
    }

    /// Archives a focus area. Archiving an archived focus area is a no-op
    /// write that publishes nothing.
    pub async fn archive(&self, id: &str) -> Result<FocusArea> {
        let mut focus_area = self.base.get(id).await?;
        focus_area.archive();
        self.base.save(focus_area).await
    }
}
