use std::sync::Arc;
use std::time::Duration;

use coachbase_core::cache::Cache;
use coachbase_core::coaching::{Challenge, ChallengeError, FocusArea};
use coachbase_core::entity::Entity;
use coachbase_core::storage::{DeleteOutcome, RepositoryError, Result, StorageClient};

use super::{Repository, FOCUS_AREAS_TABLE};
use crate::transaction::TransactionCoordinator;

pub const CHALLENGES_TABLE: &str = "challenges";

/// Storage for challenges. Reads focus areas to check ownership on create.
pub struct ChallengeRepository<S: StorageClient> {
    base: Repository<Challenge, S>,
    focus_areas: Repository<FocusArea, S>,
}

impl<S: StorageClient> ChallengeRepository<S> {
    pub fn new(coordinator: Arc<TransactionCoordinator<S>>) -> Self {
        Self {
            base: Repository::new(CHALLENGES_TABLE, coordinator.clone()),
            focus_areas: Repository::new(FOCUS_AREAS_TABLE, coordinator),
        }
    }

    pub fn with_read_cache(mut self, cache: Arc<dyn Cache>, ttl: Option<Duration>) -> Self {
        self.base = self.base.with_read_cache(cache, ttl);
        self
    }

    pub fn base(&self) -> &Repository<Challenge, S> {
        &self.base
    }

    pub async fn find_by_id(&self, id: &str, throw_if_not_found: bool) -> Result<Option<Challenge>> {
        self.base.find_by_id(id, throw_if_not_found).await
    }

    pub async fn save(&self, challenge: Challenge) -> Result<Challenge> {
        self.base.save(challenge).await
    }

    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        self.base.delete(id).await
    }

    /// Creates an active challenge in one of the user's focus areas.
    ///
    /// The focus area must exist, belong to `user_id` and not be archived.
    pub async fn create(
        &self,
        user_id: &str,
        focus_area_id: &str,
        title: &str,
        points: u32,
    ) -> Result<Challenge> {
        self.base.validate_required_params(
            "create",
            &[
                ("user_id", Some(user_id)),
                ("focus_area_id", Some(focus_area_id)),
                ("title", Some(title)),
            ],
        )?;
        let user_id = self.base.validate_id("create", user_id)?;
        let focus_area_id = self.base.validate_id("create", focus_area_id)?;

        let focus_area = self.focus_areas.get(&focus_area_id.to_string()).await?;
        if focus_area.user_id != user_id {
            return Err(invalid("create", "focus area belongs to another user"));
        }
        if focus_area.archived {
            return Err(invalid("create", "focus area is archived"));
        }

        let challenge = Challenge::new(user_id, focus_area_id, title.trim(), points);
        self.base.save(challenge).await
    }

    /// Challenges in a focus area, oldest first.
    pub async fn find_by_focus_area(&self, focus_area_id: &str) -> Result<Vec<Challenge>> {
        let focus_area_id = self.base.validate_id("find_by_focus_area", focus_area_id)?;
        let mut challenges = self
            .base
            .find_where("focus_area_id", focus_area_id.to_string())
            .await?;
        challenges.sort_by_key(|challenge| challenge.created_at);
        Ok(challenges)
    }

    pub async fn complete(&self, id: &str) -> Result<Challenge> {
        let mut challenge = self.base.get(id).await?;
        challenge.complete().map_err(|e| transition_error("complete", e))?;
        self.base.save(challenge).await
    }

    pub async fn abandon(&self, id: &str) -> Result<Challenge> {
        let mut challenge = self.base.get(id).await?;
        challenge.abandon().map_err(|e| transition_error("abandon", e))?;
        self.base.save(challenge).await
    }
}

fn invalid(operation: &'static str, message: &str) -> RepositoryError {
    RepositoryError::validation(Challenge::ENTITY_TYPE, operation, message)
}

fn transition_error(operation: &'static str, error: ChallengeError) -> RepositoryError {
    RepositoryError::validation(Challenge::ENTITY_TYPE, operation, error.to_string())
}
