use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::cache::CacheScope;
use crate::entity::{Entity, EventQueue, HasDomainEvents};

use super::events::{
    CHALLENGE_ABANDONED, CHALLENGE_COMPLETED, CHALLENGE_CREATED, FOCUS_AREA_ARCHIVED,
    FOCUS_AREA_CREATED, FOCUS_AREA_UPDATED,
};
use super::{ChallengeError, FocusAreaError};

const MAX_FOCUS_AREA_NAME: usize = 100;
const MAX_CHALLENGE_TITLE: usize = 200;

/// An area of life a user wants to improve, e.g. "Sleep" or "Deep work".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusArea {
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// 1 (highest) to 5 (lowest).
    pub priority: u8,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: EventQueue,
}

impl FocusArea {
    /// Creates a new focus area and queues `FOCUS_AREA_CREATED`.
    pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut focus_area = Self {
            id: None,
            user_id,
            name: name.into(),
            description: None,
            priority: 3,
            archived: false,
            created_at: now,
            updated_at: now,
            events: EventQueue::new(),
        };
        let payload = json!({
            "userId": user_id,
            "name": focus_area.name,
            "priority": focus_area.priority,
        });
        focus_area.add_domain_event(FOCUS_AREA_CREATED, payload);
        focus_area
    }

    /// Sets the description without queuing an event.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets a specific ID for this focus area (useful for testing).
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Renames the focus area. Renaming to the current name is a no-op.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), FocusAreaError> {
        let name = name.into();
        validate_focus_area_name(&name)?;
        self.ensure_not_archived()?;
        if name == self.name {
            return Ok(());
        }

        let previous = std::mem::replace(&mut self.name, name);
        self.touch();
        let payload = json!({
            "userId": self.user_id,
            "changes": {"name": {"from": previous, "to": self.name}},
        });
        self.add_domain_event(FOCUS_AREA_UPDATED, payload);
        Ok(())
    }

    /// Changes the priority (1 to 5).
    pub fn set_priority(&mut self, priority: u8) -> Result<(), FocusAreaError> {
        validate_priority(priority)?;
        self.ensure_not_archived()?;
        if priority == self.priority {
            return Ok(());
        }

        let previous = std::mem::replace(&mut self.priority, priority);
        self.touch();
        let payload = json!({
            "userId": self.user_id,
            "changes": {"priority": {"from": previous, "to": priority}},
        });
        self.add_domain_event(FOCUS_AREA_UPDATED, payload);
        Ok(())
    }

    /// Archives the focus area. Archiving twice queues a single event.
    pub fn archive(&mut self) {
        if self.archived {
            return;
        }
        self.archived = true;
        self.touch();
        let payload = json!({"userId": self.user_id});
        self.add_domain_event(FOCUS_AREA_ARCHIVED, payload);
    }

    fn ensure_not_archived(&self) -> Result<(), FocusAreaError> {
        if self.archived {
            return Err(FocusAreaError::Archived);
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Entity for FocusArea {
    const ENTITY_TYPE: &'static str = "focus_area";
    const EVENT_PREFIX: &'static str = "FOCUS_AREA";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn cache_scopes(&self) -> Vec<CacheScope> {
        vec![CacheScope::user(self.user_id)]
    }

    fn validate(&self) -> Result<(), String> {
        validate_focus_area_name(&self.name)
            .and_then(|_| validate_priority(self.priority))
            .map_err(|e| e.to_string())
    }
}

impl HasDomainEvents for FocusArea {
    fn event_queue(&self) -> &EventQueue {
        &self.events
    }

    fn event_queue_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }
}

fn validate_focus_area_name(name: &str) -> Result<(), FocusAreaError> {
    if name.trim().is_empty() {
        return Err(FocusAreaError::EmptyName);
    }
    if name.chars().count() > MAX_FOCUS_AREA_NAME {
        return Err(FocusAreaError::NameTooLong);
    }
    Ok(())
}

fn validate_priority(priority: u8) -> Result<(), FocusAreaError> {
    if !(1..=5).contains(&priority) {
        return Err(FocusAreaError::InvalidPriority(priority));
    }
    Ok(())
}

/// Lifecycle of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Active,
    Completed,
    Abandoned,
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Abandoned => "abandoned",
        };
        f.write_str(label)
    }
}

/// A concrete, pointed task inside a focus area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub focus_area_id: Uuid,
    pub title: String,
    pub points: u32,
    pub status: ChallengeStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    events: EventQueue,
}

impl Challenge {
    /// Creates an active challenge and queues `CHALLENGE_CREATED`.
    pub fn new(user_id: Uuid, focus_area_id: Uuid, title: impl Into<String>, points: u32) -> Self {
        let mut challenge = Self {
            id: None,
            user_id,
            focus_area_id,
            title: title.into(),
            points,
            status: ChallengeStatus::Active,
            created_at: Utc::now(),
            completed_at: None,
            events: EventQueue::new(),
        };
        let payload = json!({
            "userId": user_id,
            "focusAreaId": focus_area_id,
            "title": challenge.title,
            "points": points,
        });
        challenge.add_domain_event(CHALLENGE_CREATED, payload);
        challenge
    }

    /// Sets a specific ID for this challenge (useful for testing).
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Marks the challenge completed and queues `CHALLENGE_COMPLETED`.
    pub fn complete(&mut self) -> Result<(), ChallengeError> {
        self.ensure_active()?;
        let now = Utc::now();
        self.status = ChallengeStatus::Completed;
        self.completed_at = Some(now);
        let payload = json!({
            "userId": self.user_id,
            "focusAreaId": self.focus_area_id,
            "points": self.points,
            "completedAt": now,
        });
        self.add_domain_event(CHALLENGE_COMPLETED, payload);
        Ok(())
    }

    /// Gives up on the challenge and queues `CHALLENGE_ABANDONED`.
    pub fn abandon(&mut self) -> Result<(), ChallengeError> {
        self.ensure_active()?;
        self.status = ChallengeStatus::Abandoned;
        let payload = json!({"userId": self.user_id, "focusAreaId": self.focus_area_id});
        self.add_domain_event(CHALLENGE_ABANDONED, payload);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == ChallengeStatus::Active
    }

    fn ensure_active(&self) -> Result<(), ChallengeError> {
        if !self.is_active() {
            return Err(ChallengeError::NotActive(self.status));
        }
        Ok(())
    }
}

impl Entity for Challenge {
    const ENTITY_TYPE: &'static str = "challenge";
    const EVENT_PREFIX: &'static str = "CHALLENGE";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn cache_scopes(&self) -> Vec<CacheScope> {
        vec![
            CacheScope::user(self.user_id),
            CacheScope::new("focus_area", "focus_area_id", self.focus_area_id),
        ]
    }

    fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err(ChallengeError::EmptyTitle.to_string());
        }
        if self.title.chars().count() > MAX_CHALLENGE_TITLE {
            return Err(ChallengeError::TitleTooLong.to_string());
        }
        Ok(())
    }
}

impl HasDomainEvents for Challenge {
    fn event_queue(&self) -> &EventQueue {
        &self.events
    }

    fn event_queue_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }
}
