use uuid::Uuid;

use crate::entity::Entity;

/// A foreign owner whose cached views include an entity.
///
/// For a focus area owned by a user this is `("user", "user_id", owner)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheScope {
    /// Owner entity type, used as the key prefix.
    pub owner_type: &'static str,
    /// Name of the foreign attribute on the changed entity.
    pub field: &'static str,
    pub owner_id: Uuid,
}

impl CacheScope {
    pub fn new(owner_type: &'static str, field: &'static str, owner_id: Uuid) -> Self {
        Self {
            owner_type,
            field,
            owner_id,
        }
    }

    /// Scope of a record owned by a user through `user_id`.
    pub fn user(owner_id: Uuid) -> Self {
        Self::new("user", "user_id", owner_id)
    }
}

/// Description of a written entity, used to work out which caches are stale.
///
/// `scopes` lists the current owners first. When an update moves the entity
/// to another owner, the previous owners follow and `changed_fields` names
/// the owner attributes that moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedEntity {
    pub entity_type: &'static str,
    pub id: Option<Uuid>,
    pub scopes: Vec<CacheScope>,
    pub changed_fields: Vec<String>,
}

impl ChangedEntity {
    pub fn new(entity_type: &'static str, id: Option<Uuid>) -> Self {
        Self {
            entity_type,
            id,
            scopes: Vec::new(),
            changed_fields: Vec::new(),
        }
    }

    /// Describes an entity as it currently stands.
    pub fn of<E: Entity>(entity: &E) -> Self {
        Self {
            entity_type: E::ENTITY_TYPE,
            id: entity.id(),
            scopes: entity.cache_scopes(),
            changed_fields: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: CacheScope) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn with_changed_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Adds the owners the entity had before the write.
    ///
    /// Scopes that are still current are ignored. Each one that changed is
    /// appended and its field is recorded in `changed_fields`.
    pub fn with_previous_scopes(mut self, previous: impl IntoIterator<Item = CacheScope>) -> Self {
        for scope in previous {
            if self.scopes.contains(&scope) {
                continue;
            }
            if !self.changed_fields.iter().any(|field| field == scope.field) {
                self.changed_fields.push(scope.field.to_string());
            }
            self.scopes.push(scope);
        }
        self
    }

    /// The entity as it was before an ownership change, resolving each
    /// changed field to its previous owner. `None` when no owner moved.
    pub fn previous(&self) -> Option<ChangedEntity> {
        if self.changed_fields.is_empty() {
            return None;
        }

        let mut scopes: Vec<CacheScope> = Vec::new();
        for scope in self.scopes.iter().rev() {
            if !scopes.iter().any(|kept| kept.field == scope.field) {
                scopes.push(*scope);
            }
        }
        scopes.reverse();

        Some(ChangedEntity {
            entity_type: self.entity_type,
            id: self.id,
            scopes,
            changed_fields: Vec::new(),
        })
    }

    /// Resolves a template placeholder: `id` or one of the scope fields.
    pub fn field_value(&self, name: &str) -> Option<String> {
        if name == "id" {
            return self.id.map(|id| id.to_string());
        }
        self.scopes
            .iter()
            .find(|scope| scope.field == name)
            .map(|scope| scope.owner_id.to_string())
    }
}
