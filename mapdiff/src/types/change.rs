use std::fmt;

use serde::{Deserialize, Serialize};

/// What a changeset entry does to the entity with its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Modify,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Modify => "modify",
            ChangeAction::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A changeset entry.
///
/// For [`ChangeAction::Delete`] the entity is the last version known to the old snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change<E> {
    pub action: ChangeAction,
    pub entity: E,
}

impl<E> Change<E> {
    pub fn new(action: ChangeAction, entity: E) -> Self {
        Self { action, entity }
    }

    pub fn create(entity: E) -> Self {
        Self::new(ChangeAction::Create, entity)
    }

    pub fn modify(entity: E) -> Self {
        Self::new(ChangeAction::Modify, entity)
    }

    pub fn delete(entity: E) -> Self {
        Self::new(ChangeAction::Delete, entity)
    }
}
