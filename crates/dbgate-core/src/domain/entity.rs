//! Entity marker and key-property snapshots.

use std::fmt;

use serde::Serialize;

use super::key::{KeyValue, ValueType};

/// Anything the storage context can persist.
///
/// Entities are plain values: the context hands out copies and takes them back
/// on add/update/remove. Key layout lives in the [`Model`](super::model::Model),
/// not on the type.
pub trait Entity: Clone + fmt::Debug + Send + 'static {}

impl<T> Entity for T where T: Clone + fmt::Debug + Send + 'static {}

/// Read-only snapshot of one key field of a live entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityProperty {
    pub entity_type: &'static str,
    pub name: &'static str,
    pub value: KeyValue,
    pub value_type: ValueType,
}

impl EntityProperty {
    pub fn new(entity_type: &'static str, name: &'static str, value: KeyValue) -> Self {
        let value_type = value.value_type();
        Self {
            entity_type,
            name,
            value,
            value_type,
        }
    }
}

/// Change-tracking state of an entity inside one unit of work.
///
/// State transitions:
/// - Detached -> Unchanged (find / query)
/// - Detached -> Added -> Unchanged (add + commit)
/// - Unchanged -> Modified -> Unchanged (update + commit)
/// - Unchanged -> Deleted -> Detached (remove + commit)
/// - any -> Detached (detach)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Detached,
    Unchanged,
    Added,
    Modified,
    Deleted,
}

impl EntityState {
    /// Does committing this state write anything?
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }
}
