//! StorageContext port - 永続化コンテキスト（unit of work）
//!
//! StorageContext は以下を提供します：
//! - entity type ごとの set（find / add / update / remove / query）
//! - commit（`save_changes`、変更件数を返す）
//! - スキーマメタデータ（[`Model`]）
//! - change tracking の状態照会（`entry_state`）
//!
//! # 設計原則
//! - 1 つの context は 1 つの unit of work にだけ属する（スレッド間で共有しない）
//! - 一貫性・トランザクションは context 側の責務
//! - すべて同期（blocking）

use std::fmt;
use std::marker::PhantomData;

use crate::domain::{Entity, EntityState, Key, Model, Query};
use crate::error::StorageError;
use crate::observability::TrackerCounts;

/// Storage collaborator consumed by the data access service.
///
/// Writes (`add`, `update`, `remove`) only stage changes; nothing reaches the
/// store until `save_changes`.
pub trait StorageContext {
    fn model(&self) -> &Model;

    /// Find by primary key and start tracking the result.
    fn find<E: Entity>(&mut self, key: &Key) -> Result<Option<E>, StorageError>;

    /// Evaluate `query` and start tracking the results.
    fn query<E: Entity>(&mut self, query: &Query<E>) -> Result<Vec<E>, StorageError>;

    /// Stage a new entity. Store-generated keys are written back into `entity`.
    fn add<E: Entity>(&mut self, entity: &mut E) -> Result<(), StorageError>;

    fn update<E: Entity>(&mut self, entity: &E) -> Result<(), StorageError>;

    fn remove<E: Entity>(&mut self, entity: &E) -> Result<(), StorageError>;

    fn remove_range<E: Entity>(&mut self, entities: &[E]) -> Result<(), StorageError> {
        entities.iter().try_for_each(|e| self.remove(e))
    }

    /// Commit all staged changes. Returns the number of records written.
    fn save_changes(&mut self) -> Result<usize, StorageError>;

    fn entry_state<E: Entity>(&self, entity: &E) -> EntityState;

    /// Stop tracking `entity`. Detaching an untracked entity is a no-op.
    fn detach<E: Entity>(&mut self, entity: &E);

    fn tracker_counts(&self) -> TrackerCounts;
}

/// Opens one storage context per unit of work.
pub trait ContextFactory: Send + Sync {
    type Context: StorageContext;

    fn open_context(&self) -> Result<Self::Context, StorageError>;
}

/// Typed view of one entity set of a context.
pub struct EntitySet<'c, C, E> {
    context: &'c mut C,
    name: &'static str,
    _entity: PhantomData<fn() -> E>,
}

impl<'c, C: StorageContext, E: Entity> EntitySet<'c, C, E> {
    /// `None` when the context's model has no entity type `E`.
    pub fn resolve(context: &'c mut C) -> Option<Self> {
        let name = context.model().entity_type::<E>()?.name();
        Some(Self {
            context,
            name,
            _entity: PhantomData,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn find(&mut self, key: &Key) -> Result<Option<E>, StorageError> {
        self.context.find(key)
    }

    pub fn query(&mut self, query: &Query<E>) -> Result<Vec<E>, StorageError> {
        self.context.query(query)
    }

    pub fn add(&mut self, entity: &mut E) -> Result<(), StorageError> {
        self.context.add(entity)
    }

    pub fn update(&mut self, entity: &E) -> Result<(), StorageError> {
        self.context.update(entity)
    }

    pub fn remove_range(&mut self, entities: &[E]) -> Result<(), StorageError> {
        self.context.remove_range(entities)
    }

    pub fn detach(&mut self, entity: &E) {
        self.context.detach(entity)
    }

    pub fn state_of(&self, entity: &E) -> EntityState {
        self.context.entry_state(entity)
    }
}

impl<C, E> fmt::Debug for EntitySet<'_, C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntitySet").field(&self.name).finish()
    }
}
