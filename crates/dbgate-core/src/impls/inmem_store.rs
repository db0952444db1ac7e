//! InMemoryStore - 開発用・テスト用のストレージコンテキスト
//!
//! # 学習ポイント
//! - Arc<Mutex<..>> で共有される「コミット済み」状態
//! - unit of work ごとの change tracker（コンテキストが所有、共有しない）
//! - TypeId + `Box<dyn Any>` による entity type ごとのテーブル管理
//! - validate → apply の 2 段階コミット（途中で失敗しても何も書かない）

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::ConnectionString;
use crate::domain::{Entity, EntityState, EntityType, Key, KeyAssignment, Model, Query};
use crate::error::{ConfigError, StorageError};
use crate::observability::TrackerCounts;
use crate::ports::{ContextFactory, KeyGenerator, StorageContext, SystemClock, UlidGenerator};

/// Committed rows of one entity type, in key order.
type Table<E> = BTreeMap<Key, E>;

/// Committed state shared by every context of a store.
#[derive(Default)]
struct StoreState {
    /// TypeId -> Table<E>
    tables: HashMap<TypeId, Box<dyn Any + Send>>,

    /// TypeId -> last sequence value handed out
    sequences: HashMap<TypeId, i64>,
}

impl StoreState {
    fn table<E: Entity>(&self) -> Option<&Table<E>> {
        self.tables.get(&TypeId::of::<E>())?.downcast_ref()
    }

    fn table_mut<E: Entity>(&mut self) -> Option<&mut Table<E>> {
        self.tables
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Table::<E>::new()))
            .downcast_mut()
    }

    /// Next free sequence value for `E` (skips keys inserted explicitly).
    fn next_sequence<E: Entity>(&mut self) -> i64 {
        let id = TypeId::of::<E>();
        let table = self
            .tables
            .get(&id)
            .and_then(|t| t.downcast_ref::<Table<E>>());
        let sequence = self.sequences.entry(id).or_insert(0);
        loop {
            *sequence += 1;
            let taken = table.is_some_and(|t| t.contains_key(&Key::from(*sequence)));
            if !taken {
                return *sequence;
            }
        }
    }
}

fn lock_store(state: &Mutex<StoreState>) -> Result<MutexGuard<'_, StoreState>, StorageError> {
    state
        .lock()
        .map_err(|_| StorageError::ConnectionFailed("in-memory store lock poisoned".to_string()))
}

/// Shared in-memory store. Cheap to clone; every clone sees the same data.
///
/// # 使用例
/// ```ignore
/// let store = InMemoryStore::new("app", model);
/// let mut ctx = store.context();
/// ctx.add(&mut customer)?;
/// ctx.save_changes()?;
/// ```
#[derive(Clone)]
pub struct InMemoryStore {
    name: String,
    model: Arc<Model>,
    state: Arc<Mutex<StoreState>>,
    keys: Arc<dyn KeyGenerator>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>, model: Model) -> Self {
        Self {
            name: name.into(),
            model: Arc::new(model),
            state: Arc::new(Mutex::new(StoreState::default())),
            keys: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    /// Open a store from a `memory://<name>` connection string.
    pub fn open(connection: &ConnectionString, model: Model) -> Result<Self, ConfigError> {
        if connection.scheme() != ConnectionString::MEMORY_SCHEME {
            return Err(ConfigError::UnsupportedScheme(connection.scheme().to_string()));
        }
        tracing::info!(store = connection.name(), entities = model.len(), "opening in-memory store");
        Ok(Self::new(connection.name(), model))
    }

    pub fn with_key_generator(mut self, keys: impl KeyGenerator + 'static) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// A fresh unit of work over this store.
    pub fn context(&self) -> InMemoryContext {
        InMemoryContext {
            model: Arc::clone(&self.model),
            state: Arc::clone(&self.state),
            keys: Arc::clone(&self.keys),
            trackers: HashMap::new(),
            faults: Vec::new(),
        }
    }

    /// Number of committed rows of `E`.
    pub fn row_count<E: Entity>(&self) -> Result<usize, StorageError> {
        let state = lock_store(&self.state)?;
        Ok(state.table::<E>().map_or(0, BTreeMap::len))
    }
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("name", &self.name)
            .field("entities", &self.model.names())
            .finish()
    }
}

impl ContextFactory for InMemoryStore {
    type Context = InMemoryContext;

    fn open_context(&self) -> Result<InMemoryContext, StorageError> {
        Ok(self.context())
    }
}

/// Where an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Find,
    Query,
    Commit,
}

struct Tracked<E> {
    state: EntityState,
    entity: E,
}

/// Change tracker for one entity type inside one context.
struct Tracker<E> {
    name: &'static str,
    entries: BTreeMap<Key, Tracked<E>>,
}

impl<E: Entity> Tracker<E> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: BTreeMap::new(),
        }
    }

    fn stage(&mut self, key: Key, state: EntityState, entity: E) {
        self.entries.insert(key, Tracked { state, entity });
    }
}

/// Type-erased view of a tracker, so commit can walk every entity type.
trait PendingChanges: Send {
    fn validate(&self, store: &StoreState) -> Result<(), StorageError>;
    fn apply(&mut self, store: &mut StoreState) -> Result<usize, StorageError>;
    fn count_into(&self, counts: &mut TrackerCounts);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: Entity> PendingChanges for Tracker<E> {
    fn validate(&self, store: &StoreState) -> Result<(), StorageError> {
        let table = store.table::<E>();
        let pending = self.entries.iter().filter(|(_, tracked)| tracked.state.is_pending());
        for (key, tracked) in pending {
            let exists = table.is_some_and(|t| t.contains_key(key));
            match tracked.state {
                EntityState::Added if exists => {
                    return Err(StorageError::ConstraintViolation(format!(
                        "duplicate key {key} for {}",
                        self.name
                    )));
                }
                EntityState::Modified | EntityState::Deleted if !exists => {
                    return Err(StorageError::NotFound {
                        entity: self.name,
                        key: key.clone(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn apply(&mut self, store: &mut StoreState) -> Result<usize, StorageError> {
        let name = self.name;
        let table = store
            .table_mut::<E>()
            .ok_or_else(|| StorageError::Internal(format!("table type mismatch for {name}")))?;
        let mut written = 0;
        self.entries.retain(|key, tracked| match tracked.state {
            EntityState::Added | EntityState::Modified => {
                table.insert(key.clone(), tracked.entity.clone());
                tracked.state = EntityState::Unchanged;
                written += 1;
                true
            }
            EntityState::Deleted => {
                table.remove(key);
                written += 1;
                false
            }
            EntityState::Unchanged | EntityState::Detached => true,
        });
        Ok(written)
    }

    fn count_into(&self, counts: &mut TrackerCounts) {
        for tracked in self.entries.values() {
            match tracked.state {
                EntityState::Unchanged => counts.unchanged += 1,
                EntityState::Added => counts.added += 1,
                EntityState::Modified => counts.modified += 1,
                EntityState::Deleted => counts.deleted += 1,
                EntityState::Detached => {}
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One unit of work over an [`InMemoryStore`].
///
/// Reads go to the committed tables; writes are staged in the context's own
/// trackers until [`save_changes`](StorageContext::save_changes). A context is
/// `Send` but not `Sync`: hand it to one caller, never share it.
pub struct InMemoryContext {
    model: Arc<Model>,
    state: Arc<Mutex<StoreState>>,
    keys: Arc<dyn KeyGenerator>,
    trackers: HashMap<TypeId, Box<dyn PendingChanges>>,
    faults: Vec<(FaultPoint, StorageError)>,
}

impl InMemoryContext {
    /// Make the next operation at `point` fail with `error`.
    pub fn inject_fault(&mut self, point: FaultPoint, error: StorageError) {
        self.faults.push((point, error));
    }

    fn take_fault(&mut self, point: FaultPoint) -> Result<(), StorageError> {
        match self.faults.iter().position(|(p, _)| *p == point) {
            Some(index) => {
                let (_, error) = self.faults.remove(index);
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn entity_type<E: Entity>(model: &Model) -> Result<&EntityType<E>, StorageError> {
        model
            .entity_type::<E>()
            .ok_or_else(|| StorageError::SetNotFound(model.name_of::<E>()))
    }

    fn tracker<E: Entity>(&self) -> Option<&Tracker<E>> {
        self.trackers
            .get(&TypeId::of::<E>())?
            .as_any()
            .downcast_ref()
    }

    fn tracker_mut<E: Entity>(&mut self, name: &'static str) -> Result<&mut Tracker<E>, StorageError> {
        self.trackers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Tracker::<E>::new(name)))
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| StorageError::Internal(format!("tracker type mismatch for {name}")))
    }
}

impl StorageContext for InMemoryContext {
    fn model(&self) -> &Model {
        &self.model
    }

    fn find<E: Entity>(&mut self, key: &Key) -> Result<Option<E>, StorageError> {
        self.take_fault(FaultPoint::Find)?;
        let model = Arc::clone(&self.model);
        let entity_type = Self::entity_type::<E>(&model)?;

        if let Some(tracked) = self.tracker::<E>().and_then(|t| t.entries.get(key)) {
            return Ok(match tracked.state {
                EntityState::Deleted => None,
                _ => Some(tracked.entity.clone()),
            });
        }

        let row = {
            let state = lock_store(&self.state)?;
            state.table::<E>().and_then(|t| t.get(key)).cloned()
        };
        if let Some(entity) = &row {
            self.tracker_mut::<E>(entity_type.name())?.stage(
                key.clone(),
                EntityState::Unchanged,
                entity.clone(),
            );
        }
        Ok(row)
    }

    fn query<E: Entity>(&mut self, query: &Query<E>) -> Result<Vec<E>, StorageError> {
        self.take_fault(FaultPoint::Query)?;
        let model = Arc::clone(&self.model);
        let entity_type = Self::entity_type::<E>(&model)?;

        let rows: Vec<E> = {
            let state = lock_store(&self.state)?;
            state
                .table::<E>()
                .map(|t| t.values().cloned().collect())
                .unwrap_or_default()
        };
        let matched = query.apply(rows);

        // Identity resolution: an entity already tracked here is returned as tracked.
        let tracker = self.tracker_mut::<E>(entity_type.name())?;
        let mut resolved = Vec::with_capacity(matched.len());
        for entity in matched {
            let key = entity_type.key_of(&entity);
            match tracker.entries.get(&key) {
                Some(tracked) if tracked.state == EntityState::Deleted => {}
                Some(tracked) => resolved.push(tracked.entity.clone()),
                None => {
                    tracker.stage(key, EntityState::Unchanged, entity.clone());
                    resolved.push(entity);
                }
            }
        }
        Ok(resolved)
    }

    fn add<E: Entity>(&mut self, entity: &mut E) -> Result<(), StorageError> {
        let model = Arc::clone(&self.model);
        let entity_type = Self::entity_type::<E>(&model)?;

        match entity_type.pending_assignment(entity) {
            Some(KeyAssignment::Sequence(write)) => {
                let next = lock_store(&self.state)?.next_sequence::<E>();
                write(entity, next);
            }
            Some(KeyAssignment::Ulid(write)) => write(entity, self.keys.generate_ulid()),
            None => {}
        }

        let key = entity_type.key_of(entity);
        let tracker = self.tracker_mut::<E>(entity_type.name())?;
        if tracker.entries.contains_key(&key) {
            return Err(StorageError::ConstraintViolation(format!(
                "{} with key {key} is already tracked",
                entity_type.name()
            )));
        }
        tracker.stage(key, EntityState::Added, entity.clone());
        Ok(())
    }

    fn update<E: Entity>(&mut self, entity: &E) -> Result<(), StorageError> {
        let model = Arc::clone(&self.model);
        let entity_type = Self::entity_type::<E>(&model)?;
        let key = entity_type.key_of(entity);

        let tracker = self.tracker_mut::<E>(entity_type.name())?;
        let state = match tracker.entries.get(&key).map(|t| t.state) {
            Some(EntityState::Added) => EntityState::Added,
            _ => EntityState::Modified,
        };
        tracker.stage(key, state, entity.clone());
        Ok(())
    }

    fn remove<E: Entity>(&mut self, entity: &E) -> Result<(), StorageError> {
        let model = Arc::clone(&self.model);
        let entity_type = Self::entity_type::<E>(&model)?;
        let key = entity_type.key_of(entity);

        let tracker = self.tracker_mut::<E>(entity_type.name())?;
        match tracker.entries.get(&key).map(|t| t.state) {
            // Never committed: forgetting it is the whole removal.
            Some(EntityState::Added) => {
                tracker.entries.remove(&key);
            }
            _ => tracker.stage(key, EntityState::Deleted, entity.clone()),
        }
        Ok(())
    }

    fn save_changes(&mut self) -> Result<usize, StorageError> {
        self.take_fault(FaultPoint::Commit)?;
        let store = Arc::clone(&self.state);
        let mut state = lock_store(&store)?;

        for tracker in self.trackers.values() {
            tracker.validate(&state)?;
        }
        let mut written = 0;
        for tracker in self.trackers.values_mut() {
            written += tracker.apply(&mut state)?;
        }
        tracing::debug!(written, "in-memory commit");
        Ok(written)
    }

    fn entry_state<E: Entity>(&self, entity: &E) -> EntityState {
        let Some(key) = self.model.key_of(entity) else {
            return EntityState::Detached;
        };
        self.tracker::<E>()
            .and_then(|t| t.entries.get(&key))
            .map_or(EntityState::Detached, |t| t.state)
    }

    fn detach<E: Entity>(&mut self, entity: &E) {
        let Some(key) = self.model.key_of(entity) else {
            return;
        };
        if let Some(tracker) = self
            .trackers
            .get_mut(&TypeId::of::<E>())
            .and_then(|t| t.as_any_mut().downcast_mut::<Tracker<E>>())
        {
            tracker.entries.remove(&key);
        }
    }

    fn tracker_counts(&self) -> TrackerCounts {
        let mut counts = TrackerCounts::default();
        for tracker in self.trackers.values() {
            tracker.count_into(&mut counts);
        }
        counts
    }
}
