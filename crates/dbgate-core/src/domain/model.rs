//! Model - スキーマメタデータ（entity type → key field accessors）
//!
//! Key discovery does not use runtime reflection. Each entity type is registered
//! once at startup with an ordered list of key-field accessors, and the resulting
//! [`Model`] is shared read-only by every unit of work.
//!
//! # 学習ポイント
//! - `TypeId` をキーにした型消去レジストリ（`Box<dyn Any>` + downcast）
//! - Builder で起動時に検証（Fail-fast 設計）

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;

use ulid::Ulid;

use super::entity::{Entity, EntityProperty};
use super::key::{Key, KeyValue};

/// Short type name for messages (`Customer` instead of `my_app::model::Customer`).
///
/// Generic types keep their full name, since the path inside `<..>` matters.
pub(crate) fn short_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

type KeyReader<E> = Box<dyn Fn(&E) -> KeyValue + Send + Sync>;

struct KeyField<E> {
    name: &'static str,
    read: KeyReader<E>,
}

/// How the store fills in a key the caller left unset.
pub enum KeyAssignment<E> {
    /// Store-wide increasing `i64`, assigned when the current value is `0`.
    Sequence(Box<dyn Fn(&mut E, i64) + Send + Sync>),
    /// Fresh ULID from the key generator, assigned when the current value is nil.
    Ulid(Box<dyn Fn(&mut E, Ulid) + Send + Sync>),
}

/// Schema of one entity type: its name and ordered primary-key fields.
///
/// # Panics
/// The builder methods panic on schema mistakes (duplicate key field names, a
/// generated key combined with other key fields). These are programming errors,
/// not runtime data conditions.
pub struct EntityType<E> {
    name: &'static str,
    key_fields: Vec<KeyField<E>>,
    key_names: Vec<&'static str>,
    assignment: Option<KeyAssignment<E>>,
}

impl<E: Entity> EntityType<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            key_fields: Vec::new(),
            key_names: Vec::new(),
            assignment: None,
        }
    }

    /// Add a key field. Declaration order is key order.
    pub fn key<F>(mut self, name: &'static str, read: F) -> Self
    where
        F: Fn(&E) -> KeyValue + Send + Sync + 'static,
    {
        assert!(
            self.assignment.is_none(),
            "entity type {}: a generated key must be the only key field",
            self.name
        );
        assert!(
            !self.key_names.contains(&name),
            "entity type {}: duplicate key field {name}",
            self.name
        );
        self.key_names.push(name);
        self.key_fields.push(KeyField {
            name,
            read: Box::new(read),
        });
        self
    }

    /// Single `i64` key assigned from the store sequence when left at `0`.
    pub fn sequence_key<R, W>(self, name: &'static str, read: R, write: W) -> Self
    where
        R: Fn(&E) -> i64 + Send + Sync + 'static,
        W: Fn(&mut E, i64) + Send + Sync + 'static,
    {
        let mut this = self.key(name, move |e| KeyValue::Int(read(e)));
        this.assert_single_key();
        this.assignment = Some(KeyAssignment::Sequence(Box::new(write)));
        this
    }

    /// Single ULID key assigned from the key generator when left nil.
    pub fn ulid_key<R, W>(self, name: &'static str, read: R, write: W) -> Self
    where
        R: Fn(&E) -> Ulid + Send + Sync + 'static,
        W: Fn(&mut E, Ulid) + Send + Sync + 'static,
    {
        let mut this = self.key(name, move |e| KeyValue::Ulid(read(e)));
        this.assert_single_key();
        this.assignment = Some(KeyAssignment::Ulid(Box::new(write)));
        this
    }

    fn assert_single_key(&self) {
        assert!(
            self.key_fields.len() == 1,
            "entity type {}: a generated key must be the only key field",
            self.name
        );
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Ordered key field names.
    pub fn key_names(&self) -> &[&'static str] {
        &self.key_names
    }

    pub fn key_of(&self, entity: &E) -> Key {
        Key::new(self.key_fields.iter().map(|f| (f.read)(entity)).collect())
    }

    /// Current key values of `entity`, in key order.
    pub fn key_properties(&self, entity: &E) -> Vec<EntityProperty> {
        self.key_fields
            .iter()
            .map(|f| EntityProperty::new(self.name, f.name, (f.read)(entity)))
            .collect()
    }

    /// The assignment to run before staging `entity`, if its key is still unset.
    pub fn pending_assignment(&self, entity: &E) -> Option<&KeyAssignment<E>> {
        let assignment = self.assignment.as_ref()?;
        let unset = match self.key_of(entity).values() {
            [KeyValue::Int(0)] => true,
            [KeyValue::Ulid(ulid)] => ulid.is_nil(),
            _ => false,
        };
        unset.then_some(assignment)
    }
}

/// Registry of entity types known to a storage context.
#[derive(Default)]
pub struct Model {
    entities: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    names: HashMap<TypeId, &'static str>,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn entity_type<E: Entity>(&self) -> Option<&EntityType<E>> {
        self.entities.get(&TypeId::of::<E>())?.downcast_ref()
    }

    pub fn contains<E: Entity>(&self) -> bool {
        self.entities.contains_key(&TypeId::of::<E>())
    }

    /// Registered name of `E`, or its short Rust type name when unregistered.
    pub fn name_of<E: Entity>(&self) -> &'static str {
        self.names
            .get(&TypeId::of::<E>())
            .copied()
            .unwrap_or_else(short_name::<E>)
    }

    pub fn key_names<E: Entity>(&self) -> Option<&[&'static str]> {
        self.entity_type::<E>().map(EntityType::key_names)
    }

    pub fn key_of<E: Entity>(&self, entity: &E) -> Option<Key> {
        self.entity_type::<E>().map(|t| t.key_of(entity))
    }

    /// Registered entity names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.names.values().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("entities", &self.names())
            .finish()
    }
}

/// Builds a [`Model`] once at startup.
#[derive(Default)]
pub struct ModelBuilder {
    model: Model,
}

impl ModelBuilder {
    /// Register an entity type. A second registration of the same type wins.
    ///
    /// # Panics
    /// If the entity type declares no key field.
    pub fn entity<E: Entity>(mut self, entity_type: EntityType<E>) -> Self {
        assert!(
            !entity_type.key_names.is_empty(),
            "entity type {} declares no key field",
            entity_type.name
        );
        let id = TypeId::of::<E>();
        if let Some(previous) = self.model.names.insert(id, entity_type.name) {
            tracing::warn!(
                entity = entity_type.name,
                previous,
                "entity type registered twice, keeping the last registration"
            );
        }
        self.model.entities.insert(id, Box::new(entity_type));
        self
    }

    pub fn build(self) -> Model {
        self.model
    }
}
