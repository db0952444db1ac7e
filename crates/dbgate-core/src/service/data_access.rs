//! DataAccessService - CRUD + mapping façade over one unit of work
//!
//! Every operation returns a [`Response`]. Composite operations are chains of
//! simpler ones joined with [`Response::and_then`], so the first failing stage
//! hands its code and message back unchanged:
//!
//! ```text
//! Start → Fetch / MapInput → Mutate → Persist → Done
//!            │                 │         │
//!            └── failure ──────┴─────────┴──→ returned verbatim
//! ```
//!
//! # 設計原則
//! - collaborator のエラー（`StorageError`, `MappingError`）は呼び出し箇所で
//!   ReturnCode に変換し、façade の外に出さない
//! - `StorageError::SetNotFound` だけはどの操作でも `StorageSetNotFound`
//! - commit に失敗したエンティティは detach し、unit of work を使い続けられるようにする

use crate::config::ZeroChangePolicy;
use crate::domain::{
    Entity, EntityProperty, EntityState, Failure, Key, Query, Response, ReturnCode,
};
use crate::error::StorageError;
use crate::observability::TrackerCounts;
use crate::ports::{EntitySet, MappingEngine, StorageContext};

use super::keys::EntityKeyResolver;
use super::mapper::Mapper;

/// Log a failure envelope and return its code and message.
fn failure(operation: &'static str, entity: &str, code: ReturnCode, message: String) -> Failure {
    tracing::warn!(operation, entity, code = %code, "{message}");
    Failure { code, message }
}

/// The operation's own code, except for a missing entity set.
fn storage_code(err: &StorageError, code: ReturnCode) -> ReturnCode {
    match err {
        StorageError::SetNotFound(_) => ReturnCode::StorageSetNotFound,
        _ => code,
    }
}

/// Data access façade bound to one storage context.
///
/// Not shareable: every operation takes `&mut self`. Obtain one per unit of work
/// from [`DataAccess::scope`](crate::registration::DataAccess::scope).
#[derive(Debug)]
pub struct DataAccessService<C, M> {
    context: C,
    mapper: Mapper<M>,
    zero_change: ZeroChangePolicy,
}

impl<C: StorageContext, M: MappingEngine> DataAccessService<C, M> {
    pub fn new(context: C, mapper: Mapper<M>) -> Self {
        Self {
            context,
            mapper,
            zero_change: ZeroChangePolicy::default(),
        }
    }

    pub fn with_zero_change_policy(mut self, policy: ZeroChangePolicy) -> Self {
        self.zero_change = policy;
        self
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    pub fn tracker_counts(&self) -> TrackerCounts {
        self.context.tracker_counts()
    }

    fn entity_name<E: Entity>(&self) -> &'static str {
        self.context.model().name_of::<E>()
    }

    fn describe<E: Entity>(&self, entity: &E) -> String {
        let name = self.entity_name::<E>();
        match self.context.model().key_of(entity) {
            Some(key) => format!("{name} with id {key}"),
            None => name.to_string(),
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Keys and mapping (delegations)
    // ───────────────────────────────────────────────────────────────────────

    pub fn key_resolver(&self) -> EntityKeyResolver<'_> {
        EntityKeyResolver::new(self.context.model())
    }

    pub fn key_field_names<E: Entity>(&self) -> Response<Vec<&'static str>> {
        self.key_resolver().key_field_names::<E>()
    }

    pub fn key_values<E: Entity>(&self, entity: &E) -> Response<Vec<EntityProperty>> {
        self.key_resolver().key_values(entity)
    }

    pub fn map_to_new<S: 'static, D: 'static>(&self, source: &S) -> Response<D> {
        self.mapper.map_to_new(source)
    }

    pub fn map_to_new_collection<S: 'static, D: 'static>(&self, sources: &[S]) -> Response<Vec<D>> {
        self.mapper.map_to_new_collection(sources)
    }

    pub fn map_to_existing<S: 'static, D: 'static>(&self, source: &S, destination: D) -> Response<D> {
        self.mapper.map_to_existing(source, destination)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Reads
    // ───────────────────────────────────────────────────────────────────────

    pub fn entity_set<E: Entity>(&mut self) -> Response<EntitySet<'_, C, E>> {
        let name = self.entity_name::<E>();
        match EntitySet::resolve(&mut self.context) {
            Some(set) => Response::success(set),
            None => failure(
                "entity_set",
                name,
                ReturnCode::StorageSetNotFound,
                format!("the storage context does not contain an entity set for {name}"),
            )
            .into_response(),
        }
    }

    /// Find by primary key. Missing → `DoesNotExist`.
    pub fn get_entity<E: Entity>(&mut self, id: impl Into<Key>) -> Response<E> {
        let key = id.into();
        let name = self.entity_name::<E>();
        let found = match self.entity_set::<E>().into_result() {
            Ok(mut set) => set.find(&key),
            Err(set_failure) => return set_failure.into_response(),
        };
        match found {
            Ok(Some(entity)) => {
                tracing::debug!(operation = "get_entity", entity = name, %key, "found");
                Response::success(entity)
            }
            Ok(None) => failure(
                "get_entity",
                name,
                ReturnCode::DoesNotExist,
                format!("{name} with id {key} does not exist"),
            )
            .into_response(),
            Err(err) => failure(
                "get_entity",
                name,
                storage_code(&err, ReturnCode::Fail),
                format!("failed to get {name} with id {key}: {err}"),
            )
            .into_response(),
        }
    }

    /// First entity matching `query`. Empty result or evaluation error → `Fail`.
    pub fn get_entity_by_query<E: Entity>(&mut self, query: &Query<E>) -> Response<E> {
        let name = self.entity_name::<E>();
        let rows = match self.entity_set::<E>().into_result() {
            Ok(mut set) => set.query(query),
            Err(set_failure) => return set_failure.into_response(),
        };
        match rows.map(|rows| rows.into_iter().next()) {
            Ok(Some(entity)) => Response::success(entity),
            Ok(None) => failure(
                "get_entity_by_query",
                name,
                ReturnCode::Fail,
                format!("no {name} matches query `{query}`"),
            )
            .into_response(),
            Err(err) => failure(
                "get_entity_by_query",
                name,
                storage_code(&err, ReturnCode::Fail),
                format!("failed to get {name} by query `{query}`: {err}"),
            )
            .into_response(),
        }
    }

    /// Every entity matching `query`, in query order. Empty → `NoEntitiesMatchQuery`.
    pub fn get_entities_by_query<E: Entity>(&mut self, query: &Query<E>) -> Response<Vec<E>> {
        let name = self.entity_name::<E>();
        let rows = match self.entity_set::<E>().into_result() {
            Ok(mut set) => set.query(query),
            Err(set_failure) => return set_failure.into_response(),
        };
        match rows {
            Ok(rows) if rows.is_empty() => failure(
                "get_entities_by_query",
                name,
                ReturnCode::NoEntitiesMatchQuery,
                format!("no {name} entities match query `{query}`"),
            )
            .into_response(),
            Ok(rows) => {
                tracing::debug!(operation = "get_entities_by_query", entity = name, count = rows.len(), "found");
                Response::success(rows)
            }
            Err(err) => failure(
                "get_entities_by_query",
                name,
                storage_code(&err, ReturnCode::Fail),
                format!("failed to get {name} entities by query `{query}`: {err}"),
            )
            .into_response(),
        }
    }

    /// `get_entity` then map to `O`. On failure the payload is `O::default()`.
    pub fn get_object<E, O>(&mut self, id: impl Into<Key>) -> Response<O>
    where
        E: Entity,
        O: Default + 'static,
    {
        self.get_entity::<E>(id)
            .and_then(|entity| self.mapper.map_to_new::<E, O>(&entity))
            .or_default_data()
    }

    pub fn get_object_by_query<E, O>(&mut self, query: &Query<E>) -> Response<O>
    where
        E: Entity,
        O: Default + 'static,
    {
        self.get_entity_by_query(query)
            .and_then(|entity| self.mapper.map_to_new::<E, O>(&entity))
            .or_default_data()
    }

    pub fn get_objects_by_query<E, O>(&mut self, query: &Query<E>) -> Response<Vec<O>>
    where
        E: Entity,
        O: 'static,
    {
        self.get_entities_by_query(query)
            .and_then(|entities| self.mapper.map_to_new_collection::<E, O>(&entities))
            .or_default_data()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Writes
    // ───────────────────────────────────────────────────────────────────────

    /// Add and commit. Returns the persisted entity with its key populated.
    pub fn add_entity<E: Entity>(&mut self, entity: E) -> Response<E> {
        let mut entity = entity;
        let name = self.entity_name::<E>();
        let staged = match self.entity_set::<E>().into_result() {
            Ok(mut set) => set.add(&mut entity),
            Err(set_failure) => return set_failure.into_response_with(entity),
        };
        let committed = match staged {
            Ok(()) => {
                let committed = self.context.save_changes();
                if committed.is_err() {
                    self.context.detach(&entity);
                }
                committed
            }
            Err(err) => Err(err),
        };
        match committed {
            Ok(_) => {
                tracing::debug!(operation = "add_entity", entity = name, "added {}", self.describe(&entity));
                Response::success(entity)
            }
            Err(err) => failure(
                "add_entity",
                name,
                storage_code(&err, ReturnCode::StorageAddFailure),
                format!("failed to add {name} {entity:?}: {err}"),
            )
            .into_response_with(entity),
        }
    }

    /// Map `input` to a new `E`, then add it.
    pub fn add_object<I, E>(&mut self, input: &I) -> Response<E>
    where
        I: 'static,
        E: Entity,
    {
        self.mapper
            .map_to_new::<I, E>(input)
            .and_then(|entity| self.add_entity(entity))
    }

    /// Mark `entity` modified and commit. A failure hands the entity back.
    pub fn save_object<E: Entity>(&mut self, entity: E) -> Response<E> {
        let name = self.entity_name::<E>();
        let staged = match self.entity_set::<E>().into_result() {
            Ok(mut set) => set.update(&entity),
            Err(set_failure) => return set_failure.into_response_with(entity),
        };
        let committed = staged.and_then(|()| self.context.save_changes());
        match committed {
            Ok(written) => {
                tracing::debug!(operation = "save_object", entity = name, written, "saved");
                Response::success(entity)
            }
            Err(err) => {
                self.context.detach(&entity);
                let message = format!("failed to update {}: {err}", self.describe(&entity));
                failure(
                    "save_object",
                    name,
                    storage_code(&err, ReturnCode::StorageUpdateFailure),
                    message,
                )
                .into_response_with(entity)
            }
        }
    }

    /// Fetch `id`, merge `input` into it, save.
    pub fn update_object<I, E>(&mut self, input: &I, id: impl Into<Key>) -> Response<E>
    where
        I: 'static,
        E: Entity,
    {
        self.get_entity::<E>(id)
            .and_then(|entity| self.mapper.map_to_existing(input, entity))
            .and_then(|entity| self.save_object(entity))
    }

    /// Fetch `id`, apply `mutate`, save if it succeeded.
    pub fn update_by_id<E, F>(&mut self, id: impl Into<Key>, mutate: F) -> Response<E>
    where
        E: Entity,
        F: FnOnce(E) -> Response<E>,
    {
        self.get_entity::<E>(id)
            .and_then(mutate)
            .and_then(|entity| self.save_object(entity))
    }

    /// Apply `mutate` to an entity the caller already holds, save if it succeeded.
    pub fn update_entity<E, F>(&mut self, entity: E, mutate: F) -> Response<E>
    where
        E: Entity,
        F: FnOnce(E) -> Response<E>,
    {
        mutate(entity).and_then(|entity| self.save_object(entity))
    }

    /// First match of `query`, merge `input` into it, save.
    pub fn update_by_query<I, E>(&mut self, query: &Query<E>, input: &I) -> Response<E>
    where
        I: 'static,
        E: Entity,
    {
        self.get_entity_by_query(query)
            .and_then(|entity| self.mapper.map_to_existing(input, entity))
            .and_then(|entity| self.save_object(entity))
    }

    /// Fetch `id`, remove it, commit. Returns the number of records written.
    pub fn remove_entity<E: Entity>(&mut self, id: impl Into<Key>) -> Response<usize> {
        self.get_entity::<E>(id).and_then(|entity| {
            let target = self.describe(&entity);
            self.remove_and_commit("remove_entity", &target, &[entity])
        })
    }

    /// Remove every match of `query`. An empty match propagates `NoEntitiesMatchQuery`.
    pub fn remove_entities_by_query<E: Entity>(&mut self, query: &Query<E>) -> Response<usize> {
        let target = format!("{} entities matching query `{query}`", self.entity_name::<E>());
        self.get_entities_by_query(query).and_then(|entities| {
            self.remove_and_commit("remove_entities_by_query", &target, &entities)
        })
    }

    /// Stage removal of `entities` and commit. `target` names them in failure messages.
    fn remove_and_commit<E: Entity>(
        &mut self,
        operation: &'static str,
        target: &str,
        entities: &[E],
    ) -> Response<usize> {
        let name = self.entity_name::<E>();
        let staged = match self.entity_set::<E>().into_result() {
            Ok(mut set) => set.remove_range(entities),
            Err(set_failure) => return set_failure.into_response(),
        };
        let committed = staged.and_then(|()| self.context.save_changes());
        match committed {
            Ok(0) if self.zero_change == ZeroChangePolicy::Fail => failure(
                operation,
                name,
                ReturnCode::StorageRemoveFailure,
                format!("failed to remove {target}: no changes were made"),
            )
            .into_response(),
            Ok(written) => {
                tracing::debug!(operation, entity = name, written, "removed");
                Response::success(written)
            }
            Err(err) => {
                for entity in entities {
                    self.context.detach(entity);
                }
                failure(
                    operation,
                    name,
                    storage_code(&err, ReturnCode::StorageRemoveFailure),
                    format!("failed to remove {target}: {err}"),
                )
                .into_response()
            }
        }
    }

    /// Stop tracking `entity`. Untracking an untracked entity succeeds; an
    /// entity type the model does not know is `StorageSetNotFound`.
    pub fn untrack_entity<E: Entity>(&mut self, entity: &E) -> Response<bool> {
        let state = match self.entity_set::<E>().into_result() {
            Ok(mut set) => {
                set.detach(entity);
                set.state_of(entity)
            }
            Err(set_failure) => return set_failure.into_response(),
        };
        match state {
            EntityState::Detached => Response::success(true),
            state => failure(
                "untrack_entity",
                self.entity_name::<E>(),
                ReturnCode::InvalidInput,
                format!("{} is still tracked as {state:?}", self.describe(entity)),
            )
            .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::FaultPoint;
    use crate::testing::{
        CreateCustomer, Customer, CustomerView, NotInModel, OrderLine, RenameCustomer, scope,
        store,
    };
    use rstest::rstest;

    fn seeded() -> (crate::impls::InMemoryStore, Vec<Customer>) {
        let store = store();
        let mut svc = scope(&store);
        let customers = [("A", 5), ("B", 20), ("C", 30)]
            .into_iter()
            .map(|(name, age)| svc.add_entity(Customer::new(name, age)).into_data().unwrap())
            .collect();
        (store, customers)
    }

    fn adults() -> Query<Customer> {
        Query::all().filter("age >= 18", |c: &Customer| c.age >= 18)
    }

    fn nobody() -> Query<Customer> {
        Query::all().filter("age > 200", |c: &Customer| c.age > 200)
    }

    // ── reads ──────────────────────────────────────────────────────────────

    #[test]
    fn add_then_get_round_trips() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let found = svc.get_entity::<Customer>(customers[1].id);
        assert!(found.is_success());
        assert_eq!(found.into_data(), Some(customers[1].clone()));
    }

    #[test]
    fn missing_id_is_does_not_exist() {
        let (store, _) = seeded();
        let mut svc = scope(&store);
        let r = svc.get_entity::<Customer>(999);
        assert!(!r.is_success());
        assert_eq!(r.return_code(), ReturnCode::DoesNotExist);
        assert_eq!(r.return_message(), "Customer with id 999 does not exist");
        assert!(r.data().is_none());
    }

    #[test]
    fn unknown_entity_type_is_storage_set_not_found() {
        let mut svc = scope(&store());
        let r = svc.get_entity::<NotInModel>(1);
        assert_eq!(r.return_code(), ReturnCode::StorageSetNotFound);
        assert!(r.return_message().contains("NotInModel"));
        assert!(svc.entity_set::<NotInModel>().data().is_none());
    }

    #[test]
    fn entity_set_resolves_registered_type() {
        let mut svc = scope(&store());
        let set = svc.entity_set::<Customer>().into_data().unwrap();
        assert_eq!(set.name(), "Customer");
    }

    #[test]
    fn composite_key_lookup() {
        let mut svc = scope(&store());
        let line = OrderLine {
            order_id: 2,
            line: "x".to_string(),
            qty: 4,
        };
        assert!(svc.add_entity(line.clone()).is_success());
        let found = svc.get_entity::<OrderLine>((2, "x")).into_data();
        assert_eq!(found, Some(line));
        let missing = svc.get_entity::<OrderLine>((2, "y"));
        assert_eq!(missing.return_message(), "OrderLine with id (2, y) does not exist");
    }

    #[test]
    fn get_entity_by_query_returns_first_match() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let r = svc.get_entity_by_query(&adults());
        assert_eq!(r.into_data(), Some(customers[1].clone()));
    }

    #[test]
    fn get_entity_by_query_with_no_match_is_fail() {
        let (store, _) = seeded();
        let mut svc = scope(&store);
        let r = svc.get_entity_by_query(&nobody());
        assert_eq!(r.return_code(), ReturnCode::Fail);
        assert!(r.return_message().contains("age > 200"));
    }

    #[test]
    fn get_entities_by_query_keeps_order() {
        let (store, _) = seeded();
        let mut svc = scope(&store);
        let query = Query::all().order_by("age desc", |c: &Customer| std::cmp::Reverse(c.age));
        let names: Vec<_> = svc
            .get_entities_by_query(&query)
            .into_data()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["C", "B", "A"]);
    }

    #[test]
    fn empty_query_is_no_entities_match_query() {
        let (store, _) = seeded();
        let mut svc = scope(&store);
        let r = svc.get_entities_by_query(&nobody());
        assert!(!r.is_success());
        assert_eq!(r.return_code(), ReturnCode::NoEntitiesMatchQuery);
        assert!(r.data().is_none_or(|rows| rows.is_empty()));
    }

    #[test]
    fn query_fault_is_fail_with_detail() {
        let (store, _) = seeded();
        let mut svc = scope(&store);
        svc.context_mut()
            .inject_fault(FaultPoint::Query, StorageError::Query("index offline".to_string()));
        let r = svc.get_entities_by_query(&adults());
        assert_eq!(r.return_code(), ReturnCode::Fail);
        assert!(r.return_message().ends_with("query evaluation failed: index offline"));
    }

    #[test]
    fn get_object_maps_entity() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let view = svc.get_object::<Customer, CustomerView>(customers[0].id);
        assert_eq!(
            view.into_data(),
            Some(CustomerView {
                id: customers[0].id,
                name: "A".to_string(),
            })
        );
    }

    #[test]
    fn get_object_failure_carries_default_payload() {
        let mut svc = scope(&store());
        let view = svc.get_object::<Customer, CustomerView>(42);
        assert_eq!(view.return_code(), ReturnCode::DoesNotExist);
        assert_eq!(view.return_message(), "Customer with id 42 does not exist");
        assert_eq!(view.data(), Some(&CustomerView::default()));
    }

    #[test]
    fn get_object_mapping_failure_propagates() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let r = svc.get_object::<Customer, RenameCustomer>(customers[0].id);
        assert_eq!(r.return_code(), ReturnCode::MappingFailure);
        assert_eq!(r.data(), Some(&RenameCustomer::default()));
    }

    #[test]
    fn get_objects_by_query_maps_in_order() {
        let (store, _) = seeded();
        let mut svc = scope(&store);
        let views = svc
            .get_objects_by_query::<Customer, CustomerView>(&adults())
            .into_data()
            .unwrap();
        let names: Vec<_> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["B", "C"]);

        let none = svc.get_object_by_query::<Customer, CustomerView>(&nobody());
        assert_eq!(none.return_code(), ReturnCode::Fail);
    }

    // ── writes ─────────────────────────────────────────────────────────────

    #[test]
    fn add_object_maps_and_persists() {
        let mut svc = scope(&store());
        let input = CreateCustomer {
            name: "A".to_string(),
            age: 5,
        };
        let added: Customer = svc.add_object(&input).into_data().unwrap();
        assert_eq!(added.id, 1);
        assert_eq!(svc.get_entity::<Customer>(1).into_data(), Some(added));
    }

    #[test]
    fn add_object_mapping_failure_persists_nothing() {
        let store = store();
        let mut svc = scope(&store);
        let input = CreateCustomer {
            name: String::new(),
            age: 5,
        };
        let r: Response<Customer> = svc.add_object(&input);
        assert_eq!(r.return_code(), ReturnCode::MappingFailure);
        assert_eq!(r.return_message(), "failed to map CreateCustomer to Customer");
        assert_eq!(store.row_count::<Customer>().unwrap(), 0);
        assert_eq!(svc.tracker_counts().pending(), 0);
    }

    #[test]
    fn duplicate_add_is_storage_add_failure() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let r = svc.add_entity(customers[0].clone());
        assert_eq!(r.return_code(), ReturnCode::StorageAddFailure);
        assert!(r.return_message().contains("constraint violation"));
        assert_eq!(r.data(), Some(&customers[0]));
        // the unit of work is still usable
        assert_eq!(svc.tracker_counts().pending(), 0);
        assert!(svc.add_entity(Customer::new("D", 1)).is_success());
    }

    #[rstest]
    #[case::connection(StorageError::ConnectionFailed("link down".into()), ReturnCode::StorageAddFailure)]
    #[case::constraint(StorageError::ConstraintViolation("check".into()), ReturnCode::StorageAddFailure)]
    #[case::set_not_found(StorageError::SetNotFound("Customer"), ReturnCode::StorageSetNotFound)]
    fn commit_errors_are_classified(#[case] error: StorageError, #[case] expected: ReturnCode) {
        let mut svc = scope(&store());
        let detail = error.to_string();
        svc.context_mut().inject_fault(FaultPoint::Commit, error);
        let r = svc.add_entity(Customer::new("A", 5));
        assert_eq!(r.return_code(), expected);
        assert!(r.return_message().ends_with(&detail));
    }

    #[test]
    fn partial_merge_update_keeps_unspecified_fields() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let rename = RenameCustomer {
            name: Some("Z".to_string()),
            age: None,
        };
        let updated = svc.update_object::<_, Customer>(&rename, customers[0].id);
        assert!(updated.is_success());

        let mut fresh = scope(&store);
        let reloaded = fresh.get_entity::<Customer>(customers[0].id).into_data().unwrap();
        assert_eq!(reloaded.name, "Z");
        assert_eq!(reloaded.age, 5);
    }

    #[test]
    fn update_object_mapping_failure_persists_nothing() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let input = CreateCustomer {
            name: String::new(),
            age: 99,
        };
        let r = svc.update_object::<_, Customer>(&input, customers[0].id);
        assert_eq!(r.return_code(), ReturnCode::MappingFailure);
        assert!(r.return_message().ends_with("mapping rule failed: name must not be empty"));

        let mut fresh = scope(&store);
        let reloaded = fresh.get_entity::<Customer>(customers[0].id).into_data().unwrap();
        assert_eq!(reloaded, customers[0]);
    }

    #[test]
    fn update_object_of_missing_id_propagates_does_not_exist() {
        let mut svc = scope(&store());
        let rename = RenameCustomer::default();
        let r = svc.update_object::<_, Customer>(&rename, 5);
        assert_eq!(r.return_code(), ReturnCode::DoesNotExist);
        assert_eq!(r.return_message(), "Customer with id 5 does not exist");
    }

    #[test]
    fn update_by_id_applies_transformation() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let r = svc.update_by_id::<Customer, _>(customers[2].id, |mut c| {
            c.age += 1;
            Response::success(c)
        });
        assert_eq!(r.into_data().map(|c| c.age), Some(31));
    }

    #[test]
    fn failing_transformation_is_returned_verbatim() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let r = svc.update_by_id::<Customer, _>(customers[2].id, |_| {
            Response::failure(ReturnCode::InvalidInput, "age may not decrease")
        });
        assert_eq!(r.return_code(), ReturnCode::InvalidInput);
        assert_eq!(r.return_message(), "age may not decrease");
        assert_eq!(svc.tracker_counts().modified, 0);
    }

    #[test]
    fn update_entity_skips_fetch() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let r = svc.update_entity(customers[0].clone(), |mut c| {
            c.name = "renamed".to_string();
            Response::success(c)
        });
        assert!(r.is_success());
        assert_eq!(
            scope(&store)
                .get_entity::<Customer>(customers[0].id)
                .into_data()
                .map(|c| c.name),
            Some("renamed".to_string())
        );
    }

    #[test]
    fn save_of_unknown_row_is_storage_update_failure() {
        let mut svc = scope(&store());
        let mut ghost = Customer::new("ghost", 1);
        ghost.id = 77;
        let r = svc.save_object(ghost.clone());
        assert_eq!(r.return_code(), ReturnCode::StorageUpdateFailure);
        assert!(r.return_message().starts_with("failed to update Customer with id 77"));
        assert_eq!(r.data(), Some(&ghost));
        assert_eq!(svc.tracker_counts().tracked(), 0);
    }

    #[test]
    fn update_by_query_merges_first_match() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let rename = RenameCustomer {
            name: None,
            age: Some(40),
        };
        let r = svc.update_by_query(&adults(), &rename);
        let updated = r.into_data().unwrap();
        assert_eq!(updated.id, customers[1].id);
        assert_eq!(updated.age, 40);
        assert_eq!(updated.name, "B");
    }

    #[test]
    fn remove_then_get_is_does_not_exist() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let removed = svc.remove_entity::<Customer>(customers[0].id);
        assert_eq!(removed.into_data(), Some(1));
        let r = svc.get_entity::<Customer>(customers[0].id);
        assert_eq!(r.return_code(), ReturnCode::DoesNotExist);
        assert_eq!(store.row_count::<Customer>().unwrap(), 2);
    }

    #[test]
    fn remove_of_missing_id_propagates_does_not_exist() {
        let mut svc = scope(&store());
        let r = svc.remove_entity::<Customer>(3);
        assert_eq!(r.return_code(), ReturnCode::DoesNotExist);
        assert_eq!(r.return_message(), "Customer with id 3 does not exist");
    }

    #[test]
    fn remove_by_query_counts_removed_rows() {
        let (store, _) = seeded();
        let mut svc = scope(&store);
        assert_eq!(svc.remove_entities_by_query(&adults()).into_data(), Some(2));
        assert_eq!(store.row_count::<Customer>().unwrap(), 1);

        let again = svc.remove_entities_by_query(&adults());
        assert_eq!(again.return_code(), ReturnCode::NoEntitiesMatchQuery);
    }

    #[test]
    fn remove_commit_fault_is_storage_remove_failure() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        svc.context_mut().inject_fault(
            FaultPoint::Commit,
            StorageError::ConnectionFailed("link down".to_string()),
        );
        let r = svc.remove_entity::<Customer>(customers[0].id);
        assert_eq!(r.return_code(), ReturnCode::StorageRemoveFailure);
        assert!(r.return_message().ends_with("connection failed: link down"));
        assert_eq!(store.row_count::<Customer>().unwrap(), 3);
        assert_eq!(svc.tracker_counts().deleted, 0);
    }

    fn staged_only(svc: &mut crate::testing::TestService) -> i64 {
        let mut pending = Customer::new("pending", 1);
        svc.context_mut().add(&mut pending).unwrap();
        pending.id
    }

    #[test]
    fn zero_change_removal_fails_by_default() {
        let mut svc = scope(&store());
        let id = staged_only(&mut svc);
        let r = svc.remove_entity::<Customer>(id);
        assert_eq!(r.return_code(), ReturnCode::StorageRemoveFailure);
        assert_eq!(
            r.return_message(),
            format!("failed to remove Customer with id {id}: no changes were made")
        );
    }

    #[test]
    fn zero_change_removal_can_succeed() {
        let mut svc = scope(&store()).with_zero_change_policy(ZeroChangePolicy::Succeed);
        let id = staged_only(&mut svc);
        assert_eq!(svc.remove_entity::<Customer>(id).into_data(), Some(0));
    }

    #[test]
    fn untrack_is_idempotent() {
        let (store, customers) = seeded();
        let mut svc = scope(&store);
        let customer = svc.get_entity::<Customer>(customers[0].id).into_data().unwrap();
        assert_eq!(svc.context().entry_state(&customer), EntityState::Unchanged);

        assert_eq!(svc.untrack_entity(&customer).into_data(), Some(true));
        assert_eq!(svc.untrack_entity(&customer).into_data(), Some(true));
        assert_eq!(svc.context().entry_state(&customer), EntityState::Detached);
    }

    #[test]
    fn untrack_of_unknown_type_is_storage_set_not_found() {
        let mut svc = scope(&store());
        let r = svc.untrack_entity(&NotInModel);
        assert!(!r.is_success());
        assert_eq!(r.return_code(), ReturnCode::StorageSetNotFound);
        assert!(r.return_message().contains("NotInModel"));
    }

    #[test]
    fn remove_by_query_fault_names_the_query() {
        let (store, _) = seeded();
        let mut svc = scope(&store);
        svc.context_mut().inject_fault(
            FaultPoint::Commit,
            StorageError::ConnectionFailed("link down".to_string()),
        );
        let r = svc.remove_entities_by_query(&adults());
        assert_eq!(r.return_code(), ReturnCode::StorageRemoveFailure);
        assert_eq!(
            r.return_message(),
            "failed to remove Customer entities matching query `all where age >= 18`: connection failed: link down"
        );
    }

    #[test]
    fn key_delegations_read_the_model() {
        let svc = scope(&store());
        assert_eq!(svc.key_field_names::<Customer>().into_data(), Some(vec!["id"]));
        let line = OrderLine {
            order_id: 1,
            line: "a".to_string(),
            qty: 1,
        };
        let names: Vec<_> = svc
            .key_values(&line)
            .into_data()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["order_id", "line"]);
    }

    #[rstest]
    #[case::does_not_exist(ReturnCode::DoesNotExist)]
    #[case::mapping(ReturnCode::MappingFailure)]
    #[case::remove(ReturnCode::StorageRemoveFailure)]
    #[case::set_not_found(ReturnCode::StorageSetNotFound)]
    fn success_flag_follows_code(#[case] code: ReturnCode) {
        let r: Response<()> = Response::failure(code, "x");
        assert_eq!(r.is_success(), code == ReturnCode::Success);
    }
}
