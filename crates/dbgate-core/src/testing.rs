//! Shared test fixtures.

use std::sync::Arc;

use serde::Serialize;
use ulid::Ulid;

use crate::domain::{EntityType, Model};
use crate::error::MappingError;
use crate::impls::{InMemoryContext, InMemoryStore, RuleMapper};
use crate::service::{DataAccessService, Mapper};

pub type TestService = DataAccessService<InMemoryContext, RuleMapper>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub age: u32,
}

impl Customer {
    pub fn new(name: &str, age: u32) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            age,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub order_id: i64,
    pub line: String,
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: Ulid,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotInModel;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCustomer {
    pub name: String,
    pub age: u32,
}

/// Partial update: `None` leaves the field alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenameCustomer {
    pub name: Option<String>,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomerView {
    pub id: i64,
    pub name: String,
}

pub fn model() -> Model {
    Model::builder()
        .entity(EntityType::<Customer>::new("Customer").sequence_key(
            "id",
            |c| c.id,
            |c, id| c.id = id,
        ))
        .entity(
            EntityType::<OrderLine>::new("OrderLine")
                .key("order_id", |l| l.order_id.into())
                .key("line", |l| l.line.as_str().into()),
        )
        .entity(EntityType::<Ticket>::new("Ticket").ulid_key("id", |t| t.id, |t, id| t.id = id))
        .build()
}

pub fn rules() -> RuleMapper {
    RuleMapper::builder()
        .try_rule(|input: &CreateCustomer| {
            Ok((!input.name.is_empty()).then(|| Customer::new(&input.name, input.age)))
        })
        .try_merge(|input: &CreateCustomer, customer: &mut Customer| {
            if input.name.is_empty() {
                return Err(MappingError::Rule("name must not be empty".to_string()));
            }
            customer.name = input.name.clone();
            customer.age = input.age;
            Ok(())
        })
        .merge(|input: &RenameCustomer, customer: &mut Customer| {
            if let Some(name) = &input.name {
                customer.name = name.clone();
            }
            if let Some(age) = input.age {
                customer.age = age;
            }
        })
        .rule(|customer: &Customer| CustomerView {
            id: customer.id,
            name: customer.name.clone(),
        })
        .build()
}

pub fn mapper() -> Mapper<RuleMapper> {
    Mapper::new(Arc::new(rules()))
}

pub fn store() -> InMemoryStore {
    InMemoryStore::new("test", model())
}

pub fn scope(store: &InMemoryStore) -> TestService {
    DataAccessService::new(store.context(), mapper())
}
