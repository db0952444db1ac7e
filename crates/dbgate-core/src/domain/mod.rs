//! Domain model (response envelope, keys, schema metadata, queries).
//!
//! - response: Response / ReturnCode / Failure
//! - key: Key / KeyValue / ValueType
//! - entity: Entity / EntityProperty / EntityState
//! - model: Model / EntityType（起動時に構築するスキーマメタデータ）
//! - query: Query

pub mod entity;
pub mod key;
pub mod model;
pub mod query;
pub mod response;

pub use entity::{Entity, EntityProperty, EntityState};
pub use key::{Key, KeyValue, ValueType};
pub use model::{EntityType, KeyAssignment, Model, ModelBuilder};
pub(crate) use model::short_name;
pub use query::Query;
pub use response::{Failure, Response, ReturnCode, SUCCESS_MESSAGE};
