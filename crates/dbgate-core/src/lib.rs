//! dbgate-core
//!
//! Generic data access façade: CRUD and shape-to-shape mapping over a
//! unit-of-work storage context, with every outcome wrapped in a
//! [`Response`](domain::Response) envelope instead of an `Err` or a panic.
//!
//! # モジュール構成
//! - **domain**: Response / ReturnCode, Key, Model, Query, EntityState
//! - **ports**: 抽象化レイヤー（StorageContext, ContextFactory, MappingEngine, Clock, KeyGenerator）
//! - **impls**: 実装（InMemoryStore, RuleMapper）
//! - **service**: EntityKeyResolver, Mapper, DataAccessService
//! - **registration**: DataAccess（unit of work ごとに service を払い出す）
//! - **config / error / observability**: 設定、collaborator エラー、tracing

pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod registration;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConnectionString, DataAccessConfig, ZeroChangePolicy};
pub use domain::{Key, KeyValue, Model, Query, Response, ReturnCode};
pub use registration::DataAccess;
pub use service::DataAccessService;
