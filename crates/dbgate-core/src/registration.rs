//! DataAccess - 登録エントリポイント
//!
//! # 学習ポイント
//! - プロセス全体で共有するもの（ContextFactory, MappingEngine, 設定）と
//!   unit of work ごとのもの（StorageContext, DataAccessService）を分ける
//! - `DataAccess` は `Send + Sync`、`scope()` が返すサービスは呼び出し元が専有

use std::sync::Arc;

use crate::config::DataAccessConfig;
use crate::domain::Model;
use crate::error::{ConfigError, StorageError};
use crate::impls::InMemoryStore;
use crate::ports::{ContextFactory, MappingEngine};
use crate::service::{DataAccessService, Mapper};

/// Wires a context factory, a mapping engine and configuration.
///
/// # 使用例
/// ```ignore
/// let access = DataAccess::in_memory(model, rules, DataAccessConfig::default())?;
/// let mut svc = access.scope()?;
/// let created = svc.add_object::<CreateCustomer, Customer>(&input);
/// ```
#[derive(Debug)]
pub struct DataAccess<F, M> {
    factory: F,
    mapper: Mapper<M>,
    config: DataAccessConfig,
}

impl<F: ContextFactory, M: MappingEngine> DataAccess<F, M> {
    pub fn new(factory: F, engine: M, config: DataAccessConfig) -> Self {
        Self {
            factory,
            mapper: Mapper::new(Arc::new(engine)),
            config,
        }
    }

    /// A service over a fresh storage context, for one unit of work.
    pub fn scope(&self) -> Result<DataAccessService<F::Context, M>, StorageError> {
        let context = self.factory.open_context()?;
        Ok(DataAccessService::new(context, self.mapper.clone())
            .with_zero_change_policy(self.config.zero_change_removal))
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn config(&self) -> &DataAccessConfig {
        &self.config
    }
}

impl<M: MappingEngine> DataAccess<InMemoryStore, M> {
    /// In-memory store opened from `config.connection_string` (default `memory://default`).
    pub fn in_memory(model: Model, engine: M, config: DataAccessConfig) -> Result<Self, ConfigError> {
        let store = InMemoryStore::open(&config.connection()?, model)?;
        Ok(Self::new(store, engine, config))
    }
}
