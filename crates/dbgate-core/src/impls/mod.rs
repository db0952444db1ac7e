//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryStore / InMemoryContext**: unit of work 付きのインメモリ StorageContext
//! - **RuleMapper**: ルール表ベースの MappingEngine
//!
//! 本番用のストレージ実装は別クレートに置き、`StorageContext` と
//! `ContextFactory` を実装するだけで façade から使えます。

pub mod inmem_store;
pub mod rule_mapper;

// 主要な型を再エクスポート
pub use self::inmem_store::{FaultPoint, InMemoryContext, InMemoryStore};
pub use self::rule_mapper::{RuleMapper, RuleMapperBuilder};
