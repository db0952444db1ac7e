//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部コラボレータ（ストレージエンジン、マッピングエンジン、時刻、
//! キー生成）へのインターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod key_generator;
pub mod mapping;
pub mod storage;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::key_generator::{KeyGenerator, UlidGenerator};
pub use self::mapping::MappingEngine;
pub use self::storage::{ContextFactory, EntitySet, StorageContext};
