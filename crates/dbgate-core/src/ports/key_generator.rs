//! KeyGenerator port - 主キー生成の抽象化
//!
//! Entities registered with a ULID key get one assigned by the store when they
//! are added with a nil key. Generation goes through this trait so tests can pin
//! the timestamp part.
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::ports::Clock;
use ulid::Ulid;

/// KeyGenerator は分散システムで使えるキーを生成
///
/// # ULID の特性
/// - 時刻でソート可能
/// - 分散環境で生成可能（調整不要）
/// - 128-bit（UUID 互換）
///
/// # Thread Safety
/// - `Send + Sync` を要求（ストアは複数の unit of work から共有される）
pub trait KeyGenerator: Send + Sync {
    fn generate_ulid(&self) -> Ulid;
}

/// UlidGenerator は ULID ベースのキー生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// テスト時に FixedClock を使えば timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> KeyGenerator for UlidGenerator<C> {
    fn generate_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}
