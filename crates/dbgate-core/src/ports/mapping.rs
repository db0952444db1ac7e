//! MappingEngine port - shape-to-shape 変換
//!
//! The engine's rules are configured once at startup and then only read. The
//! façade never defines rules itself; it invokes them through this trait.

use crate::error::MappingError;

/// Mapping collaborator consumed by [`Mapper`](crate::service::Mapper).
pub trait MappingEngine: Send + Sync {
    /// Build a new `D` from `source`. `Ok(None)` means the rule produced nothing.
    fn map<S: 'static, D: 'static>(&self, source: &S) -> Result<Option<D>, MappingError>;

    /// Write values derived from `source` into an existing `destination`.
    fn map_onto<S: 'static, D: 'static>(
        &self,
        source: &S,
        destination: &mut D,
    ) -> Result<(), MappingError>;
}
