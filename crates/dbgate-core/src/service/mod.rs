//! Service - façade 本体
//!
//! - **EntityKeyResolver**: Model から主キー情報を読む
//! - **Mapper**: MappingEngine の結果を Response に包む
//! - **DataAccessService**: resolver / mapper / StorageContext を組み合わせた CRUD

pub mod data_access;
pub mod keys;
pub mod mapper;

pub use self::data_access::DataAccessService;
pub use self::keys::EntityKeyResolver;
pub use self::mapper::Mapper;
