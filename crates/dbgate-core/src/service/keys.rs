//! Primary-key discovery for entities whose key shape is only known to the model.

use crate::domain::{Entity, EntityProperty, Model, Response, ReturnCode};

/// Reads key metadata and key values through a [`Model`]. No I/O.
#[derive(Debug, Clone, Copy)]
pub struct EntityKeyResolver<'m> {
    model: &'m Model,
}

impl<'m> EntityKeyResolver<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    /// Ordered key field names of `E`.
    pub fn key_field_names<E: Entity>(&self) -> Response<Vec<&'static str>> {
        match self.model.key_names::<E>() {
            Some(names) => Response::success(names.to_vec()),
            None => {
                let message = format!(
                    "the storage context does not contain an entity type {}",
                    self.model.name_of::<E>()
                );
                tracing::warn!(
                    operation = "key_field_names",
                    entity = self.model.name_of::<E>(),
                    code = %ReturnCode::StorageSetNotFound,
                    "{message}"
                );
                Response::failure(ReturnCode::StorageSetNotFound, message)
            }
        }
    }

    /// Current key values of `entity`, in key order.
    pub fn key_values<E: Entity>(&self, entity: &E) -> Response<Vec<EntityProperty>> {
        self.key_field_names::<E>().and_then(|_| {
            match self.model.entity_type::<E>() {
                Some(entity_type) => Response::success(entity_type.key_properties(entity)),
                None => Response::failure(
                    ReturnCode::StorageSetNotFound,
                    format!("no key metadata for {}", self.model.name_of::<E>()),
                ),
            }
        })
    }
}
