//! Mapper - MappingEngine の結果を Response に包む薄い層

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::domain::{Response, ReturnCode, short_name};
use crate::error::MappingError;
use crate::ports::MappingEngine;

fn mapping_failure<S, D>(detail: Option<&MappingError>) -> String {
    let (source, target) = (short_name::<S>(), short_name::<D>());
    match detail {
        Some(err) => format!("failed to map {source} to {target}: {err}"),
        None => format!("failed to map {source} to {target}"),
    }
}

fn fail<T>(operation: &'static str, message: String) -> Response<T> {
    tracing::warn!(operation, code = %ReturnCode::MappingFailure, "{message}");
    Response::failure(ReturnCode::MappingFailure, message)
}

/// Response-returning front of a [`MappingEngine`]. Cheap to clone.
pub struct Mapper<M> {
    engine: Arc<M>,
}

impl<M> Clone for Mapper<M> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<M> fmt::Debug for Mapper<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("engine", &type_name::<M>())
            .finish()
    }
}

impl<M: MappingEngine> Mapper<M> {
    pub fn new(engine: Arc<M>) -> Self {
        Self { engine }
    }

    pub fn map_to_new<S: 'static, D: 'static>(&self, source: &S) -> Response<D> {
        match self.engine.map::<S, D>(source) {
            Ok(Some(mapped)) => Response::success(mapped),
            Ok(None) => fail("map_to_new", mapping_failure::<S, D>(None)),
            Err(err) => fail("map_to_new", mapping_failure::<S, D>(Some(&err))),
        }
    }

    /// Element-wise, order preserved. The first failing element fails the whole call.
    pub fn map_to_new_collection<S: 'static, D: 'static>(&self, sources: &[S]) -> Response<Vec<D>> {
        let mut mapped = Vec::with_capacity(sources.len());
        for (index, source) in sources.iter().enumerate() {
            match self.engine.map::<S, D>(source) {
                Ok(Some(item)) => mapped.push(item),
                Ok(None) => {
                    let message = format!("{} (element {index})", mapping_failure::<S, D>(None));
                    return fail("map_to_new_collection", message);
                }
                Err(err) => {
                    let message = format!(
                        "{} (element {index})",
                        mapping_failure::<S, D>(Some(&err))
                    );
                    return fail("map_to_new_collection", message);
                }
            }
        }
        Response::success(mapped)
    }

    /// Write `source` into `destination` and hand the same instance back.
    pub fn map_to_existing<S: 'static, D: 'static>(&self, source: &S, mut destination: D) -> Response<D> {
        match self.engine.map_onto(source, &mut destination) {
            Ok(()) => Response::success(destination),
            Err(err) => fail("map_to_existing", mapping_failure::<S, D>(Some(&err))),
        }
    }
}
