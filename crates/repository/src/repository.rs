//! Repository adapter interface.
//!
//! Repositories store the plain data of aggregates, never the instances themselves, and are
//! the place where an aggregate's pending events leave the domain: `save` hands them to the
//! event bus and then clears them.

use std::sync::Arc;

use serde_json::Value;

use domainforge_aggregate::{Aggregate, AggregateFactory};
use domainforge_core::Record;

use crate::error::{RepositoryError, RepositoryResult};
use crate::specification::Specification;

/// Persistence for one aggregate kind.
pub trait Repository: Send + Sync {
    fn find_by_id(&self, id: &Value) -> RepositoryResult<Option<Record>>;

    fn find_all(&self) -> RepositoryResult<Vec<Record>>;

    /// Store `aggregate.data()`, publish its pending events in order, then clear them.
    fn save(&self, aggregate: &mut Aggregate) -> RepositoryResult<()>;

    /// Returns `true` when a record was removed.
    fn delete(&self, id: &Value) -> RepositoryResult<bool>;

    /// Records for the ids that exist, in the order of `ids`.
    fn find_by_ids(&self, ids: &[Value]) -> RepositoryResult<Vec<Record>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.find_by_id(id)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Saves in order and stops at the first failure.
    fn save_all(&self, aggregates: &mut [Aggregate]) -> RepositoryResult<()> {
        for aggregate in aggregates.iter_mut() {
            self.save(aggregate)?;
        }
        Ok(())
    }

    fn count(&self) -> RepositoryResult<usize> {
        Ok(self.find_all()?.len())
    }

    fn find_by_specification(&self, spec: &dyn Specification) -> RepositoryResult<Vec<Record>> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|record| spec.is_satisfied_by(record))
            .collect())
    }
}

impl<R> Repository for Arc<R>
where
    R: Repository + ?Sized,
{
    fn find_by_id(&self, id: &Value) -> RepositoryResult<Option<Record>> {
        (**self).find_by_id(id)
    }

    fn find_all(&self) -> RepositoryResult<Vec<Record>> {
        (**self).find_all()
    }

    fn save(&self, aggregate: &mut Aggregate) -> RepositoryResult<()> {
        (**self).save(aggregate)
    }

    fn delete(&self, id: &Value) -> RepositoryResult<bool> {
        (**self).delete(id)
    }

    fn find_by_ids(&self, ids: &[Value]) -> RepositoryResult<Vec<Record>> {
        (**self).find_by_ids(ids)
    }

    fn save_all(&self, aggregates: &mut [Aggregate]) -> RepositoryResult<()> {
        (**self).save_all(aggregates)
    }

    fn count(&self) -> RepositoryResult<usize> {
        (**self).count()
    }

    fn find_by_specification(&self, spec: &dyn Specification) -> RepositoryResult<Vec<Record>> {
        (**self).find_by_specification(spec)
    }
}

/// Fetch the record stored under `id` and rebuild an aggregate from it.
///
/// The record passes through the factory's schema and invariants again, so data that no
/// longer satisfies them surfaces as [`RepositoryError::Domain`].
pub fn load<R>(repository: &R, factory: &AggregateFactory, id: &Value) -> RepositoryResult<Option<Aggregate>>
where
    R: Repository + ?Sized,
{
    match repository.find_by_id(id)? {
        Some(record) => Ok(Some(factory.rehydrate(record)?)),
        None => Ok(None),
    }
}

/// Storage key for an identity value: strings as-is, anything else as compact JSON.
pub fn identity_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn require_identity(aggregate: &Aggregate) -> RepositoryResult<String> {
    aggregate
        .id()
        .map(identity_key)
        .ok_or_else(|| RepositoryError::MissingIdentity {
            aggregate: aggregate.name().to_string(),
        })
}
