//! Domain methods bound to aggregate instances.
//!
//! A method receives the instance it is called on explicitly (there is no implicit
//! receiver) plus JSON arguments, and produces the successor instance, normally by
//! calling back into the factory's `update`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use domainforge_core::DomainResult;

use crate::factory::AggregateFactory;
use crate::instance::Aggregate;

/// A domain method: `(instance, args) -> successor`.
pub type Method = Arc<dyn Fn(&Aggregate, Value) -> DomainResult<Aggregate> + Send + Sync>;

/// Builds the method set for one factory. Invoked for every constructed instance, with
/// the factory the instance belongs to, so methods can re-enter `update`/`create`.
pub type MethodFactory = Arc<dyn Fn(&AggregateFactory) -> MethodSet + Send + Sync>;

/// Builds a derived factory's methods from the derived factory and the parent's
/// methods (already bound to the derived factory).
pub type DerivedMethodFactory = Arc<dyn Fn(&AggregateFactory, MethodSet) -> MethodSet + Send + Sync>;

/// Named domain methods, ordered by name.
#[derive(Clone, Default)]
pub struct MethodSet {
    methods: BTreeMap<String, Method>,
}

impl MethodSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a method.
    pub fn with<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Aggregate, Value) -> DomainResult<Aggregate> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    /// Union of both sets; `other` wins on name clashes.
    pub fn merge(mut self, other: MethodSet) -> Self {
        self.methods.extend(other.methods);
        self
    }

    /// Drop a method (a derived aggregate may withhold an inherited operation).
    pub fn without(mut self, name: &str) -> Self {
        self.methods.remove(name);
        self
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl core::fmt::Debug for MethodSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.methods.keys()).finish()
    }
}
