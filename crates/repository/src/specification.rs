//! Boolean query objects over stored records.

use serde_json::Value;

use domainforge_core::Record;

/// A predicate a stored record may satisfy.
pub trait Specification: Send + Sync {
    fn is_satisfied_by(&self, candidate: &Record) -> bool;
}

impl<F> Specification for F
where
    F: Fn(&Record) -> bool + Send + Sync,
{
    fn is_satisfied_by(&self, candidate: &Record) -> bool {
        self(candidate)
    }
}

/// Combinators available on every [`Specification`].
pub trait SpecificationExt: Specification + Sized {
    fn and<S: Specification>(self, other: S) -> And<Self, S> {
        And(self, other)
    }

    fn or<S: Specification>(self, other: S) -> Or<Self, S> {
        Or(self, other)
    }

    fn not(self) -> Not<Self> {
        Not(self)
    }
}

impl<T: Specification> SpecificationExt for T {}

#[derive(Debug, Clone)]
pub struct And<A, B>(A, B);

impl<A: Specification, B: Specification> Specification for And<A, B> {
    fn is_satisfied_by(&self, candidate: &Record) -> bool {
        self.0.is_satisfied_by(candidate) && self.1.is_satisfied_by(candidate)
    }
}

#[derive(Debug, Clone)]
pub struct Or<A, B>(A, B);

impl<A: Specification, B: Specification> Specification for Or<A, B> {
    fn is_satisfied_by(&self, candidate: &Record) -> bool {
        self.0.is_satisfied_by(candidate) || self.1.is_satisfied_by(candidate)
    }
}

#[derive(Debug, Clone)]
pub struct Not<A>(A);

impl<A: Specification> Specification for Not<A> {
    fn is_satisfied_by(&self, candidate: &Record) -> bool {
        !self.0.is_satisfied_by(candidate)
    }
}

/// Matches records whose `field` equals `value`. A missing field never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEquals {
    field: String,
    value: Value,
}

impl FieldEquals {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl Specification for FieldEquals {
    fn is_satisfied_by(&self, candidate: &Record) -> bool {
        candidate.get(&self.field) == Some(&self.value)
    }
}
