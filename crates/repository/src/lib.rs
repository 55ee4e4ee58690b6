//! Persistence boundary for aggregates.
//!
//! - `Repository`: adapter interface over plain records
//! - `Specification`: composable record predicates for queries
//! - `InMemoryRepository`: test/dev adapter that publishes events on save

pub mod error;
pub mod in_memory;
pub mod repository;
pub mod specification;

pub use error::{RepositoryError, RepositoryResult};
pub use in_memory::InMemoryRepository;
pub use repository::{Repository, identity_key, load};
pub use specification::{And, FieldEquals, Not, Or, Specification, SpecificationExt};
