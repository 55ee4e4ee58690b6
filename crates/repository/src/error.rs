use domainforge_core::DomainError;
use thiserror::Error;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Stored data no longer satisfies the aggregate's schema or invariants.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{aggregate} instance has no identity value")]
    MissingIdentity { aggregate: String },

    /// The bus refused an event; every pending event stays on the aggregate, including
    /// ones already delivered, so a retried save publishes them again.
    #[error("failed to publish {event_type} event: {message}")]
    Publish { event_type: String, message: String },

    #[error("repository lock poisoned")]
    Poisoned,
}
