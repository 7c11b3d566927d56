//! Repository interface consumed by bootstrap seeding.

use async_trait::async_trait;

use crate::fhir::resource::{Resource, ResourceType};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} has no id")]
    MissingId(ResourceType),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Minimal storage shape needed by the bootstrap procedure.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Any one resource of the given type, or `None` if there are none.
    async fn find_one(&self, kind: ResourceType) -> Result<Option<Resource>, RepositoryError>;

    /// Store a new resource under a freshly generated id.
    async fn create(&self, resource: Resource) -> Result<Resource, RepositoryError>;

    /// Store a resource under its own id, creating it if absent.
    async fn update(&self, resource: Resource) -> Result<Resource, RepositoryError>;
}
