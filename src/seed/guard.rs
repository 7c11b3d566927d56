//! "Already seeded?" check.

use std::sync::Arc;

use crate::fhir::{Repository, RepositoryError, ResourceType};

/// The store counts as seeded once any `User` exists.
#[derive(Clone)]
pub struct SeedGuard {
    repo: Arc<dyn Repository>,
}

impl SeedGuard {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn is_seeded(&self) -> Result<bool, RepositoryError> {
        Ok(self.repo.find_one(ResourceType::User).await?.is_some())
    }
}
