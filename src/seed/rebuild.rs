//! Post-seed rebuild steps.
//!
//! Structure definitions, value sets and search parameters are rebuilt
//! after the bootstrap records exist. Their contents live outside this
//! crate; only the invocation contract is defined here.

use async_trait::async_trait;

pub type RebuildError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait RebuildStep: Send + Sync {
    fn name(&self) -> &str;

    async fn rebuild(&self) -> Result<(), RebuildError>;
}

/// A rebuild step that only logs.
#[derive(Debug, Clone)]
pub struct NoopRebuild {
    name: String,
}

impl NoopRebuild {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl RebuildStep for NoopRebuild {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rebuild(&self) -> Result<(), RebuildError> {
        tracing::debug!(step = %self.name, "No rebuild source configured, skipping");
        Ok(())
    }
}
