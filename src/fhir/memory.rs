//! In-memory repository with optional JSON snapshot persistence.

use async_trait::async_trait;
use dashmap::DashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::fhir::repo::{Repository, RepositoryError};
use crate::fhir::resource::{Resource, ResourceType};

/// Write counters, used to check that a procedure did or did not write.
#[derive(Debug, Default)]
pub struct WriteStats {
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl WriteStats {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.creates() + self.updates()
    }
}

/// A thread-safe resource store keyed by type and id.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<DashMap<(ResourceType, String), Resource>>,
    stats: Arc<WriteStats>,
    persistence_path: Option<PathBuf>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot if the file exists; `persist` writes back to it.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let mut repo = Self::new();
        repo.persistence_path = Some(path.to_path_buf());

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let resources: Vec<Resource> = serde_json::from_reader(reader)?;
            for resource in resources {
                let id = resource
                    .id()
                    .ok_or(RepositoryError::MissingId(resource.resource_type()))?
                    .to_string();
                repo.inner.insert((resource.resource_type(), id), resource);
            }
            tracing::info!(
                path = %path.display(),
                resources = repo.inner.len(),
                "Loaded repository snapshot"
            );
        }
        Ok(repo)
    }

    /// Write the snapshot to the configured file, if any.
    pub fn persist(&self) -> Result<(), RepositoryError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let mut resources: Vec<Resource> = self.inner.iter().map(|e| e.value().clone()).collect();
        resources.sort_by(|a, b| {
            (a.resource_type().as_str(), a.id()).cmp(&(b.resource_type().as_str(), b.id()))
        });

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &resources)?;
        tracing::info!(path = %path.display(), resources = resources.len(), "Repository snapshot saved");
        Ok(())
    }

    pub fn stats(&self) -> &WriteStats {
        &self.stats
    }

    pub fn get(&self, kind: ResourceType, id: &str) -> Option<Resource> {
        self.inner.get(&(kind, id.to_string())).map(|e| e.value().clone())
    }

    pub fn list(&self, kind: ResourceType) -> Vec<Resource> {
        self.inner
            .iter()
            .filter(|e| e.key().0 == kind)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn count(&self, kind: ResourceType) -> usize {
        self.inner.iter().filter(|e| e.key().0 == kind).count()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_one(&self, kind: ResourceType) -> Result<Option<Resource>, RepositoryError> {
        Ok(self
            .inner
            .iter()
            .find(|e| e.key().0 == kind)
            .map(|e| e.value().clone()))
    }

    async fn create(&self, mut resource: Resource) -> Result<Resource, RepositoryError> {
        let id = Uuid::new_v4().to_string();
        resource.set_id(id.clone());
        self.inner
            .insert((resource.resource_type(), id), resource.clone());
        self.stats.creates.fetch_add(1, Ordering::SeqCst);
        Ok(resource)
    }

    async fn update(&self, resource: Resource) -> Result<Resource, RepositoryError> {
        let id = resource
            .id()
            .ok_or(RepositoryError::MissingId(resource.resource_type()))?
            .to_string();
        self.inner
            .insert((resource.resource_type(), id), resource.clone());
        self.stats.updates.fetch_add(1, Ordering::SeqCst);
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhir::resource::{Project, User};

    #[tokio::test]
    async fn create_assigns_fresh_ids() {
        let repo = MemoryRepository::new();
        let a = repo.create(User::default().into()).await.unwrap();
        let b = repo.create(User::default().into()).await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(repo.count(ResourceType::User), 2);
        assert_eq!(repo.stats().creates(), 2);
    }

    #[tokio::test]
    async fn update_upserts_by_id() {
        let repo = MemoryRepository::new();
        let project = Project {
            id: Some("fixed".into()),
            name: "first".into(),
            ..Default::default()
        };
        repo.update(project.clone().into()).await.unwrap();
        repo.update(Project { name: "second".into(), ..project }.into())
            .await
            .unwrap();

        assert_eq!(repo.count(ResourceType::Project), 1);
        let stored = Project::try_from(repo.get(ResourceType::Project, "fixed").unwrap()).unwrap();
        assert_eq!(stored.name, "second");
        assert_eq!(repo.stats().updates(), 2);
    }

    #[tokio::test]
    async fn update_without_id_fails() {
        let repo = MemoryRepository::new();
        let err = repo.update(Project::default().into()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::MissingId(ResourceType::Project)));
    }

    #[tokio::test]
    async fn find_one_on_empty_store_is_none() {
        let repo = MemoryRepository::new();
        assert!(repo.find_one(ResourceType::User).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let repo = MemoryRepository::load_from_file(&path).unwrap();
        assert!(repo.is_empty());
        repo.create(User::default().into()).await.unwrap();
        repo.persist().unwrap();

        let reloaded = MemoryRepository::load_from_file(&path).unwrap();
        assert_eq!(reloaded.count(ResourceType::User), 1);
        assert_eq!(reloaded.stats().total(), 0);
    }
}
