//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use medplum_server::fhir::{
    MemoryRepository, Repository, RepositoryError, Resource, ResourceType,
};
use medplum_server::seed::{PasswordHashError, PasswordHasher};

/// Reserve an ephemeral port on localhost and release it.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Wait until something accepts TCP connections on `addr`.
pub async fn wait_for_listener(addr: SocketAddr) -> bool {
    for _ in 0..200 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Deterministic, fast stand-in for bcrypt.
pub struct FakeHasher;

#[async_trait]
impl PasswordHasher for FakeHasher {
    async fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        Ok(format!("fake${password}"))
    }
}

/// Repository call, as observed by [`FaultyRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FindOne(ResourceType),
    Create(ResourceType),
    Update(ResourceType),
}

/// Wraps a memory repository, logging calls and failing `create` for one type.
#[derive(Clone)]
pub struct FaultyRepository {
    pub inner: MemoryRepository,
    fail_create: Option<ResourceType>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FaultyRepository {
    pub fn new(fail_create: Option<ResourceType>) -> Self {
        Self {
            inner: MemoryRepository::new(),
            fail_create,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Repository for FaultyRepository {
    async fn find_one(&self, kind: ResourceType) -> Result<Option<Resource>, RepositoryError> {
        self.calls.lock().unwrap().push(Call::FindOne(kind));
        self.inner.find_one(kind).await
    }

    async fn create(&self, resource: Resource) -> Result<Resource, RepositoryError> {
        let kind = resource.resource_type();
        self.calls.lock().unwrap().push(Call::Create(kind));
        if self.fail_create == Some(kind) {
            return Err(RepositoryError::Storage(format!("injected failure creating {kind}")));
        }
        self.inner.create(resource).await
    }

    async fn update(&self, resource: Resource) -> Result<Resource, RepositoryError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Update(resource.resource_type()));
        self.inner.update(resource).await
    }
}
