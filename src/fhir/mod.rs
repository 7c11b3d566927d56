//! Resource model and storage seam.
//!
//! # Data Flow
//! ```text
//! seed procedure
//!     → repo.rs (Repository trait: find_one / create / update)
//!     → memory.rs (in-memory store, JSON snapshot)
//! ```

pub mod memory;
pub mod repo;
pub mod resource;

pub use memory::MemoryRepository;
pub use repo::{Repository, RepositoryError};
pub use resource::{
    ContactPoint, HumanName, Meta, Practitioner, Project, ProjectMembership, Reference, Resource,
    ResourceType, User,
};
