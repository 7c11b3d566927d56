//! Bootstrap seeding.
//!
//! # Data Flow
//! ```text
//! medplum-server seed
//!     → guard.rs (any User stored? stop)
//!     → password.rs (hash default credential)
//!     → procedure.rs (ordered writes through fhir::Repository)
//!     → rebuild.rs (structure definitions, value sets, search parameters)
//! ```

pub mod guard;
pub mod ids;
pub mod password;
pub mod procedure;
pub mod rebuild;

pub use guard::SeedGuard;
pub use ids::{deterministic_id, r4_project_id};
pub use password::{BcryptHasher, PasswordHashError, PasswordHasher};
pub use procedure::{SeedError, SeedOutcome, SeedProcedure, SeedReport, SeedStep};
pub use rebuild::{NoopRebuild, RebuildError, RebuildStep};
