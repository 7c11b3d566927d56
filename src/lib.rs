//! Medplum server process lifecycle and bootstrap seeding.

pub mod config;
pub mod fhir;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod seed;

pub use config::schema::Settings;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, Supervisor};
