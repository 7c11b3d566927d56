//! Name-based deterministic identifiers.

use uuid::Uuid;

/// Name hashed into the well-known reference project id.
pub const R4_REFERENCE_NAME: &str = "R4";

/// UUID v5 of `name` in `namespace`. Same inputs, same id, on every machine.
pub fn deterministic_id(namespace: &Uuid, name: &str) -> Uuid {
    Uuid::new_v5(namespace, name.as_bytes())
}

/// Id of the "FHIR R4" reference project.
pub fn r4_project_id() -> Uuid {
    deterministic_id(&Uuid::nil(), R4_REFERENCE_NAME)
}
