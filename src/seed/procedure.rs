//! One-time bootstrap of the administrator records.
//!
//! # Order
//! guard → hash credential → User → "Super Admin" Project → "FHIR R4"
//! Project (upsert) → Practitioner → ProjectMembership → rebuild steps.
//!
//! Writes are not transactional. A failure part-way leaves earlier records
//! in place, and the error lists them.

use std::fmt;
use std::sync::Arc;

use crate::fhir::{
    ContactPoint, HumanName, Meta, Practitioner, Project, ProjectMembership, Reference,
    Repository, RepositoryError, Resource, User,
};
use crate::observability::metrics;
use crate::seed::guard::SeedGuard;
use crate::seed::ids::r4_project_id;
use crate::seed::password::{PasswordHashError, PasswordHasher};
use crate::seed::rebuild::{NoopRebuild, RebuildError, RebuildStep};

pub const ADMIN_FIRST_NAME: &str = "Medplum";
pub const ADMIN_LAST_NAME: &str = "Admin";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "medplum_admin";
pub const SUPER_ADMIN_PROJECT_NAME: &str = "Super Admin";
pub const R4_PROJECT_NAME: &str = "FHIR R4";

/// Storage write performed by the procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStep {
    User,
    SuperAdminProject,
    ReferenceProject,
    Practitioner,
    Membership,
}

impl fmt::Display for SeedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SeedStep::User => "super admin user",
            SeedStep::SuperAdminProject => "super admin project",
            SeedStep::ReferenceProject => "FHIR R4 project",
            SeedStep::Practitioner => "practitioner",
            SeedStep::Membership => "project membership",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("seed check failed: {0}")]
    Guard(#[source] RepositoryError),

    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] PasswordHashError),

    #[error("failed to write {step}: {source} ({} records already written)", .committed.len())]
    Write {
        step: SeedStep,
        source: RepositoryError,
        committed: Vec<Reference>,
    },

    #[error("rebuild step {step} failed: {source}")]
    Rebuild { step: String, source: RebuildError },
}

/// References to everything the procedure wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub user: Reference,
    pub project: Reference,
    pub reference_project: Reference,
    pub practitioner: Reference,
    pub membership: Reference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded(SeedReport),
    AlreadySeeded,
}

pub struct SeedProcedure {
    repo: Arc<dyn Repository>,
    hasher: Arc<dyn PasswordHasher>,
    rebuilds: Vec<Arc<dyn RebuildStep>>,
}

impl SeedProcedure {
    pub fn new(repo: Arc<dyn Repository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            repo,
            hasher,
            rebuilds: vec![
                Arc::new(NoopRebuild::new("structure definitions")),
                Arc::new(NoopRebuild::new("value sets")),
                Arc::new(NoopRebuild::new("search parameters")),
            ],
        }
    }

    /// Replace the rebuild steps. They run in the given order.
    pub fn with_rebuild_steps(
        mut self,
        structure_definitions: Arc<dyn RebuildStep>,
        value_sets: Arc<dyn RebuildStep>,
        search_parameters: Arc<dyn RebuildStep>,
    ) -> Self {
        self.rebuilds = vec![structure_definitions, value_sets, search_parameters];
        self
    }

    pub async fn seed(&self) -> Result<SeedOutcome, SeedError> {
        tracing::info!("Seeding database started");
        let result = self.run().await;
        match &result {
            Ok(SeedOutcome::Seeded(_)) => {
                metrics::record_seed_run("seeded");
                tracing::info!("Database seeding completed");
            }
            Ok(SeedOutcome::AlreadySeeded) => metrics::record_seed_run("already_seeded"),
            Err(error) => {
                metrics::record_seed_run("failed");
                tracing::error!(error = %error, "Database seeding failed");
            }
        }
        result
    }

    async fn run(&self) -> Result<SeedOutcome, SeedError> {
        let seeded = SeedGuard::new(Arc::clone(&self.repo))
            .is_seeded()
            .await
            .map_err(SeedError::Guard)?;
        if seeded {
            tracing::info!("Database is already seeded");
            return Ok(SeedOutcome::AlreadySeeded);
        }

        tracing::info!(email = ADMIN_EMAIL, "Using admin credentials");
        let password_hash = self.hasher.hash(ADMIN_PASSWORD).await?;
        tracing::info!("Password hashed");

        let mut committed = Vec::new();

        let user = User {
            id: None,
            first_name: ADMIN_FIRST_NAME.into(),
            last_name: ADMIN_LAST_NAME.into(),
            email: ADMIN_EMAIL.into(),
            password_hash,
        };
        let user = self.write(SeedStep::User, user.into(), &mut committed).await?;
        tracing::info!(user = %user, "Super admin user created");

        let project = Project {
            id: None,
            name: SUPER_ADMIN_PROJECT_NAME.into(),
            owner: Some(user.clone()),
            super_admin: true,
            strict_mode: true,
        };
        let project = self
            .write(SeedStep::SuperAdminProject, project.into(), &mut committed)
            .await?;
        tracing::info!(project = %project, "Super admin project created");

        let reference_project = Project {
            id: Some(r4_project_id().to_string()),
            name: R4_PROJECT_NAME.into(),
            ..Default::default()
        };
        let reference_project = self
            .write(SeedStep::ReferenceProject, reference_project.into(), &mut committed)
            .await?;
        tracing::info!(project = %reference_project, "FHIR R4 project updated");

        let practitioner = Practitioner {
            id: None,
            meta: Some(Meta {
                project: project.id().map(str::to_string),
            }),
            name: vec![HumanName {
                given: vec![ADMIN_FIRST_NAME.into()],
                family: Some(ADMIN_LAST_NAME.into()),
            }],
            telecom: vec![ContactPoint {
                system: Some("email".into()),
                use_: Some("work".into()),
                value: Some(ADMIN_EMAIL.into()),
            }],
        };
        let practitioner = self
            .write(SeedStep::Practitioner, practitioner.into(), &mut committed)
            .await?;
        tracing::info!(practitioner = %practitioner, "Practitioner created");

        let membership = ProjectMembership {
            id: None,
            project: project.clone(),
            user: user.clone(),
            profile: practitioner.clone(),
            admin: true,
        };
        let membership = self
            .write(SeedStep::Membership, membership.into(), &mut committed)
            .await?;
        tracing::info!(membership = %membership, "Project membership created");

        for step in &self.rebuilds {
            step.rebuild().await.map_err(|source| SeedError::Rebuild {
                step: step.name().to_string(),
                source,
            })?;
            tracing::info!(step = step.name(), "R4 rebuild step completed");
        }

        Ok(SeedOutcome::Seeded(SeedReport {
            user,
            project,
            reference_project,
            practitioner,
            membership,
        }))
    }

    /// Create, or upsert for the reference project, and record the result.
    async fn write(
        &self,
        step: SeedStep,
        resource: Resource,
        committed: &mut Vec<Reference>,
    ) -> Result<Reference, SeedError> {
        let kind = resource.resource_type();
        let stored = match step {
            SeedStep::ReferenceProject => self.repo.update(resource).await,
            _ => self.repo.create(resource).await,
        };

        let reference = stored.and_then(|stored| {
            stored
                .reference()
                .ok_or(RepositoryError::MissingId(kind))
        });

        match reference {
            Ok(reference) => {
                committed.push(reference.clone());
                Ok(reference)
            }
            Err(source) => Err(SeedError::Write {
                step,
                source,
                committed: committed.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhir::{MemoryRepository, ResourceType};
    use async_trait::async_trait;

    struct PlainHasher;

    #[async_trait]
    impl PasswordHasher for PlainHasher {
        async fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
            Ok(format!("plain:{password}"))
        }
    }

    #[tokio::test]
    async fn membership_links_created_records() {
        let repo = Arc::new(MemoryRepository::new());
        let procedure = SeedProcedure::new(repo.clone(), Arc::new(PlainHasher));

        let SeedOutcome::Seeded(report) = procedure.seed().await.unwrap() else {
            panic!("expected a fresh seed");
        };

        let membership_id = report.membership.id().unwrap();
        let membership = ProjectMembership::try_from(
            repo.get(ResourceType::ProjectMembership, membership_id).unwrap(),
        )
        .unwrap();
        assert_eq!(membership.project, report.project);
        assert_eq!(membership.user, report.user);
        assert_eq!(membership.profile, report.practitioner);
        assert!(membership.admin);

        let user = User::try_from(repo.get(ResourceType::User, report.user.id().unwrap()).unwrap())
            .unwrap();
        assert_eq!(user.password_hash, "plain:medplum_admin");
    }

    #[tokio::test]
    async fn practitioner_is_scoped_to_super_admin_project() {
        let repo = Arc::new(MemoryRepository::new());
        let procedure = SeedProcedure::new(repo.clone(), Arc::new(PlainHasher));
        let SeedOutcome::Seeded(report) = procedure.seed().await.unwrap() else {
            panic!("expected a fresh seed");
        };

        let practitioner = Practitioner::try_from(
            repo.get(ResourceType::Practitioner, report.practitioner.id().unwrap())
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            practitioner.meta.and_then(|m| m.project).as_deref(),
            report.project.id()
        );
        assert_eq!(practitioner.telecom[0].use_.as_deref(), Some("work"));
        assert_eq!(
            report.reference_project.id(),
            Some(r4_project_id().to_string().as_str())
        );
    }
}
