//! Bootstrap resource types.
//!
//! Only the fields the bootstrap records carry are modelled. Resources
//! serialize as JSON objects tagged with `resourceType`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    User,
    Project,
    Practitioner,
    ProjectMembership,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "User",
            ResourceType::Project => "Project",
            ResourceType::Practitioner => "Practitioner",
            ResourceType::ProjectMembership => "ProjectMembership",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `<ResourceType>/<id>` pointer to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub reference: String,
}

impl Reference {
    pub fn to(resource_type: ResourceType, id: &str) -> Self {
        Self {
            reference: format!("{resource_type}/{id}"),
        }
    }

    /// The id part of the reference.
    pub fn id(&self) -> Option<&str> {
        self.reference
            .split_once('/')
            .map(|(_, id)| id)
            .filter(|id| !id.is_empty())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Id of the project the resource belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Reference>,
    #[serde(default)]
    pub super_admin: bool,
    #[serde(default)]
    pub strict_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(default)]
    pub given: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Practitioner {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default)]
    pub name: Vec<HumanName>,
    #[serde(default)]
    pub telecom: Vec<ContactPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMembership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub project: Reference,
    pub user: Reference,
    pub profile: Reference,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
pub enum Resource {
    User(User),
    Project(Project),
    Practitioner(Practitioner),
    ProjectMembership(ProjectMembership),
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::User(_) => ResourceType::User,
            Resource::Project(_) => ResourceType::Project,
            Resource::Practitioner(_) => ResourceType::Practitioner,
            Resource::ProjectMembership(_) => ResourceType::ProjectMembership,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Resource::User(r) => r.id.as_deref(),
            Resource::Project(r) => r.id.as_deref(),
            Resource::Practitioner(r) => r.id.as_deref(),
            Resource::ProjectMembership(r) => r.id.as_deref(),
        }
    }

    pub fn set_id(&mut self, id: String) {
        let slot = match self {
            Resource::User(r) => &mut r.id,
            Resource::Project(r) => &mut r.id,
            Resource::Practitioner(r) => &mut r.id,
            Resource::ProjectMembership(r) => &mut r.id,
        };
        *slot = Some(id);
    }

    /// Reference to this resource, once it has an id.
    pub fn reference(&self) -> Option<Reference> {
        self.id().map(|id| Reference::to(self.resource_type(), id))
    }
}

macro_rules! resource_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Resource {
                fn from(value: $variant) -> Self {
                    Resource::$variant(value)
                }
            }

            impl TryFrom<Resource> for $variant {
                type Error = Resource;

                fn try_from(value: Resource) -> Result<Self, Self::Error> {
                    match value {
                        Resource::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

resource_variant!(User, Project, Practitioner, ProjectMembership);
