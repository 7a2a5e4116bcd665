//! Wire types for the resource API.

use serde::{Deserialize, Serialize};

use crate::domain::{NodeSpec, Role};

#[derive(Debug, Serialize)]
pub struct CreateRequest<'a> {
    pub name: &'a str,
    pub role: Role,
    pub cores: u32,
    pub memory_mb: u64,
    pub disk_gb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<&'a str>,
}

impl<'a> From<&'a NodeSpec> for CreateRequest<'a> {
    fn from(spec: &'a NodeSpec) -> Self {
        Self {
            name: &spec.name,
            role: spec.role,
            cores: spec.resources.cores,
            memory_mb: spec.resources.memory_mb,
            disk_gb: spec.resources.disk_gb,
            address: spec.resources.address.as_deref(),
        }
    }
}

/// Body of a create response, and of a 409 naming the existing resource.
#[derive(Debug, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}
