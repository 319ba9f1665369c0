//! Typed view of verified token claims.
//!
//! Roles are read from `resource_access.<audience>.roles` only. Realm-wide
//! roles (`realm_access`) are ignored.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::api::v1::extractors::AuthenticatedIdentity;

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("claims do not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("token has an empty subject")]
    EmptySubject,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleClaim {
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub resource_access: HashMap<String, RoleClaim>,
}

impl IdentityClaims {
    pub fn decode(claims: Map<String, Value>) -> Result<Self, ClaimsError> {
        let claims: Self = serde_json::from_value(Value::Object(claims))?;
        if claims.sub.trim().is_empty() {
            return Err(ClaimsError::EmptySubject);
        }
        Ok(claims)
    }

    pub fn roles_for(&self, audience: &str) -> HashSet<String> {
        self.resource_access
            .get(audience)
            .map(|access| access.roles.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn into_identity(self, audience: &str) -> AuthenticatedIdentity {
        let roles = self.roles_for(audience);
        AuthenticatedIdentity {
            subject: self.sub,
            display_name: self.name,
            email: self.email,
            username: self.preferred_username,
            roles,
        }
    }
}
