//! Role-based access policy evaluated after a token is verified.
//!
//! Two predicates only: ANY-of and ALL-of over the roles attached to a route.
//! An empty role list means "authenticated is enough".

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleMode {
    #[default]
    Any,
    All,
}

impl RoleMode {
    /// `"ALL"` / `"AND"` select [`RoleMode::All`]; anything else is `Any`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "ALL" | "AND" => Self::All,
            _ => Self::Any,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::All => "ALL",
        }
    }
}

impl FromStr for RoleMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for RoleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a caller did not satisfy a policy. Kept for the audit log only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{mode} of {required:?} required, caller has {granted:?}")]
pub struct PolicyDenial {
    pub mode: RoleMode,
    pub required: Vec<String>,
    /// Sorted so log lines are stable.
    pub granted: Vec<String>,
    /// First required role the caller lacks (in declaration order).
    pub first_missing: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessPolicy {
    pub mode: RoleMode,
    pub required_roles: Vec<String>,
}

impl AccessPolicy {
    pub fn new<I, R>(mode: RoleMode, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            mode,
            required_roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Any verified caller passes.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn any_of<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self::new(RoleMode::Any, roles)
    }

    pub fn all_of<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self::new(RoleMode::All, roles)
    }

    pub fn evaluate(&self, granted: &HashSet<String>) -> Result<(), PolicyDenial> {
        if self.required_roles.is_empty() {
            return Ok(());
        }

        let first_missing = self
            .required_roles
            .iter()
            .find(|role| !granted.contains(role.as_str()));

        let passed = match self.mode {
            RoleMode::All => first_missing.is_none(),
            RoleMode::Any => self
                .required_roles
                .iter()
                .any(|role| granted.contains(role.as_str())),
        };
        if passed {
            return Ok(());
        }

        let mut granted: Vec<String> = granted.iter().cloned().collect();
        granted.sort();

        Err(PolicyDenial {
            mode: self.mode,
            required: self.required_roles.clone(),
            granted,
            first_missing: first_missing.cloned(),
        })
    }
}

/// Compile-time form of [`AccessPolicy`] for static route tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    pub mode: RoleMode,
    pub roles: &'static [&'static str],
}

impl RoutePolicy {
    pub const fn any(roles: &'static [&'static str]) -> Self {
        Self {
            mode: RoleMode::Any,
            roles,
        }
    }

    pub const fn all(roles: &'static [&'static str]) -> Self {
        Self {
            mode: RoleMode::All,
            roles,
        }
    }
}

impl From<RoutePolicy> for AccessPolicy {
    fn from(p: RoutePolicy) -> Self {
        AccessPolicy::new(p.mode, p.roles.iter().copied())
    }
}
