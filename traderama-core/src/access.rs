//! Capability checks
//!
//! One policy answers every "may this user do X" question. Admins come from
//! configuration, never from literals scattered through the code.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Trader,
    Viewer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// start / pause / stop / emergency stop
    ControlEngine,
    ManageRisk,
    ViewAdminAnalytics,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ControlEngine => write!(f, "control_engine"),
            Capability::ManageRisk => write!(f, "manage_risk"),
            Capability::ViewAdminAnalytics => write!(f, "view_admin_analytics"),
        }
    }
}

/// Authenticated caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn trader(id: impl Into<String>) -> Self {
        Self::new(id, Role::Trader)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AccessPolicy {
    admins: HashSet<String>,
}

impl AccessPolicy {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            admins: admins.into_iter().map(|a| a.as_ref().to_lowercase()).collect(),
        }
    }

    /// Effective role, with configured admins promoted
    pub fn role_of(&self, actor: &Actor) -> Role {
        if self.admins.contains(&actor.id.to_lowercase()) {
            Role::Admin
        } else {
            actor.role
        }
    }

    pub fn allows(&self, actor: &Actor, capability: Capability) -> bool {
        match self.role_of(actor) {
            Role::Admin => true,
            Role::Trader => matches!(capability, Capability::ControlEngine | Capability::ManageRisk),
            Role::Viewer => false,
        }
    }

    pub fn require(&self, actor: &Actor, capability: Capability) -> EngineResult<()> {
        if self.allows(actor, capability) {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                user: actor.id.clone(),
                capability: capability.to_string(),
            })
        }
    }
}
