use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::role::Role;

/// Opaque, stable identity of a remote party (a Slack user id in practice).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl User {
    /// In-memory record for a party the store has never seen. Nothing is
    /// persisted until the caller saves it.
    pub fn new(id: UserId) -> Self {
        Self { id, roles: Vec::new() }
    }

    pub fn append_role(&mut self, role: Role) {
        self.roles.push(role);
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn has_roles(&self) -> bool {
        !self.roles.is_empty()
    }
}
