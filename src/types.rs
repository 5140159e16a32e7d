/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity a request is attributed to for audit columns and privilege checks
/// (`usuario.cod`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActingUser(i64);

impl ActingUser {
    pub fn new(id: i64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn id(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ActingUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidActingUser(pub String);

impl fmt::Display for InvalidActingUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid user id {:?}", self.0)
    }
}

impl std::error::Error for InvalidActingUser {}

impl FromStr for ActingUser {
    type Err = InvalidActingUser;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .ok()
            .and_then(ActingUser::new)
            .ok_or_else(|| InvalidActingUser(s.to_string()))
    }
}
