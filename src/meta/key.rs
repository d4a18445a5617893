//! Resource addressing keys
//!
//! A GCE resource is addressed by its name plus an optional scope: nothing for
//! global resources, a region for regional ones and a zone for zonal ones.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Addressing topology of a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Global,
    Regional,
    Zonal,
}

impl KeyType {
    /// Number of leading native parameters consumed by the addressing scope
    /// (receiver/project, optional region or zone, resource name).
    pub fn args_skip(self) -> usize {
        match self {
            KeyType::Global => 3,
            KeyType::Regional | KeyType::Zonal => 4,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyType::Global => "global",
            KeyType::Regional => "regional",
            KeyType::Zonal => "zonal",
        };
        f.write_str(s)
    }
}

/// Scope half of a [`Key`]. Exactly one topology is set by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    Global,
    Region(String),
    Zone(String),
}

/// Key for a GCE resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub name: String,
    pub scope: Scope,
}

impl Key {
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Global,
        }
    }

    pub fn regional(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Region(region.into()),
        }
    }

    pub fn zonal(name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Zone(zone.into()),
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self.scope {
            Scope::Global => KeyType::Global,
            Scope::Region(_) => KeyType::Regional,
            Scope::Zone(_) => KeyType::Zonal,
        }
    }

    pub fn region(&self) -> Option<&str> {
        match &self.scope {
            Scope::Region(r) => Some(r),
            _ => None,
        }
    }

    pub fn zone(&self) -> Option<&str> {
        match &self.scope {
            Scope::Zone(z) => Some(z),
            _ => None,
        }
    }

    /// Region or zone name, `None` for global keys.
    pub fn location(&self) -> Option<&str> {
        self.region().or_else(|| self.zone())
    }

    /// A key is valid when its name and scope are non-empty.
    pub fn valid(&self) -> bool {
        !self.name.is_empty() && self.location().map(|l| !l.is_empty()).unwrap_or(true)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Global => write!(f, "Key{{{:?}}}", self.name),
            Scope::Region(r) => write!(f, "Key{{{:?}, region: {:?}}}", self.name, r),
            Scope::Zone(z) => write!(f, "Key{{{:?}, zone: {:?}}}", self.name, z),
        }
    }
}
