//! Scope-based authorization.
//!
//! Scopes are named capability strings attached to API keys. The decision
//! rule depends on how the caller authenticated:
//!
//! - **Bearer** identities (interactive logins) satisfy every requirement.
//! - **API key** identities satisfy a requirement iff their scope set contains
//!   it literally or contains `admin`.
//!
//! There is no hierarchy beyond the `admin` wildcard.

use std::collections::BTreeSet;
use std::fmt;

use crate::identity::{AuthKind, Identity};

/// A single named scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Read access.
    Read,
    /// Write (create/update/delete) access.
    Write,
    /// Administrative access; wildcard over every other scope.
    Admin,
    /// Any other literal scope name.
    Custom(String),
}

impl Scope {
    /// Parse a scope name. Surrounding whitespace is ignored; empty input
    /// yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "" => None,
            "read" => Some(Scope::Read),
            "write" => Some(Scope::Write),
            "admin" => Some(Scope::Admin),
            other => Some(Scope::Custom(other.to_string())),
        }
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &str {
        match self {
            Scope::Read => "read",
            Scope::Write => "write",
            Scope::Admin => "admin",
            Scope::Custom(name) => name,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
    scopes: BTreeSet<Scope>,
}

impl ScopeSet {
    /// Create an empty scope set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-delimited scope list such as `"read,write"`.
    pub fn parse(list: &str) -> Self {
        Self {
            scopes: list.split(',').filter_map(Scope::parse).collect(),
        }
    }

    /// Build a set from scope values.
    pub fn from_scopes(scopes: impl IntoIterator<Item = Scope>) -> Self {
        Self {
            scopes: scopes.into_iter().collect(),
        }
    }

    /// Add a scope.
    pub fn add(&mut self, scope: Scope) {
        self.scopes.insert(scope);
    }

    /// Literal membership test, no wildcard expansion.
    pub fn contains(&self, scope: &Scope) -> bool {
        self.scopes.contains(scope)
    }

    /// Whether the set holds the `admin` wildcard.
    pub fn has_admin(&self) -> bool {
        self.scopes.contains(&Scope::Admin)
    }

    /// Whether `required` is satisfied by this set.
    pub fn grants(&self, required: &Scope) -> bool {
        self.has_admin() || self.contains(required)
    }

    /// Iterate the scopes in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    /// Scope names in canonical order.
    pub fn to_strings(&self) -> Vec<String> {
        self.scopes.iter().map(|s| s.as_str().to_string()).collect()
    }

    /// Comma-delimited form, the inverse of [`ScopeSet::parse`].
    pub fn to_delimited(&self) -> String {
        self.to_strings().join(",")
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Number of scopes.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }
}

/// Outcome of a scope check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDecision {
    /// The requirement is satisfied.
    Granted,
    /// The requirement is not satisfied.
    Denied {
        /// The scope that was required.
        required: Scope,
    },
}

impl ScopeDecision {
    /// Whether access was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, ScopeDecision::Granted)
    }
}

/// Decide whether `identity` satisfies `required`.
pub fn authorize(identity: &Identity, required: &Scope) -> ScopeDecision {
    let granted = match identity.kind {
        AuthKind::Bearer => true,
        AuthKind::ApiKey => identity.scopes.grants(required),
    };

    if granted {
        ScopeDecision::Granted
    } else {
        ScopeDecision::Denied {
            required: required.clone(),
        }
    }
}
