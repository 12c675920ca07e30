use serde::{Deserialize, Serialize};
use trellis_core::{GroupId, RoleId, ScopeId, UserId};

/// The principal a role is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum Actor {
    /// A concrete user.
    User(UserId),
    /// A group whose current members hold the grant.
    Group(GroupId),
}

/// The scope a role is granted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum Target {
    /// A domain root node.
    Domain(ScopeId),
    /// A project node.
    Project(ScopeId),
}

impl Target {
    /// Returns the hierarchy node behind the target.
    #[must_use]
    pub fn scope_id(&self) -> ScopeId {
        match self {
            Self::Domain(id) | Self::Project(id) => *id,
        }
    }
}

/// A stored role grant.
///
/// At most one row exists per full tuple; granting is an idempotent upsert
/// and revoking an idempotent delete. `inherited` marks the grant as
/// propagating to every descendant project of the target instead of
/// applying at the target itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    /// Granted principal.
    pub actor: Actor,
    /// Granted scope.
    pub target: Target,
    /// Granted role.
    pub role_id: RoleId,
    /// Whether the grant propagates to descendant projects.
    pub inherited: bool,
}

/// One entry of an assignment listing.
///
/// Raw listings render stored rows verbatim. Effective listings expand
/// group grants to member users and inherited grants down the project
/// subtree; expanded entries keep a `source` back-reference to the stored
/// grant they came from so callers can render the entry's link against the
/// original grant rather than the synthesized scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAssignment {
    /// Principal of this entry. Always a user in effective listings.
    pub actor: Actor,
    /// Concrete scope of this entry.
    pub target: Target,
    /// Granted role.
    pub role_id: RoleId,
    /// Inherited marker. Always cleared on expanded copies.
    pub inherited: bool,
    /// The stored grant this entry was expanded from, if any.
    pub source: Option<Assignment>,
}

impl ResolvedAssignment {
    /// Renders a stored row verbatim.
    #[must_use]
    pub fn direct(assignment: Assignment) -> Self {
        Self {
            actor: assignment.actor,
            target: assignment.target,
            role_id: assignment.role_id,
            inherited: assignment.inherited,
            source: None,
        }
    }

    /// Creates an expanded entry derived from the given stored grant.
    #[must_use]
    pub fn derived(user_id: UserId, target: Target, source: Assignment) -> Self {
        Self {
            actor: Actor::User(user_id),
            target,
            role_id: source.role_id,
            inherited: false,
            source: Some(source),
        }
    }

    /// Returns the grant a caller should link this entry to.
    #[must_use]
    pub fn link(&self) -> Assignment {
        self.source.unwrap_or(Assignment {
            actor: self.actor,
            target: self.target,
            role_id: self.role_id,
            inherited: self.inherited,
        })
    }
}
