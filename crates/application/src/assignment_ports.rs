use async_trait::async_trait;
use trellis_core::{AppResult, RoleId};
use trellis_domain::{Actor, Assignment, Role, Target};

/// Query filter over stored assignment rows.
///
/// Every field is optional; an empty filter matches every row. The exposed
/// `inheritedOnly` selector of the list API maps to `inherited =
/// Some(true)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentFilter {
    /// Restrict to one actor.
    pub actor: Option<Actor>,
    /// Restrict to one target scope.
    pub target: Option<Target>,
    /// Restrict to one role.
    pub role_id: Option<RoleId>,
    /// Restrict to rows with the given inherited flag.
    pub inherited: Option<bool>,
}

impl AssignmentFilter {
    /// Returns whether a stored row matches the filter.
    #[must_use]
    pub fn matches(&self, assignment: &Assignment) -> bool {
        self.actor.is_none_or(|actor| assignment.actor == actor)
            && self.target.is_none_or(|target| assignment.target == target)
            && self.role_id.is_none_or(|role_id| assignment.role_id == role_id)
            && self
                .inherited
                .is_none_or(|inherited| assignment.inherited == inherited)
    }
}

/// Repository port for the stored grant tuples.
///
/// Listings preserve stable insertion order so pagination by the caller is
/// deterministic. Rows scoped to a deleted hierarchy node or granting a
/// deleted role are removed by the owning store cascade
/// ([`crate::HierarchyRepository`], [`RoleRepository::delete`]), not
/// through this port.
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Inserts a row if the full tuple is not already present.
    async fn upsert(&self, assignment: Assignment) -> AppResult<()>;

    /// Removes a row, reporting whether it was present.
    async fn remove(&self, assignment: &Assignment) -> AppResult<bool>;

    /// Returns the stored rows matching the filter, in insertion order.
    async fn query(&self, filter: &AssignmentFilter) -> AppResult<Vec<Assignment>>;

    /// Removes every row held by the actor atomically, returning the count.
    async fn remove_owned_by(&self, actor: Actor) -> AppResult<u64>;
}

/// Repository port for the flat role namespace.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Persists a new role. Fails with `Conflict` on a duplicate name.
    async fn insert(&self, role: Role) -> AppResult<()>;

    /// Looks up a role by id.
    async fn find(&self, id: RoleId) -> AppResult<Option<Role>>;

    /// Lists every role, name-ordered.
    async fn list(&self) -> AppResult<Vec<Role>>;

    /// Replaces a stored role. Fails with `NotFound` if absent.
    async fn update(&self, role: Role) -> AppResult<()>;

    /// Deletes a role together with every assignment row granting it,
    /// atomically. Fails with `NotFound` if absent.
    async fn delete(&self, id: RoleId) -> AppResult<()>;
}

/// Parses the `effective` query value of the list API.
///
/// An absent parameter means false. A present parameter means true unless
/// its value is exactly `0` or `false`; in particular the value `False`
/// still enables effective mode. This asymmetry is a documented
/// compatibility behavior of the original API and is preserved on purpose.
#[must_use]
pub fn effective_flag(raw: Option<&str>) -> bool {
    match raw {
        None => false,
        Some("0") | Some("false") => false,
        Some(_) => true,
    }
}
