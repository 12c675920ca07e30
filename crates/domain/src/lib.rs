//! Domain entities for the Trellis role-assignment engine.

#![forbid(unsafe_code)]

/// Scoped role grants and their resolved, expanded form.
pub mod assignment;
/// Roles in the flat role namespace.
pub mod role;
/// The unified domain/project scope hierarchy.
pub mod scope;

pub use assignment::{Actor, Assignment, ResolvedAssignment, Target};
pub use role::Role;
pub use scope::{ScopeNode, ScopeTree};
