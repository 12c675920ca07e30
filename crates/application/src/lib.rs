//! Application services and ports for the Trellis role-assignment engine.
//!
//! The engine is request-scoped and stateless: services hold no mutable
//! state of their own and re-read group membership and hierarchy
//! enabled-state from the backing stores on every evaluation.

#![forbid(unsafe_code)]

mod assignment_ports;
mod assignment_service;
mod config;
mod hierarchy_ports;
mod hierarchy_service;
mod identity_ports;
mod lifecycle_service;

#[cfg(test)]
mod test_support;

pub use assignment_ports::{AssignmentFilter, AssignmentRepository, RoleRepository, effective_flag};
pub use assignment_service::AssignmentService;
pub use config::EngineConfig;
pub use hierarchy_ports::{
    CreateDomainInput, CreateProjectInput, HierarchyRepository, UpdateDomainInput,
    UpdateProjectInput,
};
pub use hierarchy_service::HierarchyService;
pub use identity_ports::{CredentialStore, IdentityDirectory};
pub use lifecycle_service::LifecycleService;
