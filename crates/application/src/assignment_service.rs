use std::sync::Arc;

use trellis_core::{AppError, AppResult, NonEmptyString, RoleId};
use trellis_domain::{Actor, Assignment, Role, Target};

use crate::HierarchyService;
use crate::assignment_ports::{AssignmentFilter, AssignmentRepository, RoleRepository};
use crate::identity_ports::{CredentialStore, IdentityDirectory};

mod effective;


/// Application service for scoped role grants.
///
/// Owns role CRUD and the grant tuple lifecycle, and resolves assignment
/// listings, including the effective expansion of group and inherited
/// grants (see [`AssignmentService::list_assignments`]).
#[derive(Clone)]
pub struct AssignmentService {
    hierarchy: HierarchyService,
    assignments: Arc<dyn AssignmentRepository>,
    roles: Arc<dyn RoleRepository>,
    directory: Arc<dyn IdentityDirectory>,
    credentials: Arc<dyn CredentialStore>,
}

impl AssignmentService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        hierarchy: HierarchyService,
        assignments: Arc<dyn AssignmentRepository>,
        roles: Arc<dyn RoleRepository>,
        directory: Arc<dyn IdentityDirectory>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            hierarchy,
            assignments,
            roles,
            directory,
            credentials,
        }
    }

    /// Creates a role in the flat role namespace.
    pub async fn create_role(&self, name: String) -> AppResult<Role> {
        let role = Role::new(NonEmptyString::new(name)?);
        self.roles.insert(role.clone()).await?;
        tracing::info!(role_id = %role.id, "created role");
        Ok(role)
    }

    /// Looks up a role by id.
    pub async fn get_role(&self, id: RoleId) -> AppResult<Role> {
        self.roles
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{id}' was not found")))
    }

    /// Lists every role.
    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.roles.list().await
    }

    /// Renames a role.
    pub async fn update_role(&self, id: RoleId, name: String) -> AppResult<Role> {
        let mut role = self.get_role(id).await?;
        role.name = NonEmptyString::new(name)?;
        self.roles.update(role.clone()).await?;
        Ok(role)
    }

    /// Grants a role to an actor on a scope. Granting an existing tuple is
    /// a no-op.
    pub async fn grant(&self, assignment: Assignment) -> AppResult<()> {
        self.validate_assignment_refs(&assignment).await?;
        self.assignments.upsert(assignment).await?;
        tracing::info!(role_id = %assignment.role_id, "granted role");
        Ok(())
    }

    /// Revokes a grant. Revoking an absent tuple succeeds, but missing
    /// referents still report `NotFound`.
    ///
    /// Removing a stored row invalidates the tokens it was backing before
    /// this returns: the user's tokens for a user grant, every current
    /// member's tokens for a group grant.
    pub async fn revoke(&self, assignment: Assignment) -> AppResult<()> {
        self.validate_assignment_refs(&assignment).await?;
        let removed = self.assignments.remove(&assignment).await?;
        if !removed {
            return Ok(());
        }

        tracing::info!(role_id = %assignment.role_id, "revoked role");
        match assignment.actor {
            Actor::User(user_id) => self.credentials.revoke_tokens_for_user(user_id).await,
            Actor::Group(group_id) => {
                for member in self.directory.group_members(group_id).await? {
                    self.credentials.revoke_tokens_for_user(member).await?;
                }
                Ok(())
            }
        }
    }

    /// Confirms a grant tuple exists, reporting `NotFound` otherwise.
    pub async fn check_grant(&self, assignment: Assignment) -> AppResult<()> {
        self.validate_assignment_refs(&assignment).await?;
        let filter = AssignmentFilter {
            actor: Some(assignment.actor),
            target: Some(assignment.target),
            role_id: Some(assignment.role_id),
            inherited: Some(assignment.inherited),
        };
        if self.assignments.query(&filter).await?.is_empty() {
            return Err(AppError::NotFound(
                "role assignment was not found".to_owned(),
            ));
        }
        Ok(())
    }

    /// Lists the roles granted to one actor on one scope with the given
    /// inherited flag.
    pub async fn list_grants(
        &self,
        actor: Actor,
        target: Target,
        inherited: bool,
    ) -> AppResult<Vec<Role>> {
        self.ensure_inheritance_available(inherited)?;
        self.validate_actor(actor).await?;
        self.validate_target(target).await?;

        let filter = AssignmentFilter {
            actor: Some(actor),
            target: Some(target),
            role_id: None,
            inherited: Some(inherited),
        };
        let rows = self.assignments.query(&filter).await?;

        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            roles.push(self.get_role(row.role_id).await?);
        }
        Ok(roles)
    }

    fn ensure_inheritance_available(&self, inherited: bool) -> AppResult<()> {
        if inherited && !self.hierarchy.config().inheritance_enabled {
            return Err(AppError::NotFound(
                "inherited role grants are not enabled".to_owned(),
            ));
        }
        Ok(())
    }

    async fn validate_assignment_refs(&self, assignment: &Assignment) -> AppResult<()> {
        self.ensure_inheritance_available(assignment.inherited)?;
        self.validate_actor(assignment.actor).await?;
        self.validate_target(assignment.target).await?;
        self.get_role(assignment.role_id).await?;
        Ok(())
    }

    async fn validate_actor(&self, actor: Actor) -> AppResult<()> {
        match actor {
            Actor::User(user_id) => {
                if !self.directory.user_exists(user_id).await? {
                    return Err(AppError::NotFound(format!("user '{user_id}' was not found")));
                }
            }
            Actor::Group(group_id) => {
                if !self.directory.group_exists(group_id).await? {
                    return Err(AppError::NotFound(format!(
                        "group '{group_id}' was not found"
                    )));
                }
            }
        }
        Ok(())
    }

    async fn validate_target(&self, target: Target) -> AppResult<()> {
        match target {
            Target::Domain(id) => self.hierarchy.get_domain(id).await?,
            Target::Project(id) => self.hierarchy.get_project(id).await?,
        };
        Ok(())
    }
}
