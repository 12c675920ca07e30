use std::sync::Arc;

use trellis_core::{AppError, AppResult, GroupId, RoleId, ScopeId, UserId};
use trellis_domain::{Actor, ScopeNode, Target};

use crate::HierarchyService;
use crate::assignment_ports::{AssignmentFilter, AssignmentRepository, RoleRepository};
use crate::identity_ports::{CredentialStore, IdentityDirectory};

use cascade::Dependent;

mod cascade;


/// Coordinator for multi-step lifecycle operations.
///
/// Wraps the hierarchy and assignment stores together with the identity
/// directory and credential collaborators to enforce hierarchy invariants
/// on disable/delete, run the deletion cascades, and signal token
/// revocation synchronously inside the same logical operation as the store
/// mutation. Collaborator deletions always run first and the store
/// mutation commits last, so a collaborator failure aborts a cascade with
/// the store untouched.
#[derive(Clone)]
pub struct LifecycleService {
    hierarchy: HierarchyService,
    assignments: Arc<dyn AssignmentRepository>,
    roles: Arc<dyn RoleRepository>,
    directory: Arc<dyn IdentityDirectory>,
    credentials: Arc<dyn CredentialStore>,
}

impl LifecycleService {
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

    /// Enables or disables a hierarchy node.
    ///
    /// Disabling is always permitted and revokes, before returning, the
    /// tokens scoped to the node and to every project beneath it; a
    /// disabled domain additionally revokes the tokens of every user it
    /// owns. Enabling fails with `Forbidden` while any ancestor, the
    /// owning domain included, is disabled: enabled state cannot skip a
    /// disabled ancestor.
    pub async fn set_enabled(&self, id: ScopeId, enabled: bool) -> AppResult<ScopeNode> {
        let mut node = self.hierarchy.get_node(id).await?;
        if node.enabled == enabled {
            return Ok(node);
        }

        if enabled {
            let ancestors = self.hierarchy.list_ancestors(id).await?;
            if let Some(disabled) = ancestors.iter().find(|ancestor| !ancestor.enabled) {
                return Err(AppError::Forbidden(format!(
                    "cannot enable scope '{id}' beneath disabled scope '{}'",
                    disabled.id
                )));
            }
        }

        node.enabled = enabled;
        self.hierarchy.repository().update_node(node.clone()).await?;

        if !enabled {
            tracing::info!(scope_id = %id, "disabled scope, revoking its tokens");
            self.credentials
                .revoke_tokens_for_scope(&target_of(&node))
                .await?;
            // A token scoped below the node is cut off just the same.
            for descendant in self.hierarchy.list_subtree(id).await? {
                self.credentials
                    .revoke_tokens_for_scope(&Target::Project(descendant.id))
                    .await?;
            }
            if node.is_domain_root {
                for user_id in self.directory.list_domain_users(id).await? {
                    self.credentials.revoke_tokens_for_user(user_id).await?;
                }
            }
        }
        Ok(node)
    }

    /// Deletes a project.
    ///
    /// Fails with `Forbidden` while the project has children or is still
    /// enabled. Cascades the project's credentials, its scoped tokens and
    /// every assignment row targeting it.
    pub async fn delete_project(&self, id: ScopeId) -> AppResult<()> {
        let project = self.hierarchy.get_project(id).await?;
        let children = self.hierarchy.repository().list_children(id).await?;
        if !children.is_empty() {
            return Err(AppError::Forbidden(format!(
                "cannot delete project '{id}' while it has children"
            )));
        }
        if project.enabled {
            return Err(AppError::Forbidden(format!(
                "cannot delete project '{id}' while it is enabled"
            )));
        }

        self.run_cascade(vec![
            Dependent::ProjectCredentials(id),
            Dependent::ScopeTokens(Target::Project(id)),
        ])
        .await?;
        // The store cascade takes the assignment rows targeting the
        // project with it.
        self.hierarchy.repository().delete_project_cascade(id).await?;
        tracing::info!(project_id = %id, "deleted project");
        Ok(())
    }

    /// Deletes a domain with everything scoped to it.
    ///
    /// Fails with `Forbidden` while the domain is enabled or while it is
    /// the configured default domain. Cascades every project deepest-first,
    /// every assignment targeting the domain or its projects, every
    /// assignment held by an actor scoped to the domain, the domain's
    /// users, groups and credentials, and the tokens of every affected
    /// scope and user. Sibling domains are untouched.
    pub async fn delete_domain(&self, id: ScopeId) -> AppResult<()> {
        let domain = self.hierarchy.get_domain(id).await?;
        if domain.enabled {
            return Err(AppError::Forbidden(format!(
                "cannot delete domain '{id}' while it is enabled"
            )));
        }
        if id == self.hierarchy.config().default_domain_id {
            return Err(AppError::Forbidden(format!(
                "cannot delete the default domain '{id}'"
            )));
        }

        let projects = self.hierarchy.list_projects(id).await?;
        let users = self.directory.list_domain_users(id).await?;
        let groups = self.directory.list_domain_groups(id).await?;

        let mut dependents = Vec::new();
        for user_id in &users {
            dependents.push(Dependent::UserCredentials(*user_id));
            dependents.push(Dependent::UserTokens(*user_id));
            dependents.push(Dependent::DirectoryUser(*user_id));
        }
        for group_id in &groups {
            dependents.push(Dependent::DirectoryGroup(*group_id));
        }
        for project in &projects {
            dependents.push(Dependent::ProjectCredentials(project.id));
            dependents.push(Dependent::ScopeTokens(Target::Project(project.id)));
        }
        dependents.push(Dependent::ScopeTokens(Target::Domain(id)));

        self.run_cascade(dependents).await?;

        // One store mutation removes the subtree, the rows targeting it
        // and the rows held by the domain's own actors.
        let actors: Vec<Actor> = users
            .into_iter()
            .map(Actor::User)
            .chain(groups.into_iter().map(Actor::Group))
            .collect();
        self.hierarchy
            .repository()
            .delete_domain_cascade(id, &actors)
            .await?;
        tracing::info!(domain_id = %id, project_count = projects.len(), "deleted domain");
        Ok(())
    }

    /// Deletes a role with every assignment row referencing it, revoking
    /// the tokens of each user that held the role directly or through a
    /// group.
    pub async fn delete_role(&self, id: RoleId) -> AppResult<()> {
        if self.roles.find(id).await?.is_none() {
            return Err(AppError::NotFound(format!("role '{id}' was not found")));
        }

        let filter = AssignmentFilter {
            role_id: Some(id),
            ..AssignmentFilter::default()
        };
        let rows = self.assignments.query(&filter).await?;

        let mut dependents = Vec::new();
        for row in rows {
            match row.actor {
                Actor::User(user_id) => dependents.push(Dependent::UserTokens(user_id)),
                Actor::Group(group_id) => {
                    for member in self.directory.group_members(group_id).await? {
                        dependents.push(Dependent::UserTokens(member));
                    }
                }
            }
        }

        self.run_cascade(dependents).await?;
        // The role store cascade takes the rows granting the role with it.
        self.roles.delete(id).await?;
        tracing::info!(role_id = %id, "deleted role");
        Ok(())
    }

    /// Deletes a user with the assignment rows held by the user directly.
    ///
    /// Grants held by groups the user belongs to are untouched; the user
    /// simply stops matching them once the directory forgets the
    /// membership.
    pub async fn delete_user(&self, user_id: UserId) -> AppResult<()> {
        if !self.directory.user_exists(user_id).await? {
            return Err(AppError::NotFound(format!("user '{user_id}' was not found")));
        }

        self.run_cascade(vec![
            Dependent::UserCredentials(user_id),
            Dependent::UserTokens(user_id),
            Dependent::DirectoryUser(user_id),
        ])
        .await?;
        self.assignments.remove_owned_by(Actor::User(user_id)).await?;
        Ok(())
    }

    /// Deletes a group with the assignment rows held by it, revoking every
    /// current member's tokens.
    pub async fn delete_group(&self, group_id: GroupId) -> AppResult<()> {
        if !self.directory.group_exists(group_id).await? {
            return Err(AppError::NotFound(format!(
                "group '{group_id}' was not found"
            )));
        }

        let mut dependents = Vec::new();
        for member in self.directory.group_members(group_id).await? {
            dependents.push(Dependent::UserTokens(member));
        }
        dependents.push(Dependent::DirectoryGroup(group_id));

        self.run_cascade(dependents).await?;
        self.assignments.remove_owned_by(Actor::Group(group_id)).await?;
        Ok(())
    }
}

fn target_of(node: &ScopeNode) -> Target {
    if node.is_domain_root {
        Target::Domain(node.id)
    } else {
        Target::Project(node.id)
    }
}
