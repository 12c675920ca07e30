use trellis_core::{AppResult, GroupId, ScopeId, UserId};
use trellis_domain::Target;

use super::LifecycleService;

/// One collaborator deletion of a cascade.
///
/// Every lifecycle deletion signals its collaborators through a
/// declaration list of these, executed by the single
/// [`LifecycleService::run_cascade`] routine, so the four entity kinds
/// that cascade (project, domain, role, user/group) cannot drift apart in
/// how they clean up. Store rows are never touched here: the caller
/// commits its store mutation only after the whole list has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Dependent {
    /// Credentials owned by the user.
    UserCredentials(UserId),
    /// Credentials scoped to the project.
    ProjectCredentials(ScopeId),
    /// Tokens issued to the user.
    UserTokens(UserId),
    /// Tokens scoped to the target.
    ScopeTokens(Target),
    /// The user's directory record.
    DirectoryUser(UserId),
    /// The group's directory record.
    DirectoryGroup(GroupId),
}

impl LifecycleService {
    /// Executes collaborator deletions in declaration order, stopping at
    /// the first failure so a partial cascade aborts before the store is
    /// mutated.
    pub(super) async fn run_cascade(&self, dependents: Vec<Dependent>) -> AppResult<()> {
        for dependent in dependents {
            tracing::debug!(?dependent, "cascading dependent deletion");
            match dependent {
                Dependent::UserCredentials(user_id) => {
                    self.credentials.delete_credentials_for_user(user_id).await?;
                }
                Dependent::ProjectCredentials(project_id) => {
                    self.credentials
                        .delete_credentials_for_project(project_id)
                        .await?;
                }
                Dependent::UserTokens(user_id) => {
                    self.credentials.revoke_tokens_for_user(user_id).await?;
                }
                Dependent::ScopeTokens(target) => {
                    self.credentials.revoke_tokens_for_scope(&target).await?;
                }
                Dependent::DirectoryUser(user_id) => {
                    self.directory.delete_user(user_id).await?;
                }
                Dependent::DirectoryGroup(group_id) => {
                    self.directory.delete_group(group_id).await?;
                }
            }
        }
        Ok(())
    }
}
