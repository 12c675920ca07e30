use async_trait::async_trait;
use trellis_core::{AppResult, GroupId, ScopeId, UserId};
use trellis_domain::Target;

/// Read and cascade contract of the identity directory collaborator.
///
/// The directory owns users, groups and group membership. Membership is
/// read at query time on every evaluation; the engine never caches it.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Returns whether a user exists.
    async fn user_exists(&self, user_id: UserId) -> AppResult<bool>;

    /// Returns whether a group exists.
    async fn group_exists(&self, group_id: GroupId) -> AppResult<bool>;

    /// Returns the current members of a group. Fails with `NotFound` when
    /// the group is absent.
    async fn group_members(&self, group_id: GroupId) -> AppResult<Vec<UserId>>;

    /// Lists every user owned by a domain.
    async fn list_domain_users(&self, domain_id: ScopeId) -> AppResult<Vec<UserId>>;

    /// Lists every group owned by a domain.
    async fn list_domain_groups(&self, domain_id: ScopeId) -> AppResult<Vec<GroupId>>;

    /// Deletes a user record as part of a cascade.
    async fn delete_user(&self, user_id: UserId) -> AppResult<()>;

    /// Deletes a group record as part of a cascade.
    async fn delete_group(&self, group_id: GroupId) -> AppResult<()>;
}

/// Revocation and cascade contract of the credential/token collaborator.
///
/// Calls are fallible remote signals invoked synchronously inside the
/// mutating operation that requires them; the engine performs no retries.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Invalidates every token scoped to the given target.
    async fn revoke_tokens_for_scope(&self, target: &Target) -> AppResult<()>;

    /// Invalidates every token issued to the given user.
    async fn revoke_tokens_for_user(&self, user_id: UserId) -> AppResult<()>;

    /// Deletes credentials owned by the given user.
    async fn delete_credentials_for_user(&self, user_id: UserId) -> AppResult<()>;

    /// Deletes credentials scoped to the given project.
    async fn delete_credentials_for_project(&self, project_id: ScopeId) -> AppResult<()>;
}
