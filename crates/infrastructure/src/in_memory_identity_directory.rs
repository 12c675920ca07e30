use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use trellis_application::IdentityDirectory;
use trellis_core::{AppError, AppResult, GroupId, ScopeId, UserId};

#[derive(Debug, Default)]
struct Records {
    users: HashMap<UserId, ScopeId>,
    groups: HashMap<GroupId, ScopeId>,
    members: HashMap<GroupId, Vec<UserId>>,
}

/// In-memory identity directory owning users, groups and membership.
#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    records: RwLock<Records>,
}

impl InMemoryIdentityDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user owned by the given domain.
    pub async fn create_user(&self, domain_id: ScopeId) -> UserId {
        let user_id = UserId::new();
        self.records.write().await.users.insert(user_id, domain_id);
        user_id
    }

    /// Registers a group owned by the given domain.
    pub async fn create_group(&self, domain_id: ScopeId) -> GroupId {
        let group_id = GroupId::new();
        self.records.write().await.groups.insert(group_id, domain_id);
        group_id
    }

    /// Adds a user to a group. Fails with `NotFound` when either side is
    /// absent.
    pub async fn add_member(&self, group_id: GroupId, user_id: UserId) -> AppResult<()> {
        let mut records = self.records.write().await;
        if !records.groups.contains_key(&group_id) {
            return Err(AppError::NotFound(format!(
                "group '{group_id}' was not found"
            )));
        }
        if !records.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("user '{user_id}' was not found")));
        }

        let members = records.members.entry(group_id).or_default();
        if !members.contains(&user_id) {
            members.push(user_id);
        }
        Ok(())
    }

    /// Removes a user from a group. Removing an absent membership is a
    /// no-op.
    pub async fn remove_member(&self, group_id: GroupId, user_id: UserId) {
        let mut records = self.records.write().await;
        if let Some(members) = records.members.get_mut(&group_id) {
            members.retain(|member| *member != user_id);
        }
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn user_exists(&self, user_id: UserId) -> AppResult<bool> {
        Ok(self.records.read().await.users.contains_key(&user_id))
    }

    async fn group_exists(&self, group_id: GroupId) -> AppResult<bool> {
        Ok(self.records.read().await.groups.contains_key(&group_id))
    }

    async fn group_members(&self, group_id: GroupId) -> AppResult<Vec<UserId>> {
        let records = self.records.read().await;
        if !records.groups.contains_key(&group_id) {
            return Err(AppError::NotFound(format!(
                "group '{group_id}' was not found"
            )));
        }
        Ok(records.members.get(&group_id).cloned().unwrap_or_default())
    }

    async fn list_domain_users(&self, domain_id: ScopeId) -> AppResult<Vec<UserId>> {
        let records = self.records.read().await;
        let mut users: Vec<UserId> = records
            .users
            .iter()
            .filter_map(|(user_id, owner)| (*owner == domain_id).then_some(*user_id))
            .collect();
        users.sort();
        Ok(users)
    }

    async fn list_domain_groups(&self, domain_id: ScopeId) -> AppResult<Vec<GroupId>> {
        let records = self.records.read().await;
        let mut groups: Vec<GroupId> = records
            .groups
            .iter()
            .filter_map(|(group_id, owner)| (*owner == domain_id).then_some(*group_id))
            .collect();
        groups.sort();
        Ok(groups)
    }

    async fn delete_user(&self, user_id: UserId) -> AppResult<()> {
        let mut records = self.records.write().await;
        records.users.remove(&user_id);
        for members in records.members.values_mut() {
            members.retain(|member| *member != user_id);
        }
        Ok(())
    }

    async fn delete_group(&self, group_id: GroupId) -> AppResult<()> {
        let mut records = self.records.write().await;
        records.groups.remove(&group_id);
        records.members.remove(&group_id);
        Ok(())
    }
}
