//! Shared fakes for service tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use trellis_core::{AppError, AppResult, GroupId, RoleId, ScopeId, UserId};
use trellis_domain::{Actor, Assignment, Role, ScopeNode, Target};

use crate::assignment_ports::{AssignmentFilter, AssignmentRepository, RoleRepository};
use crate::hierarchy_ports::HierarchyRepository;
use crate::identity_ports::{CredentialStore, IdentityDirectory};
use crate::{AssignmentService, EngineConfig, HierarchyService, LifecycleService};

pub(crate) fn ok<T>(result: AppResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("unexpected error: {error}"),
    }
}

#[derive(Default)]
struct StoreState {
    nodes: HashMap<ScopeId, ScopeNode>,
    roles: Vec<Role>,
    assignments: Vec<Assignment>,
}

/// Single in-memory store behind the hierarchy, role and assignment ports,
/// matching the production contract that the three share one backend and
/// each cascade is one atomic mutation.
#[derive(Default)]
pub(crate) struct FakeIdentityStore {
    state: RwLock<StoreState>,
}

impl FakeIdentityStore {
    pub(crate) async fn assignments(&self) -> Vec<Assignment> {
        self.state.read().await.assignments.clone()
    }
}

#[async_trait]
impl HierarchyRepository for FakeIdentityStore {
    async fn insert_node(&self, node: ScopeNode) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.nodes.contains_key(&node.id) {
            return Err(AppError::Conflict(format!(
                "scope '{}' already exists",
                node.id
            )));
        }
        state.nodes.insert(node.id, node);
        Ok(())
    }

    async fn find_node(&self, id: ScopeId) -> AppResult<Option<ScopeNode>> {
        Ok(self.state.read().await.nodes.get(&id).cloned())
    }

    async fn find_domain_by_name(&self, name: &str) -> AppResult<Option<ScopeNode>> {
        Ok(self
            .state
            .read()
            .await
            .nodes
            .values()
            .find(|node| node.is_domain_root && node.name.as_str() == name)
            .cloned())
    }

    async fn list_domain_roots(&self) -> AppResult<Vec<ScopeNode>> {
        Ok(self
            .state
            .read()
            .await
            .nodes
            .values()
            .filter(|node| node.is_domain_root)
            .cloned()
            .collect())
    }

    async fn list_children(&self, parent_id: ScopeId) -> AppResult<Vec<ScopeNode>> {
        Ok(self
            .state
            .read()
            .await
            .nodes
            .values()
            .filter(|node| node.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn list_domain_nodes(&self, domain_id: ScopeId) -> AppResult<Vec<ScopeNode>> {
        Ok(self
            .state
            .read()
            .await
            .nodes
            .values()
            .filter(|node| node.domain_id == domain_id)
            .cloned()
            .collect())
    }

    async fn update_node(&self, node: ScopeNode) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.nodes.contains_key(&node.id) {
            return Err(AppError::NotFound(format!(
                "scope '{}' was not found",
                node.id
            )));
        }
        state.nodes.insert(node.id, node);
        Ok(())
    }

    async fn delete_project_cascade(&self, id: ScopeId) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.nodes.remove(&id);
        state
            .assignments
            .retain(|assignment| assignment.target.scope_id() != id);
        Ok(())
    }

    async fn delete_domain_cascade(&self, domain_id: ScopeId, actors: &[Actor]) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.nodes.retain(|_, node| node.domain_id != domain_id);
        let remaining = state.nodes.clone();
        state.assignments.retain(|assignment| {
            remaining.contains_key(&assignment.target.scope_id())
                && !actors.contains(&assignment.actor)
        });
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for FakeIdentityStore {
    async fn insert(&self, role: Role) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.roles.iter().any(|stored| stored.name == role.name) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name.as_str()
            )));
        }
        state.roles.push(role);
        Ok(())
    }

    async fn find(&self, id: RoleId) -> AppResult<Option<Role>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .iter()
            .find(|role| role.id == id)
            .cloned())
    }

    async fn list(&self) -> AppResult<Vec<Role>> {
        let mut roles = self.state.read().await.roles.clone();
        roles.sort_by(|left, right| left.name.as_str().cmp(right.name.as_str()));
        Ok(roles)
    }

    async fn update(&self, role: Role) -> AppResult<()> {
        let mut state = self.state.write().await;
        let Some(stored) = state.roles.iter_mut().find(|stored| stored.id == role.id) else {
            return Err(AppError::NotFound(format!("role '{}' was not found", role.id)));
        };
        *stored = role;
        Ok(())
    }

    async fn delete(&self, id: RoleId) -> AppResult<()> {
        let mut state = self.state.write().await;
        let before = state.roles.len();
        state.roles.retain(|role| role.id != id);
        if state.roles.len() == before {
            return Err(AppError::NotFound(format!("role '{id}' was not found")));
        }
        state.assignments.retain(|row| row.role_id != id);
        Ok(())
    }
}

#[async_trait]
impl AssignmentRepository for FakeIdentityStore {
    async fn upsert(&self, assignment: Assignment) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.assignments.contains(&assignment) {
            state.assignments.push(assignment);
        }
        Ok(())
    }

    async fn remove(&self, assignment: &Assignment) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let before = state.assignments.len();
        state.assignments.retain(|row| row != assignment);
        Ok(state.assignments.len() != before)
    }

    async fn query(&self, filter: &AssignmentFilter) -> AppResult<Vec<Assignment>> {
        Ok(self
            .state
            .read()
            .await
            .assignments
            .iter()
            .filter(|row| filter.matches(row))
            .copied()
            .collect())
    }

    async fn remove_owned_by(&self, actor: Actor) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.assignments.len();
        state.assignments.retain(|row| row.actor != actor);
        Ok((before - state.assignments.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct FakeIdentityDirectory {
    users: RwLock<HashMap<UserId, ScopeId>>,
    groups: RwLock<HashMap<GroupId, ScopeId>>,
    members: RwLock<HashMap<GroupId, Vec<UserId>>>,
}

impl FakeIdentityDirectory {
    pub(crate) async fn add_user(&self, domain_id: ScopeId) -> UserId {
        let user_id = UserId::new();
        self.users.write().await.insert(user_id, domain_id);
        user_id
    }

    pub(crate) async fn add_group(&self, domain_id: ScopeId) -> GroupId {
        let group_id = GroupId::new();
        self.groups.write().await.insert(group_id, domain_id);
        group_id
    }

    pub(crate) async fn add_member(&self, group_id: GroupId, user_id: UserId) {
        self.members
            .write()
            .await
            .entry(group_id)
            .or_default()
            .push(user_id);
    }

}

#[async_trait]
impl IdentityDirectory for FakeIdentityDirectory {
    async fn user_exists(&self, user_id: UserId) -> AppResult<bool> {
        Ok(self.users.read().await.contains_key(&user_id))
    }

    async fn group_exists(&self, group_id: GroupId) -> AppResult<bool> {
        Ok(self.groups.read().await.contains_key(&group_id))
    }

    async fn group_members(&self, group_id: GroupId) -> AppResult<Vec<UserId>> {
        if !self.groups.read().await.contains_key(&group_id) {
            return Err(AppError::NotFound(format!(
                "group '{group_id}' was not found"
            )));
        }
        Ok(self
            .members
            .read()
            .await
            .get(&group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_domain_users(&self, domain_id: ScopeId) -> AppResult<Vec<UserId>> {
        let mut users: Vec<UserId> = self
            .users
            .read()
            .await
            .iter()
            .filter_map(|(user_id, owner)| (*owner == domain_id).then_some(*user_id))
            .collect();
        users.sort();
        Ok(users)
    }

    async fn list_domain_groups(&self, domain_id: ScopeId) -> AppResult<Vec<GroupId>> {
        let mut groups: Vec<GroupId> = self
            .groups
            .read()
            .await
            .iter()
            .filter_map(|(group_id, owner)| (*owner == domain_id).then_some(*group_id))
            .collect();
        groups.sort();
        Ok(groups)
    }

    async fn delete_user(&self, user_id: UserId) -> AppResult<()> {
        self.users.write().await.remove(&user_id);
        for members in self.members.write().await.values_mut() {
            members.retain(|member| *member != user_id);
        }
        Ok(())
    }

    async fn delete_group(&self, group_id: GroupId) -> AppResult<()> {
        self.groups.write().await.remove(&group_id);
        self.members.write().await.remove(&group_id);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingCredentialStore {
    pub(crate) revoked_scopes: Mutex<Vec<Target>>,
    pub(crate) revoked_users: Mutex<Vec<UserId>>,
    pub(crate) deleted_user_credentials: Mutex<Vec<UserId>>,
    pub(crate) deleted_project_credentials: Mutex<Vec<ScopeId>>,
    credential_deletes_fail: AtomicBool,
}

impl RecordingCredentialStore {
    /// Makes every later credential-delete call fail, simulating an
    /// unreachable credential store mid-cascade.
    pub(crate) fn fail_credential_deletes(&self) {
        self.credential_deletes_fail.store(true, Ordering::SeqCst);
    }

    fn check_available(&self) -> AppResult<()> {
        if self.credential_deletes_fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal(
                "credential store is unavailable".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for RecordingCredentialStore {
    async fn revoke_tokens_for_scope(&self, target: &Target) -> AppResult<()> {
        self.revoked_scopes.lock().await.push(*target);
        Ok(())
    }

    async fn revoke_tokens_for_user(&self, user_id: UserId) -> AppResult<()> {
        self.revoked_users.lock().await.push(user_id);
        Ok(())
    }

    async fn delete_credentials_for_user(&self, user_id: UserId) -> AppResult<()> {
        self.check_available()?;
        self.deleted_user_credentials.lock().await.push(user_id);
        Ok(())
    }

    async fn delete_credentials_for_project(&self, project_id: ScopeId) -> AppResult<()> {
        self.check_available()?;
        self.deleted_project_credentials.lock().await.push(project_id);
        Ok(())
    }
}

/// A fully wired engine over fakes, with handles kept for inspection.
pub(crate) struct Engine {
    pub(crate) hierarchy: HierarchyService,
    pub(crate) assignments: AssignmentService,
    pub(crate) lifecycle: LifecycleService,
    pub(crate) store: Arc<FakeIdentityStore>,
    pub(crate) directory: Arc<FakeIdentityDirectory>,
    pub(crate) credentials: Arc<RecordingCredentialStore>,
}

impl Engine {
    /// Rebuilds the services over the same backing stores with a new
    /// configuration.
    pub(crate) fn reconfigure(&self, config: EngineConfig) -> Engine {
        wire(
            config,
            self.store.clone(),
            self.directory.clone(),
            self.credentials.clone(),
        )
    }
}

pub(crate) fn engine(config: EngineConfig) -> Engine {
    wire(
        config,
        Arc::new(FakeIdentityStore::default()),
        Arc::new(FakeIdentityDirectory::default()),
        Arc::new(RecordingCredentialStore::default()),
    )
}

fn wire(
    config: EngineConfig,
    store: Arc<FakeIdentityStore>,
    directory: Arc<FakeIdentityDirectory>,
    credentials: Arc<RecordingCredentialStore>,
) -> Engine {
    let hierarchy = HierarchyService::new(store.clone(), config);
    let assignments = AssignmentService::new(
        hierarchy.clone(),
        store.clone(),
        store.clone(),
        directory.clone(),
        credentials.clone(),
    );
    let lifecycle = LifecycleService::new(
        hierarchy.clone(),
        store.clone(),
        store.clone(),
        directory.clone(),
        credentials.clone(),
    );

    Engine {
        hierarchy,
        assignments,
        lifecycle,
        store,
        directory,
        credentials,
    }
}
