use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use trellis_application::{
    AssignmentFilter, AssignmentRepository, HierarchyRepository, RoleRepository,
};
use trellis_core::{AppError, AppResult, RoleId, ScopeId};
use trellis_domain::{Actor, Assignment, Role, ScopeNode};


#[derive(Debug, Default)]
struct State {
    nodes: HashMap<ScopeId, ScopeNode>,
    roles: Vec<Role>,
    assignments: Vec<Assignment>,
}

/// In-memory identity store backing the hierarchy, role and assignment
/// ports together.
///
/// All three ports share one lock, so a cascade runs against a single
/// consistent view of the store: a domain deletion removes the subtree,
/// the assignment rows scoped to it and the rows held by the domain's
/// actors under one write guard.
#[derive(Debug, Default)]
pub struct InMemoryIdentityBackend {
    state: RwLock<State>,
}

impl InMemoryIdentityBackend {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HierarchyRepository for InMemoryIdentityBackend {
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
impl RoleRepository for InMemoryIdentityBackend {
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
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                role.id
            )));
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
impl AssignmentRepository for InMemoryIdentityBackend {
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
