use async_trait::async_trait;
use trellis_core::{AppResult, ScopeId};
use trellis_domain::{Actor, ScopeNode};

/// Input payload for creating a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDomainInput {
    /// Domain name, unique case-sensitively across the system.
    pub name: String,
    /// Initial enabled state.
    pub enabled: bool,
}

/// Input payload for creating a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProjectInput {
    /// Project name, unique within the owning domain.
    pub name: String,
    /// Owning domain.
    pub domain_id: ScopeId,
    /// Parent project. Defaults to the domain root when absent.
    pub parent_id: Option<ScopeId>,
    /// Initial enabled state.
    pub enabled: bool,
}

/// Input payload for updating a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateDomainInput {
    /// New domain name.
    pub name: Option<String>,
}

/// Input payload for updating a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateProjectInput {
    /// New project name.
    pub name: Option<String>,
    /// New owning domain. Rejected while domain ownership is configured
    /// immutable.
    pub domain_id: Option<ScopeId>,
}

/// Repository port for the unified domain/project hierarchy.
///
/// Implementations must make the cascade operations all-or-nothing: a
/// failure partway through a domain or project delete leaves the store
/// unchanged.
#[async_trait]
pub trait HierarchyRepository: Send + Sync {
    /// Persists a new node. Fails with `Conflict` if the id exists.
    async fn insert_node(&self, node: ScopeNode) -> AppResult<()>;

    /// Looks up a node by id.
    async fn find_node(&self, id: ScopeId) -> AppResult<Option<ScopeNode>>;

    /// Looks up a domain root by its case-sensitive name.
    async fn find_domain_by_name(&self, name: &str) -> AppResult<Option<ScopeNode>>;

    /// Lists every domain root.
    async fn list_domain_roots(&self) -> AppResult<Vec<ScopeNode>>;

    /// Lists the direct children of a node.
    async fn list_children(&self, parent_id: ScopeId) -> AppResult<Vec<ScopeNode>>;

    /// Lists every node of a domain, the root included.
    async fn list_domain_nodes(&self, domain_id: ScopeId) -> AppResult<Vec<ScopeNode>>;

    /// Replaces a stored node. Fails with `NotFound` if absent.
    async fn update_node(&self, node: ScopeNode) -> AppResult<()>;

    /// Deletes a project node together with every assignment row targeting
    /// it, atomically.
    async fn delete_project_cascade(&self, id: ScopeId) -> AppResult<()>;

    /// Deletes every node of a domain deepest-first together with every
    /// assignment row targeting any of them or held by one of the given
    /// domain-scoped actors, atomically.
    async fn delete_domain_cascade(&self, domain_id: ScopeId, actors: &[Actor]) -> AppResult<()>;
}
