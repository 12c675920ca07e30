use std::collections::HashMap;
use std::sync::Arc;

use trellis_core::{AppError, AppResult, NonEmptyString, ScopeId};
use trellis_domain::{ScopeNode, ScopeTree};

use crate::EngineConfig;
use crate::hierarchy_ports::{
    CreateDomainInput, CreateProjectInput, HierarchyRepository, UpdateDomainInput,
    UpdateProjectInput,
};

#[cfg(test)]
mod tests;

/// Application service for the unified domain/project hierarchy.
///
/// Domains are root nodes of the same tree the projects live in, so every
/// walk here (ancestors, subtree) treats the two kinds uniformly.
#[derive(Clone)]
pub struct HierarchyService {
    repository: Arc<dyn HierarchyRepository>,
    config: EngineConfig,
}

impl HierarchyService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(repository: Arc<dyn HierarchyRepository>, config: EngineConfig) -> Self {
        Self { repository, config }
    }

    pub(crate) fn repository(&self) -> Arc<dyn HierarchyRepository> {
        Arc::clone(&self.repository)
    }

    pub(crate) fn config(&self) -> EngineConfig {
        self.config
    }

    /// Creates a domain with a system-wide unique, case-sensitive name.
    pub async fn create_domain(&self, input: CreateDomainInput) -> AppResult<ScopeNode> {
        let name = NonEmptyString::new(input.name)?;
        if self
            .repository
            .find_domain_by_name(name.as_str())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "domain '{}' already exists",
                name.as_str()
            )));
        }

        let node = ScopeNode::domain_root(ScopeId::new(), name, input.enabled);
        self.repository.insert_node(node.clone()).await?;
        tracing::info!(domain_id = %node.id, "created domain");
        Ok(node)
    }

    /// Creates a project under the given parent, or under the domain root
    /// when no parent is named.
    pub async fn create_project(&self, input: CreateProjectInput) -> AppResult<ScopeNode> {
        let name = NonEmptyString::new(input.name)?;
        let domain = self.get_domain(input.domain_id).await?;
        let parent_id = input.parent_id.unwrap_or(domain.id);
        let parent = self.get_node(parent_id).await?;
        if parent.domain_id != domain.id {
            return Err(AppError::Validation(format!(
                "parent scope '{parent_id}' belongs to a different domain"
            )));
        }

        self.ensure_project_name_free(domain.id, name.as_str(), None)
            .await?;

        let node = ScopeNode::project(ScopeId::new(), name, domain.id, parent_id, input.enabled);
        self.repository.insert_node(node.clone()).await?;
        tracing::info!(project_id = %node.id, domain_id = %domain.id, "created project");
        Ok(node)
    }

    /// Looks up any hierarchy node.
    pub async fn get_node(&self, id: ScopeId) -> AppResult<ScopeNode> {
        self.repository
            .find_node(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("scope '{id}' was not found")))
    }

    /// Looks up a domain root.
    pub async fn get_domain(&self, id: ScopeId) -> AppResult<ScopeNode> {
        match self.repository.find_node(id).await? {
            Some(node) if node.is_domain_root => Ok(node),
            _ => Err(AppError::NotFound(format!("domain '{id}' was not found"))),
        }
    }

    /// Looks up a project node.
    pub async fn get_project(&self, id: ScopeId) -> AppResult<ScopeNode> {
        match self.repository.find_node(id).await? {
            Some(node) if !node.is_domain_root => Ok(node),
            _ => Err(AppError::NotFound(format!("project '{id}' was not found"))),
        }
    }

    /// Lists every domain, name-ordered.
    pub async fn list_domains(&self) -> AppResult<Vec<ScopeNode>> {
        let mut roots = self.repository.list_domain_roots().await?;
        sort_nodes(&mut roots);
        Ok(roots)
    }

    /// Lists every project of a domain in deterministic pre-order.
    pub async fn list_projects(&self, domain_id: ScopeId) -> AppResult<Vec<ScopeNode>> {
        let domain = self.get_domain(domain_id).await?;
        self.list_subtree(domain.id).await
    }

    /// Lists the ancestors of a node, root first, the owning domain
    /// included and the node itself excluded.
    pub async fn list_ancestors(&self, id: ScopeId) -> AppResult<Vec<ScopeNode>> {
        let node = self.get_node(id).await?;
        let nodes = self.domain_nodes_by_id(node.domain_id).await?;

        let mut lineage = Vec::new();
        let mut cursor = node.parent_id;
        while let Some(parent_id) = cursor {
            let parent = nodes.get(&parent_id).ok_or_else(|| {
                AppError::Internal(format!("hierarchy is missing ancestor '{parent_id}'"))
            })?;
            cursor = parent.parent_id;
            lineage.push(parent.clone());
        }

        lineage.reverse();
        Ok(lineage)
    }

    /// Renders the lineage of a node as a nested tree, root outermost and
    /// the node itself as the innermost leaf.
    pub async fn ancestor_tree(&self, id: ScopeId) -> AppResult<ScopeTree> {
        let node = self.get_node(id).await?;
        let mut tree = ScopeTree::leaf(node);
        let ancestors = self.list_ancestors(id).await?;
        for ancestor in ancestors.into_iter().rev() {
            tree = ScopeTree {
                node: ancestor,
                children: vec![tree],
            };
        }
        Ok(tree)
    }

    /// Lists the descendants of a node in deterministic depth-first
    /// pre-order (children ordered by name), the node itself excluded.
    pub async fn list_subtree(&self, id: ScopeId) -> AppResult<Vec<ScopeNode>> {
        let tree = self.subtree_tree(id).await?;
        Ok(tree
            .flatten()
            .into_iter()
            .skip(1)
            .cloned()
            .collect())
    }

    /// Renders a node and its descendants as a nested tree.
    pub async fn subtree_tree(&self, id: ScopeId) -> AppResult<ScopeTree> {
        let node = self.get_node(id).await?;
        let children_of = self.children_by_parent(node.domain_id).await?;
        Ok(build_tree(node, &children_of))
    }

    /// Renames a domain.
    pub async fn update_domain(
        &self,
        id: ScopeId,
        input: UpdateDomainInput,
    ) -> AppResult<ScopeNode> {
        let mut domain = self.get_domain(id).await?;
        if let Some(raw_name) = input.name {
            let name = NonEmptyString::new(raw_name)?;
            match self.repository.find_domain_by_name(name.as_str()).await? {
                Some(existing) if existing.id != id => {
                    return Err(AppError::Conflict(format!(
                        "domain '{}' already exists",
                        name.as_str()
                    )));
                }
                _ => {}
            }
            domain.name = name;
        }

        self.repository.update_node(domain.clone()).await?;
        Ok(domain)
    }

    /// Renames a project, and moves it between domains when domain
    /// ownership is configured mutable.
    pub async fn update_project(
        &self,
        id: ScopeId,
        input: UpdateProjectInput,
    ) -> AppResult<ScopeNode> {
        let mut project = self.get_project(id).await?;

        if let Some(domain_id) = input.domain_id
            && domain_id != project.domain_id
        {
            if self.config.domain_id_immutable {
                return Err(AppError::Validation(
                    "the owning domain of a project is immutable".to_owned(),
                ));
            }
            if !self.repository.list_children(id).await?.is_empty() {
                return Err(AppError::Validation(format!(
                    "project '{id}' cannot move domains while it has children"
                )));
            }
            let new_domain = self.get_domain(domain_id).await?;
            project.domain_id = new_domain.id;
            project.parent_id = Some(new_domain.id);
        }

        if let Some(raw_name) = input.name {
            let name = NonEmptyString::new(raw_name)?;
            self.ensure_project_name_free(project.domain_id, name.as_str(), Some(id))
                .await?;
            project.name = name;
        }

        self.repository.update_node(project.clone()).await?;
        Ok(project)
    }

    async fn ensure_project_name_free(
        &self,
        domain_id: ScopeId,
        name: &str,
        exclude: Option<ScopeId>,
    ) -> AppResult<()> {
        let nodes = self.repository.list_domain_nodes(domain_id).await?;
        let taken = nodes.iter().any(|node| {
            !node.is_domain_root && node.name.as_str() == name && Some(node.id) != exclude
        });
        if taken {
            return Err(AppError::Conflict(format!(
                "project '{name}' already exists in domain '{domain_id}'"
            )));
        }
        Ok(())
    }

    async fn domain_nodes_by_id(
        &self,
        domain_id: ScopeId,
    ) -> AppResult<HashMap<ScopeId, ScopeNode>> {
        let nodes = self.repository.list_domain_nodes(domain_id).await?;
        Ok(nodes.into_iter().map(|node| (node.id, node)).collect())
    }

    async fn children_by_parent(
        &self,
        domain_id: ScopeId,
    ) -> AppResult<HashMap<ScopeId, Vec<ScopeNode>>> {
        let nodes = self.repository.list_domain_nodes(domain_id).await?;
        let mut children_of: HashMap<ScopeId, Vec<ScopeNode>> = HashMap::new();
        for node in nodes {
            if let Some(parent_id) = node.parent_id {
                children_of.entry(parent_id).or_default().push(node);
            }
        }
        for children in children_of.values_mut() {
            sort_nodes(children);
        }
        Ok(children_of)
    }
}

fn sort_nodes(nodes: &mut [ScopeNode]) {
    nodes.sort_by(|left, right| {
        left.name
            .as_str()
            .cmp(right.name.as_str())
            .then_with(|| left.id.cmp(&right.id))
    });
}

fn build_tree(node: ScopeNode, children_of: &HashMap<ScopeId, Vec<ScopeNode>>) -> ScopeTree {
    let children = children_of
        .get(&node.id)
        .map(|children| {
            children
                .iter()
                .map(|child| build_tree(child.clone(), children_of))
                .collect()
        })
        .unwrap_or_default();
    ScopeTree { node, children }
}
