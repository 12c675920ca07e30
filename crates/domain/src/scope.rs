use serde::{Deserialize, Serialize};
use trellis_core::{NonEmptyString, ScopeId};

/// One node of the scope hierarchy.
///
/// Domains and projects share a single representation: a domain is the root
/// node of its hierarchy, marked with `is_domain_root` and owning itself via
/// `domain_id`. Hierarchy walks treat both kinds uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeNode {
    /// Stable node identifier.
    pub id: ScopeId,
    /// Node name. Unique case-sensitively across domains, and within a
    /// domain across its projects.
    pub name: NonEmptyString,
    /// Owning domain root. Equals `id` for domain roots.
    pub domain_id: ScopeId,
    /// Parent node. `None` only for domain roots.
    pub parent_id: Option<ScopeId>,
    /// Marks the node as a domain root rather than a project.
    pub is_domain_root: bool,
    /// Enabled flag. An enabled node is only effective when every ancestor
    /// up to its domain root is enabled as well.
    pub enabled: bool,
}

impl ScopeNode {
    /// Creates a domain root node.
    #[must_use]
    pub fn domain_root(id: ScopeId, name: NonEmptyString, enabled: bool) -> Self {
        Self {
            id,
            name,
            domain_id: id,
            parent_id: None,
            is_domain_root: true,
            enabled,
        }
    }

    /// Creates a project node under the given parent.
    #[must_use]
    pub fn project(
        id: ScopeId,
        name: NonEmptyString,
        domain_id: ScopeId,
        parent_id: ScopeId,
        enabled: bool,
    ) -> Self {
        Self {
            id,
            name,
            domain_id,
            parent_id: Some(parent_id),
            is_domain_root: false,
            enabled,
        }
    }
}

/// A nested rendering of a hierarchy walk.
///
/// This is the `asList = false` shape of the ancestor and subtree listings:
/// the same lineage as the flat ordering, nested parent-over-children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTree {
    /// The node at this position of the walk.
    pub node: ScopeNode,
    /// Child subtrees, in the same deterministic order as the flat listing.
    pub children: Vec<ScopeTree>,
}

impl ScopeTree {
    /// Creates a leaf tree with no children.
    #[must_use]
    pub fn leaf(node: ScopeNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Flattens the tree back into pre-order lineage.
    #[must_use]
    pub fn flatten(&self) -> Vec<&ScopeNode> {
        let mut nodes = vec![&self.node];
        for child in &self.children {
            nodes.extend(child.flatten());
        }
        nodes
    }
}
