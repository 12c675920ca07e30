use std::sync::Arc;

use trellis_core::{AppError, ScopeId};

use crate::hierarchy_ports::{CreateDomainInput, CreateProjectInput, UpdateProjectInput};
use crate::test_support::{FakeIdentityStore, ok};
use crate::{EngineConfig, HierarchyService};

fn service() -> HierarchyService {
    HierarchyService::new(
        Arc::new(FakeIdentityStore::default()),
        EngineConfig::new(ScopeId::new()),
    )
}

fn domain_input(name: &str) -> CreateDomainInput {
    CreateDomainInput {
        name: name.to_owned(),
        enabled: true,
    }
}

fn project_input(name: &str, domain_id: ScopeId, parent_id: Option<ScopeId>) -> CreateProjectInput {
    CreateProjectInput {
        name: name.to_owned(),
        domain_id,
        parent_id,
        enabled: true,
    }
}

#[tokio::test]
async fn domain_names_are_unique_and_case_sensitive() {
    let service = service();
    ok(service.create_domain(domain_input("Customers")).await);

    let duplicate = service.create_domain(domain_input("Customers")).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    // A differently cased name is a different domain.
    let other_case = service.create_domain(domain_input("customers")).await;
    assert!(other_case.is_ok());
}

#[tokio::test]
async fn project_parent_defaults_to_domain_root() {
    let service = service();
    let domain = ok(service.create_domain(domain_input("d")).await);
    let project = ok(service.create_project(project_input("p", domain.id, None)).await);

    assert_eq!(project.parent_id, Some(domain.id));
    assert_eq!(project.domain_id, domain.id);
    assert!(!project.is_domain_root);
}

#[tokio::test]
async fn project_cannot_cross_domain_boundaries() {
    let service = service();
    let domain_a = ok(service.create_domain(domain_input("a")).await);
    let domain_b = ok(service.create_domain(domain_input("b")).await);
    let parent = ok(service
        .create_project(project_input("p", domain_a.id, None))
        .await);

    let crossing = service
        .create_project(project_input("child", domain_b.id, Some(parent.id)))
        .await;
    assert!(matches!(crossing, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn ancestors_are_listed_root_first() {
    let service = service();
    let domain = ok(service.create_domain(domain_input("d")).await);
    let root = ok(service.create_project(project_input("root", domain.id, None)).await);
    let leaf = ok(service
        .create_project(project_input("leaf", domain.id, Some(root.id)))
        .await);

    let ancestors = ok(service.list_ancestors(leaf.id).await);
    let ids: Vec<_> = ancestors.iter().map(|node| node.id).collect();
    assert_eq!(ids, vec![domain.id, root.id]);
}

#[tokio::test]
async fn ancestor_tree_nests_the_node_innermost() {
    let service = service();
    let domain = ok(service.create_domain(domain_input("d")).await);
    let root = ok(service.create_project(project_input("root", domain.id, None)).await);
    let leaf = ok(service
        .create_project(project_input("leaf", domain.id, Some(root.id)))
        .await);

    let tree = ok(service.ancestor_tree(leaf.id).await);
    let lineage: Vec<_> = tree.flatten().into_iter().map(|node| node.id).collect();
    assert_eq!(lineage, vec![domain.id, root.id, leaf.id]);
}

#[tokio::test]
async fn subtree_is_deterministic_pre_order() {
    let service = service();
    let domain = ok(service.create_domain(domain_input("d")).await);
    let root = ok(service.create_project(project_input("root", domain.id, None)).await);
    let beta = ok(service
        .create_project(project_input("beta", domain.id, Some(root.id)))
        .await);
    let alpha = ok(service
        .create_project(project_input("alpha", domain.id, Some(root.id)))
        .await);
    let nested = ok(service
        .create_project(project_input("nested", domain.id, Some(alpha.id)))
        .await);

    let subtree = ok(service.list_subtree(root.id).await);
    let ids: Vec<_> = subtree.iter().map(|node| node.id).collect();
    // Children in name order, each child before its own descendants.
    assert_eq!(ids, vec![alpha.id, nested.id, beta.id]);

    let from_domain = ok(service.list_subtree(domain.id).await);
    assert_eq!(from_domain.len(), 4);
}

#[tokio::test]
async fn project_names_are_unique_within_a_domain_only() {
    let service = service();
    let domain_a = ok(service.create_domain(domain_input("a")).await);
    let domain_b = ok(service.create_domain(domain_input("b")).await);
    ok(service.create_project(project_input("p", domain_a.id, None)).await);

    let duplicate = service
        .create_project(project_input("p", domain_a.id, None))
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let sibling_domain = service
        .create_project(project_input("p", domain_b.id, None))
        .await;
    assert!(sibling_domain.is_ok());
}

#[tokio::test]
async fn project_domain_is_immutable_by_default() {
    let service = service();
    let domain_a = ok(service.create_domain(domain_input("a")).await);
    let domain_b = ok(service.create_domain(domain_input("b")).await);
    let project = ok(service
        .create_project(project_input("p", domain_a.id, None))
        .await);

    let moved = service
        .update_project(
            project.id,
            UpdateProjectInput {
                name: None,
                domain_id: Some(domain_b.id),
            },
        )
        .await;
    assert!(matches!(moved, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn leaf_project_moves_when_domain_is_mutable() {
    let repository = Arc::new(FakeIdentityStore::default());
    let mut config = EngineConfig::new(ScopeId::new());
    config.domain_id_immutable = false;
    let service = HierarchyService::new(repository, config);

    let domain_a = ok(service.create_domain(domain_input("a")).await);
    let domain_b = ok(service.create_domain(domain_input("b")).await);
    let project = ok(service
        .create_project(project_input("p", domain_a.id, None))
        .await);

    let moved = ok(service
        .update_project(
            project.id,
            UpdateProjectInput {
                name: None,
                domain_id: Some(domain_b.id),
            },
        )
        .await);
    assert_eq!(moved.domain_id, domain_b.id);
    assert_eq!(moved.parent_id, Some(domain_b.id));
}

#[tokio::test]
async fn missing_project_lookup_reports_not_found() {
    let service = service();
    let result = service.get_project(ScopeId::new()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
