use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use trellis_application::{
    AssignmentFilter, AssignmentRepository, HierarchyRepository, RoleRepository,
};
use trellis_core::{AppError, AppResult, GroupId, NonEmptyString, RoleId, ScopeId, UserId};
use trellis_domain::{Actor, Assignment, Role, ScopeNode, Target};
use uuid::Uuid;


/// PostgreSQL-backed identity store for the hierarchy, role and assignment
/// ports.
///
/// Cascading deletions run as single statements; referential integrity
/// between scopes, roles and assignment rows is enforced by the schema, so
/// removing a scope or role can never leave dangling grant tuples.
#[derive(Clone)]
pub struct PostgresIdentityBackend {
    pool: PgPool,
}

impl PostgresIdentityBackend {
    /// Creates a backend with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ScopeRow {
    id: Uuid,
    name: String,
    domain_id: Uuid,
    parent_id: Option<Uuid>,
    is_domain_root: bool,
    enabled: bool,
}

impl ScopeRow {
    fn into_node(self) -> AppResult<ScopeNode> {
        let name = NonEmptyString::new(self.name)
            .map_err(|error| AppError::Internal(format!("failed to decode scope name: {error}")))?;
        Ok(ScopeNode {
            id: ScopeId::from_uuid(self.id),
            name,
            domain_id: ScopeId::from_uuid(self.domain_id),
            parent_id: self.parent_id.map(ScopeId::from_uuid),
            is_domain_root: self.is_domain_root,
            enabled: self.enabled,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
}

impl RoleRow {
    fn into_role(self) -> AppResult<Role> {
        let name = NonEmptyString::new(self.name)
            .map_err(|error| AppError::Internal(format!("failed to decode role name: {error}")))?;
        Ok(Role {
            id: RoleId::from_uuid(self.id),
            name,
        })
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    actor_type: String,
    actor_id: Uuid,
    target_type: String,
    target_id: Uuid,
    role_id: Uuid,
    inherited: bool,
}

impl AssignmentRow {
    fn into_assignment(self) -> AppResult<Assignment> {
        let actor = match self.actor_type.as_str() {
            "user" => Actor::User(UserId::from_uuid(self.actor_id)),
            "group" => Actor::Group(GroupId::from_uuid(self.actor_id)),
            other => {
                return Err(AppError::Internal(format!(
                    "failed to decode actor type '{other}'"
                )));
            }
        };
        let target = decode_target(self.target_type.as_str(), self.target_id)?;
        Ok(Assignment {
            actor,
            target,
            role_id: RoleId::from_uuid(self.role_id),
            inherited: self.inherited,
        })
    }
}

fn decode_target(target_type: &str, target_id: Uuid) -> AppResult<Target> {
    match target_type {
        "domain" => Ok(Target::Domain(ScopeId::from_uuid(target_id))),
        "project" => Ok(Target::Project(ScopeId::from_uuid(target_id))),
        other => Err(AppError::Internal(format!(
            "failed to decode target type '{other}'"
        ))),
    }
}

fn actor_columns(actor: Actor) -> (&'static str, Uuid) {
    match actor {
        Actor::User(user_id) => ("user", user_id.as_uuid()),
        Actor::Group(group_id) => ("group", group_id.as_uuid()),
    }
}

fn target_columns(target: Target) -> (&'static str, Uuid) {
    match target {
        Target::Domain(id) => ("domain", id.as_uuid()),
        Target::Project(id) => ("project", id.as_uuid()),
    }
}

fn map_insert_error(error: sqlx::Error, conflict: String, context: &str) -> AppError {
    if error
        .as_database_error()
        .is_some_and(|db_error| db_error.is_unique_violation())
    {
        return AppError::Conflict(conflict);
    }
    AppError::Internal(format!("{context}: {error}"))
}

#[async_trait]
impl HierarchyRepository for PostgresIdentityBackend {
    async fn insert_node(&self, node: ScopeNode) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scopes (id, name, domain_id, parent_id, is_domain_root, enabled)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(node.id.as_uuid())
        .bind(node.name.as_str())
        .bind(node.domain_id.as_uuid())
        .bind(node.parent_id.map(|parent_id| parent_id.as_uuid()))
        .bind(node.is_domain_root)
        .bind(node.enabled)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_insert_error(
                error,
                format!("scope '{}' already exists", node.name.as_str()),
                "failed to insert scope",
            )
        })?;
        Ok(())
    }

    async fn find_node(&self, id: ScopeId) -> AppResult<Option<ScopeNode>> {
        let row = sqlx::query_as::<_, ScopeRow>(
            r#"
            SELECT id, name, domain_id, parent_id, is_domain_root, enabled
            FROM scopes
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load scope: {error}")))?;

        row.map(ScopeRow::into_node).transpose()
    }

    async fn find_domain_by_name(&self, name: &str) -> AppResult<Option<ScopeNode>> {
        let row = sqlx::query_as::<_, ScopeRow>(
            r#"
            SELECT id, name, domain_id, parent_id, is_domain_root, enabled
            FROM scopes
            WHERE is_domain_root AND name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up domain: {error}")))?;

        row.map(ScopeRow::into_node).transpose()
    }

    async fn list_domain_roots(&self) -> AppResult<Vec<ScopeNode>> {
        let rows = sqlx::query_as::<_, ScopeRow>(
            r#"
            SELECT id, name, domain_id, parent_id, is_domain_root, enabled
            FROM scopes
            WHERE is_domain_root
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list domains: {error}")))?;

        rows.into_iter().map(ScopeRow::into_node).collect()
    }

    async fn list_children(&self, parent_id: ScopeId) -> AppResult<Vec<ScopeNode>> {
        let rows = sqlx::query_as::<_, ScopeRow>(
            r#"
            SELECT id, name, domain_id, parent_id, is_domain_root, enabled
            FROM scopes
            WHERE parent_id = $1
            "#,
        )
        .bind(parent_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list children: {error}")))?;

        rows.into_iter().map(ScopeRow::into_node).collect()
    }

    async fn list_domain_nodes(&self, domain_id: ScopeId) -> AppResult<Vec<ScopeNode>> {
        let rows = sqlx::query_as::<_, ScopeRow>(
            r#"
            SELECT id, name, domain_id, parent_id, is_domain_root, enabled
            FROM scopes
            WHERE domain_id = $1
            "#,
        )
        .bind(domain_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list domain scopes: {error}")))?;

        rows.into_iter().map(ScopeRow::into_node).collect()
    }

    async fn update_node(&self, node: ScopeNode) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE scopes
            SET name = $2, domain_id = $3, parent_id = $4, enabled = $5
            WHERE id = $1
            "#,
        )
        .bind(node.id.as_uuid())
        .bind(node.name.as_str())
        .bind(node.domain_id.as_uuid())
        .bind(node.parent_id.map(|parent_id| parent_id.as_uuid()))
        .bind(node.enabled)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update scope: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "scope '{}' was not found",
                node.id
            )));
        }
        Ok(())
    }

    async fn delete_project_cascade(&self, id: ScopeId) -> AppResult<()> {
        sqlx::query("DELETE FROM scopes WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete project: {error}")))?;
        Ok(())
    }

    async fn delete_domain_cascade(&self, domain_id: ScopeId, actors: &[Actor]) -> AppResult<()> {
        // One transaction removes the actor-held rows and the whole tree;
        // the rows targeting deleted scopes follow via the schema's
        // foreign keys.
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start domain delete: {error}"))
        })?;

        for actor in actors {
            let (actor_type, actor_id) = actor_columns(*actor);
            sqlx::query("DELETE FROM assignments WHERE actor_type = $1 AND actor_id = $2")
                .bind(actor_type)
                .bind(actor_id)
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to delete actor assignments: {error}"))
                })?;
        }
        sqlx::query("DELETE FROM scopes WHERE domain_id = $1")
            .bind(domain_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete domain: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit domain delete: {error}"))
        })?;
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for PostgresIdentityBackend {
    async fn insert(&self, role: Role) -> AppResult<()> {
        sqlx::query("INSERT INTO roles (id, name) VALUES ($1, $2)")
            .bind(role.id.as_uuid())
            .bind(role.name.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                map_insert_error(
                    error,
                    format!("role '{}' already exists", role.name.as_str()),
                    "failed to insert role",
                )
            })?;
        Ok(())
    }

    async fn find(&self, id: RoleId) -> AppResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>("SELECT id, name FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?;

        row.map(RoleRow::into_role).transpose()
    }

    async fn list(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>("SELECT id, name FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(RoleRow::into_role).collect()
    }

    async fn update(&self, role: Role) -> AppResult<()> {
        let result = sqlx::query("UPDATE roles SET name = $2 WHERE id = $1")
            .bind(role.id.as_uuid())
            .bind(role.name.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                map_insert_error(
                    error,
                    format!("role '{}' already exists", role.name.as_str()),
                    "failed to update role",
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                role.id
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: RoleId) -> AppResult<()> {
        // Assignment rows granting the role follow via the foreign key.
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role '{id}' was not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl AssignmentRepository for PostgresIdentityBackend {
    async fn upsert(&self, assignment: Assignment) -> AppResult<()> {
        let (actor_type, actor_id) = actor_columns(assignment.actor);
        let (target_type, target_id) = target_columns(assignment.target);

        sqlx::query(
            r#"
            INSERT INTO assignments (actor_type, actor_id, target_type, target_id, role_id, inherited)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (actor_type, actor_id, target_type, target_id, role_id, inherited)
                DO NOTHING
            "#,
        )
        .bind(actor_type)
        .bind(actor_id)
        .bind(target_type)
        .bind(target_id)
        .bind(assignment.role_id.as_uuid())
        .bind(assignment.inherited)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert assignment: {error}")))?;
        Ok(())
    }

    async fn remove(&self, assignment: &Assignment) -> AppResult<bool> {
        let (actor_type, actor_id) = actor_columns(assignment.actor);
        let (target_type, target_id) = target_columns(assignment.target);

        let result = sqlx::query(
            r#"
            DELETE FROM assignments
            WHERE actor_type = $1 AND actor_id = $2
                AND target_type = $3 AND target_id = $4
                AND role_id = $5 AND inherited = $6
            "#,
        )
        .bind(actor_type)
        .bind(actor_id)
        .bind(target_type)
        .bind(target_id)
        .bind(assignment.role_id.as_uuid())
        .bind(assignment.inherited)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete assignment: {error}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, filter: &AssignmentFilter) -> AppResult<Vec<Assignment>> {
        // Rows are few per referent and the filter shape varies; loading in
        // insertion order and filtering in process keeps one query path.
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT actor_type, actor_id, target_type, target_id, role_id, inherited
            FROM assignments
            ORDER BY position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list assignments: {error}")))?;

        let assignments: AppResult<Vec<Assignment>> = rows
            .into_iter()
            .map(AssignmentRow::into_assignment)
            .collect();
        Ok(assignments?
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect())
    }

    async fn remove_owned_by(&self, actor: Actor) -> AppResult<u64> {
        let (actor_type, actor_id) = actor_columns(actor);
        let result = sqlx::query("DELETE FROM assignments WHERE actor_type = $1 AND actor_id = $2")
            .bind(actor_type)
            .bind(actor_id)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete assignments: {error}")))?;

        Ok(result.rows_affected())
    }
}
