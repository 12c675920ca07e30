use std::collections::HashSet;

use trellis_core::AppResult;
use trellis_domain::{Actor, Assignment, ResolvedAssignment, Target};

use crate::assignment_ports::AssignmentFilter;

use super::AssignmentService;

impl AssignmentService {
    /// Lists assignments matching the filter.
    ///
    /// With `effective = false` the stored rows are rendered verbatim.
    /// With `effective = true` two expansions run over the raw rows and
    /// their union is returned:
    ///
    /// 1. group expansion — a group grant becomes one entry per current
    ///    member user, membership read from the directory at query time;
    /// 2. inheritance expansion — an inherited grant becomes one entry per
    ///    project in the target's subtree, target rewritten to the project
    ///    and the inherited flag cleared. Inherited rows contribute
    ///    nothing at their own scope.
    ///
    /// The two expansions operate on independent axes (actor vs. target)
    /// and compose; results are deduplicated by (user, scope, role) with
    /// direct entries winning so their link stays their own address.
    ///
    /// A filter with `inherited = Some(true)` short-circuits to the stored
    /// inherited rows regardless of `effective`.
    pub async fn list_assignments(
        &self,
        filter: &AssignmentFilter,
        effective: bool,
    ) -> AppResult<Vec<ResolvedAssignment>> {
        if !effective || filter.inherited == Some(true) {
            let rows = self.assignments.query(filter).await?;
            return Ok(rows.into_iter().map(ResolvedAssignment::direct).collect());
        }

        // Expansion can turn a row that misses the filter into entries
        // that match it (and vice versa), so query broadly and filter the
        // expanded results.
        let raw_filter = AssignmentFilter {
            role_id: filter.role_id,
            ..AssignmentFilter::default()
        };
        let rows = self.assignments.query(&raw_filter).await?;

        let mut direct_entries = Vec::new();
        let mut derived_entries = Vec::new();
        for row in rows {
            for target in self.effective_targets(&row).await? {
                self.emit_entries(row, target, &mut direct_entries, &mut derived_entries)
                    .await?;
            }
        }

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for entry in direct_entries.into_iter().chain(derived_entries) {
            if !entry_matches(filter, &entry) {
                continue;
            }
            if seen.insert((entry.actor, entry.target, entry.role_id)) {
                results.push(entry);
            }
        }
        Ok(results)
    }

    /// Returns the concrete scopes a stored row applies to in effective
    /// mode.
    async fn effective_targets(&self, row: &Assignment) -> AppResult<Vec<Target>> {
        if !row.inherited {
            return Ok(vec![row.target]);
        }
        // Checked per request so toggling the extension takes effect
        // immediately; the stored rows are left in place.
        if !self.hierarchy.config().inheritance_enabled {
            return Ok(Vec::new());
        }

        let descendants = match row.target {
            Target::Domain(domain_id) => self.hierarchy.list_projects(domain_id).await?,
            Target::Project(project_id) => self.hierarchy.list_subtree(project_id).await?,
        };
        Ok(descendants
            .into_iter()
            .map(|node| Target::Project(node.id))
            .collect())
    }

    async fn emit_entries(
        &self,
        row: Assignment,
        target: Target,
        direct_entries: &mut Vec<ResolvedAssignment>,
        derived_entries: &mut Vec<ResolvedAssignment>,
    ) -> AppResult<()> {
        match row.actor {
            Actor::User(user_id) => {
                if row.inherited {
                    derived_entries.push(ResolvedAssignment::derived(user_id, target, row));
                } else {
                    direct_entries.push(ResolvedAssignment::direct(row));
                }
            }
            Actor::Group(group_id) => {
                for member in self.directory.group_members(group_id).await? {
                    derived_entries.push(ResolvedAssignment::derived(member, target, row));
                }
            }
        }
        Ok(())
    }
}

/// Applies the caller's filter to an expanded entry.
///
/// Matching is against the entry's own actor and concrete scope, which is
/// what makes a domain-target filter in effective mode select grants on
/// that literal domain only: inheritance-expanded entries always carry a
/// project scope.
fn entry_matches(filter: &AssignmentFilter, entry: &ResolvedAssignment) -> bool {
    filter.actor.is_none_or(|actor| entry.actor == actor)
        && filter.target.is_none_or(|target| entry.target == target)
        && filter.role_id.is_none_or(|role_id| entry.role_id == role_id)
}
