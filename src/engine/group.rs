//! Group identity resolution with one write per group type.
//!
//! Every placed instance of a group type shares its members' values, so the
//! resolver writes through exactly one representative instance per type and
//! never revisits the others. Writing group members outside a group edit
//! session makes the host raise group conflicts; [`GroupConflictResolver`]
//! acknowledges exactly those.

use super::category_label;
use super::guard::{ParameterAssignmentResult, ParameterWriteGuard, SkipReason};
use crate::accounting::ProcessingAccountant;
use crate::host::{Conflict, ConflictKind, ConflictResolution, ConflictResolver, ModelHost};
use crate::model::{Category, ElementId, GroupInstance};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Acknowledges the three conflicts produced by writing group members and
/// passes every other conflict through.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupConflictResolver;

impl GroupConflictResolver {
    #[must_use]
    pub fn handles(kind: &ConflictKind) -> bool {
        matches!(
            kind,
            ConflictKind::AtomViolationSingleInstance
                | ConflictKind::AtomViolationMultipleInstances
                | ConflictKind::ModifyingMultipleGroups
        )
    }
}

impl ConflictResolver for GroupConflictResolver {
    fn resolve(&self, conflict: &Conflict) -> ConflictResolution {
        if Self::handles(&conflict.kind) {
            debug!(kind = %conflict.kind, elements = conflict.elements.len(), "group conflict acknowledged");
            ConflictResolution::Acknowledge
        } else {
            ConflictResolution::PassThrough
        }
    }
}

/// Counters of one [`GroupIdentityResolver::fill_from_groups`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupFillSummary {
    pub target_parameter: String,
    pub instances_found: usize,
    pub group_types: usize,
    /// One instance id per group type, in type order.
    pub representatives: Vec<ElementId>,
    pub instances_skipped: usize,
    /// Guarded writes attempted on representative members.
    pub write_attempts: usize,
    pub members_updated: usize,
    /// Members of non-representative instances updated through propagation.
    pub members_propagated: usize,
    pub members_skipped: usize,
    pub members_failed: usize,
    pub nested_groups_skipped: usize,
    pub group_elements_updated: usize,
    pub updated_elements: BTreeSet<ElementId>,
    pub touched_types: BTreeSet<ElementId>,
}

/// Read-only estimate for previews.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupPreview {
    pub instances: usize,
    pub group_types: usize,
    pub members_to_visit: usize,
    pub nested_members: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GroupIdentityResolver {
    aliases: BTreeMap<String, String>,
    categories: Option<Vec<Category>>,
}

impl GroupIdentityResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Values used instead of the group name, keyed by group type name.
    #[must_use]
    pub fn with_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Members outside these categories are skipped as unmapped.
    #[must_use]
    pub fn with_category_filter(mut self, categories: Vec<Category>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Placed instances partitioned by group type.
    #[must_use]
    pub fn partition<H: ModelHost + ?Sized>(host: &H) -> BTreeMap<ElementId, Vec<GroupInstance>> {
        let mut partitions: BTreeMap<ElementId, Vec<GroupInstance>> = BTreeMap::new();
        for instance in host.group_instances() {
            partitions.entry(instance.type_id).or_default().push(instance);
        }
        for instances in partitions.values_mut() {
            instances.sort_by_key(|g| g.id);
        }
        partitions
    }

    /// The value written for a group: its type alias, else its name.
    #[must_use]
    pub fn value_for(&self, group: &GroupInstance) -> String {
        self.aliases
            .get(&group.type_name)
            .cloned()
            .unwrap_or_else(|| group.name.clone())
    }

    /// Every element that is a member of some placed group.
    #[must_use]
    pub fn member_ids<H: ModelHost + ?Sized>(host: &H) -> BTreeSet<ElementId> {
        host.group_instances()
            .iter()
            .flat_map(|g| host.group_members(g.id))
            .collect()
    }

    fn is_mapped(&self, category: Option<&Category>) -> bool {
        match (&self.categories, category) {
            (None, _) => true,
            (Some(allowed), Some(category)) => allowed.contains(category),
            (Some(_), None) => false,
        }
    }

    #[must_use]
    pub fn preview<H: ModelHost + ?Sized>(&self, host: &H) -> GroupPreview {
        let partitions = Self::partition(host);
        let mut preview = GroupPreview {
            instances: partitions.values().map(Vec::len).sum(),
            group_types: partitions.len(),
            ..GroupPreview::default()
        };
        for representative in partitions.values().filter_map(|p| p.first()) {
            for member in host.group_members(representative.id) {
                if host.is_group(member) {
                    preview.nested_members += 1;
                } else if self.is_mapped(host.category(member).as_ref()) {
                    preview.members_to_visit += 1;
                }
            }
        }
        preview
    }

    /// Writes each group's value onto the members of one representative
    /// instance per group type. Members of the other instances receive the
    /// value through the host and are accounted with the outcome of their
    /// representative counterpart.
    ///
    /// Must run inside a transaction carrying a [`GroupConflictResolver`].
    pub fn fill_from_groups<H: ModelHost + ?Sized>(
        &self,
        host: &mut H,
        guard: &mut ParameterWriteGuard,
        accountant: &mut ProcessingAccountant,
        target_parameter: &str,
        overwrite: bool,
        include_group_element: bool,
    ) -> GroupFillSummary {
        self.fill_from_groups_with(
            host,
            guard,
            accountant,
            target_parameter,
            overwrite,
            include_group_element,
            |_| {},
        )
    }

    /// [`fill_from_groups`](Self::fill_from_groups), calling `visit` once for
    /// every member as it is accounted.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_from_groups_with<H, V>(
        &self,
        host: &mut H,
        guard: &mut ParameterWriteGuard,
        accountant: &mut ProcessingAccountant,
        target_parameter: &str,
        overwrite: bool,
        include_group_element: bool,
        mut visit: V,
    ) -> GroupFillSummary
    where
        H: ModelHost + ?Sized,
        V: FnMut(ElementId),
    {
        let partitions = Self::partition(&*host);
        let mut summary = GroupFillSummary {
            target_parameter: target_parameter.to_string(),
            instances_found: partitions.values().map(Vec::len).sum(),
            group_types: partitions.len(),
            ..GroupFillSummary::default()
        };

        for (type_id, instances) in &partitions {
            let Some((representative, peers)) = instances.split_first() else {
                continue;
            };
            summary.representatives.push(representative.id);
            summary.instances_skipped += peers.len();

            let value = self.value_for(representative);
            let members = host.group_members(representative.id);
            debug!(
                group = %representative.name,
                instances = instances.len(),
                members = members.len(),
                "processing group type"
            );

            if value.trim().is_empty() {
                for member in instances.iter().flat_map(|g| host.group_members(g.id)) {
                    visit(member);
                    let category = category_label(&*host, member);
                    accountant.record_skip(
                        member,
                        &category,
                        SkipReason::NoGroup,
                        format!("group type {type_id} has no name"),
                    );
                    summary.members_skipped += 1;
                }
                continue;
            }

            let mut type_updated = false;
            // Outcome per member index; None when the member was not written.
            let mut outcomes: Vec<Option<ParameterAssignmentResult>> = Vec::with_capacity(members.len());
            for member in members {
                visit(member);
                let category = category_label(&*host, member);
                if host.is_group(member) {
                    warn!(%member, group = %representative.name, "nested group skipped");
                    accountant.record_skip(
                        member,
                        &category,
                        SkipReason::NestedGroup,
                        format!("nested group inside '{}'", representative.name),
                    );
                    summary.nested_groups_skipped += 1;
                    outcomes.push(None);
                    continue;
                }
                if !self.is_mapped(host.category(member).as_ref()) {
                    accountant.record_skip(
                        member,
                        &category,
                        SkipReason::UnmappedCategory,
                        format!("category '{category}' not selected"),
                    );
                    summary.members_skipped += 1;
                    outcomes.push(None);
                    continue;
                }

                summary.write_attempts += 1;
                let result = guard.try_set(host, member, target_parameter, &value, overwrite);
                if accountant.record_assignment(member, &category, target_parameter, &value, &result) {
                    summary.members_updated += 1;
                    summary.updated_elements.insert(member);
                    type_updated = true;
                } else if result.is_failure() {
                    summary.members_failed += 1;
                } else {
                    summary.members_skipped += 1;
                }
                outcomes.push(Some(result));
            }

            for peer in peers {
                for (index, member) in host.group_members(peer.id).into_iter().enumerate() {
                    visit(member);
                    let outcome = outcomes.get(index).cloned().flatten();
                    self.account_propagated(
                        &*host,
                        accountant,
                        &mut summary,
                        representative,
                        member,
                        outcome.as_ref(),
                        target_parameter,
                        &value,
                    );
                }
            }

            if include_group_element {
                let category = category_label(&*host, representative.id);
                let result =
                    guard.try_set(host, representative.id, target_parameter, &value, overwrite);
                if accountant.record_assignment(
                    representative.id,
                    &category,
                    target_parameter,
                    &value,
                    &result,
                ) {
                    summary.group_elements_updated += 1;
                    summary.updated_elements.insert(representative.id);
                    type_updated = true;
                }
            }

            if type_updated {
                summary.touched_types.insert(*type_id);
            }
        }

        info!(
            parameter = target_parameter,
            group_types = summary.group_types,
            instances = summary.instances_found,
            updated = summary.members_updated,
            propagated = summary.members_propagated,
            "group fill finished"
        );
        summary
    }

    /// Records a member of a non-representative instance. It is never
    /// written directly; the host propagated whatever its counterpart got.
    #[allow(clippy::too_many_arguments)]
    fn account_propagated<H: ModelHost + ?Sized>(
        &self,
        host: &H,
        accountant: &mut ProcessingAccountant,
        summary: &mut GroupFillSummary,
        representative: &GroupInstance,
        member: ElementId,
        outcome: Option<&ParameterAssignmentResult>,
        target_parameter: &str,
        value: &str,
    ) {
        let category = category_label(host, member);
        if host.is_group(member) {
            accountant.record_skip(
                member,
                &category,
                SkipReason::NestedGroup,
                format!("nested group inside an instance of '{}'", representative.type_name),
            );
            summary.nested_groups_skipped += 1;
            return;
        }
        if !self.is_mapped(host.category(member).as_ref()) {
            accountant.record_skip(
                member,
                &category,
                SkipReason::UnmappedCategory,
                format!("category '{category}' not selected"),
            );
            summary.members_skipped += 1;
            return;
        }

        match outcome {
            Some(ParameterAssignmentResult::Success) => {
                accountant.record_success(
                    member,
                    &category,
                    format!(
                        "{target_parameter} = \"{value}\" (propagated from group {})",
                        representative.id
                    ),
                );
                summary.members_propagated += 1;
                summary.updated_elements.insert(member);
            }
            Some(ParameterAssignmentResult::Skipped(reason)) => {
                accountant.record_skip(
                    member,
                    &category,
                    *reason,
                    format!("{target_parameter}: {reason} on group {}", representative.id),
                );
                summary.members_skipped += 1;
            }
            Some(ParameterAssignmentResult::Failed(reason)) => {
                accountant.record_error(
                    member,
                    &category,
                    format!("{target_parameter}: not propagated, write on group {} failed", representative.id),
                    Some(reason.to_string()),
                );
                summary.members_failed += 1;
            }
            None => {
                accountant.record_skip(
                    member,
                    &category,
                    SkipReason::NoGroup,
                    format!("no counterpart in group {}", representative.id),
                );
                summary.members_skipped += 1;
            }
        }
    }
}
