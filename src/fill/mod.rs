//! Fill orchestration.
//!
//! [`FillOrchestrator::preview_fill`] classifies and resolves without
//! opening a mutation boundary. [`FillOrchestrator::execute_fill`] opens one
//! boundary per active mode, commits it when the mode completes and leaves
//! it rolled back when the mode fails. Modes committed earlier in the same
//! run stay committed.

pub mod summary;

use crate::accounting::ProcessingAccountant;
use crate::config::{FillConfiguration, FillMode, LevelBand, ParameterTargets};
use crate::engine::room::{assign_legacy_room_parameters, assign_room_parameters, legacy_room_field};
use crate::engine::{
    BandClassification, GroupConflictResolver, GroupFillSummary, GroupIdentityResolver,
    LevelBandClassifier, ParameterWriteGuard, RoomOwnershipResolver, RoomTargets, SkipReason,
};
use crate::error::{FillError, HostError};
use crate::host::{ConflictResolver, ModelHost};
use crate::model::{Category, ElementId};
use chrono::Local;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub use summary::{LevelPreview, ModeSummary, PreviewSummary, ProcessingSummary, RoomPreview};

/// Elements processed between two progress callbacks.
pub const PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FillState {
    Idle,
    Validating,
    Aborted,
    Collecting,
    Classifying,
    Writing,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone)]
struct CollectedElement {
    id: ElementId,
    category: Category,
}

#[derive(Debug, Default)]
struct Collection {
    elements: Vec<CollectedElement>,
    per_category: BTreeMap<String, usize>,
    warnings: Vec<String>,
}

#[derive(Debug, Default)]
struct ModeTally {
    processed: usize,
    updated: BTreeSet<ElementId>,
    rooms: BTreeSet<ElementId>,
    group_fills: Vec<GroupFillSummary>,
}

impl ModeTally {
    fn tick<F: FnMut(usize, &str)>(&mut self, mode: FillMode, total: usize, progress: &mut F) {
        self.processed += 1;
        if self.processed % PROGRESS_INTERVAL == 0 {
            progress(
                self.processed,
                &format!("{mode}: {} of {total} elements", self.processed),
            );
        }
    }
}

/// Drives one preview or execute run against a host document.
pub struct FillOrchestrator<'h, H: ModelHost + ?Sized> {
    host: &'h mut H,
    state: FillState,
}

impl<'h, H: ModelHost + ?Sized> FillOrchestrator<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self {
            host,
            state: FillState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> FillState {
        self.state
    }

    fn transition(&mut self, next: FillState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "fill state changed");
            self.state = next;
        }
    }

    /// Estimates what [`execute_fill`](Self::execute_fill) would do. Never
    /// mutates the model; an invalid configuration yields a summary holding
    /// only the validation warning.
    pub fn preview_fill(&mut self, config: &FillConfiguration) -> PreviewSummary {
        let started = Instant::now();
        self.transition(FillState::Validating);
        let band = match config.validate(&*self.host) {
            Ok(band) => band,
            Err(err) => {
                warn!(error = %err, "preview skipped, configuration invalid");
                self.transition(FillState::Aborted);
                return PreviewSummary::invalid(
                    self.host.document_name(),
                    err.to_string(),
                    started.elapsed(),
                );
            }
        };

        self.transition(FillState::Collecting);
        let collection = collect(&*self.host, &config.categories);

        self.transition(FillState::Classifying);
        let host = &*self.host;
        let level = match (&band, config.modes.level) {
            (Some(band), true) => Some(preview_level(host, band, &collection.elements, config)),
            _ => None,
        };
        let rooms = config
            .modes
            .needs_rooms()
            .then(|| preview_rooms(host, config, &collection.elements));
        let groups = config.modes.groups.then(|| {
            GroupIdentityResolver::new()
                .with_category_filter(config.categories.clone())
                .preview(host)
        });

        let mut warnings = collection.warnings;
        if groups.as_ref().is_some_and(|g| g.instances == 0) {
            warnings.push("no placed groups in the model".to_string());
        }

        let summary = PreviewSummary {
            document: host.document_name().to_string(),
            valid: true,
            warnings,
            elements_scanned: collection.elements.len(),
            elements_per_category: collection.per_category,
            level,
            rooms,
            groups,
            duration: started.elapsed(),
        };
        info!(
            document = %summary.document,
            elements = summary.elements_scanned,
            "preview finished"
        );
        self.transition(FillState::Idle);
        summary
    }

    /// Applies every active mode, each inside its own mutation boundary.
    ///
    /// `progress` is called every [`PROGRESS_INTERVAL`] elements of a mode.
    ///
    /// # Errors
    ///
    /// [`FillError::Config`] when validation fails, before any mutation.
    /// [`FillError::ModeAborted`] when a mode's boundary cannot commit; that
    /// mode is rolled back, earlier modes stay committed.
    pub fn execute_fill<F>(
        &mut self,
        config: &FillConfiguration,
        mut progress: F,
    ) -> Result<ProcessingSummary, FillError>
    where
        F: FnMut(usize, &str),
    {
        let started_at = Local::now();
        let started = Instant::now();

        self.transition(FillState::Validating);
        let band = match config.validate(&*self.host) {
            Ok(band) => band,
            Err(err) => {
                self.transition(FillState::Aborted);
                return Err(err.into());
            }
        };

        self.transition(FillState::Collecting);
        let collection = collect(&*self.host, &config.categories);
        info!(
            document = self.host.document_name(),
            elements = collection.elements.len(),
            overwrite = config.overwrite_existing,
            "fill started"
        );

        let mut accountant = ProcessingAccountant::new();
        let mut guard = ParameterWriteGuard::new();
        let mut warnings = collection.warnings.clone();
        let mut modes = Vec::new();
        let mut committed = Vec::new();
        let mut updated = BTreeSet::new();
        let mut rooms = BTreeSet::new();
        let mut group_types = BTreeSet::new();
        let mut group_fills = Vec::new();

        for mode in config.modes.active() {
            let mode_started = Instant::now();
            let before = (
                accountant.success_count(),
                accountant.skip_count(),
                accountant.error_count(),
            );
            accountant.set_mode(Some(mode));
            self.transition(FillState::Classifying);

            let tally = match self.run_mode(
                mode,
                config,
                band.as_ref(),
                &collection.elements,
                &mut guard,
                &mut accountant,
                &mut progress,
            ) {
                Ok(tally) => tally,
                Err(source) => {
                    error!(%mode, error = %source, "mode rolled back");
                    return Err(FillError::ModeAborted {
                        mode,
                        committed,
                        source,
                    });
                }
            };
            committed.push(mode);

            if mode == FillMode::Level && !tally.updated.is_empty() {
                let ids: Vec<ElementId> = tally.updated.iter().copied().collect();
                if let Err(err) = self.host.isolate_elements(&ids) {
                    warn!(error = %err, "could not isolate updated elements");
                    warnings.push(format!("could not isolate updated elements: {err}"));
                }
            }

            modes.push(ModeSummary {
                mode,
                elements_processed: tally.processed,
                elements_updated: tally.updated.len(),
                successes: accountant.success_count() - before.0,
                skipped: accountant.skip_count() - before.1,
                errors: accountant.error_count() - before.2,
                duration: mode_started.elapsed(),
            });
            updated.extend(tally.updated);
            rooms.extend(tally.rooms);
            for fill in tally.group_fills {
                group_types.extend(fill.touched_types.iter().copied());
                group_fills.push(fill);
            }
        }
        accountant.set_mode(None);

        let log = accountant.into_log();
        let summary = ProcessingSummary {
            document: self.host.document_name().to_string(),
            started_at,
            duration: started.elapsed(),
            elements_scanned: collection.elements.len(),
            elements_updated: updated.len(),
            successful_writes: log.successes.len(),
            skipped: log.skips.len(),
            errors: log.errors.len(),
            skip_reasons: log.skip_reason_counts(),
            modes,
            rooms_touched: rooms.len(),
            group_types_touched: group_types.len(),
            group_fills,
            warnings,
            skipped_elements: log.skipped_by_reason(),
            log,
        };
        info!(
            updated = summary.elements_updated,
            skipped = summary.skipped,
            errors = summary.errors,
            elapsed_ms = summary.duration.as_millis(),
            "fill finished"
        );
        Ok(summary)
    }

    /// Runs one mode inside its own boundary. A panic inside the boundary
    /// rolls it back before unwinding further.
    #[allow(clippy::too_many_arguments)]
    fn run_mode<F: FnMut(usize, &str)>(
        &mut self,
        mode: FillMode,
        config: &FillConfiguration,
        band: Option<&LevelBand>,
        elements: &[CollectedElement],
        guard: &mut ParameterWriteGuard,
        accountant: &mut ProcessingAccountant,
        progress: &mut F,
    ) -> Result<ModeTally, HostError> {
        let resolver: Option<Box<dyn ConflictResolver>> = match mode {
            FillMode::Groups => Some(Box::new(GroupConflictResolver)),
            _ => None,
        };
        self.host
            .begin_transaction(&format!("Parameter auto-fill: {mode}"), resolver)?;
        self.transition(FillState::Writing);

        let host = &mut *self.host;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match mode {
            FillMode::RoomOnly | FillMode::RoomName | FillMode::RoomNumber => {
                fill_rooms(host, mode, config, elements, guard, accountant, progress)
            }
            FillMode::Groups => fill_groups(host, config, elements, guard, accountant, progress),
            FillMode::Level => band.map_or_else(ModeTally::default, |band| {
                fill_level(host, band, config, elements, guard, accountant, progress)
            }),
        }));

        match outcome {
            Ok(tally) => match self.host.commit_transaction() {
                Ok(()) => {
                    self.transition(FillState::Committed);
                    info!(%mode, processed = tally.processed, updated = tally.updated.len(), "mode committed");
                    Ok(tally)
                }
                Err(err) => {
                    self.transition(FillState::RolledBack);
                    Err(err)
                }
            },
            Err(payload) => {
                if let Err(err) = self.host.rollback_transaction() {
                    error!(%mode, error = %err, "rollback after panic failed");
                }
                self.transition(FillState::RolledBack);
                panic::resume_unwind(payload)
            }
        }
    }
}

/// Previews a fill on `host`. See [`FillOrchestrator::preview_fill`].
pub fn preview_fill<H: ModelHost + ?Sized>(host: &mut H, config: &FillConfiguration) -> PreviewSummary {
    FillOrchestrator::new(host).preview_fill(config)
}

/// Executes a fill on `host`. See [`FillOrchestrator::execute_fill`].
pub fn execute_fill<H, F>(
    host: &mut H,
    config: &FillConfiguration,
    progress: F,
) -> Result<ProcessingSummary, FillError>
where
    H: ModelHost + ?Sized,
    F: FnMut(usize, &str),
{
    FillOrchestrator::new(host).execute_fill(config, progress)
}

fn collect<H: ModelHost + ?Sized>(host: &H, categories: &[Category]) -> Collection {
    let mut collection = Collection::default();
    let mut seen = BTreeSet::new();
    for category in categories {
        let ids = host.elements_in_category(category);
        collection
            .per_category
            .insert(category.to_string(), ids.len());
        if ids.is_empty() {
            collection
                .warnings
                .push(format!("category '{category}' has no elements"));
        }
        for id in ids {
            if seen.insert(id) {
                collection.elements.push(CollectedElement {
                    id,
                    category: category.clone(),
                });
            }
        }
    }
    collection
}

fn room_targets(mode: FillMode, targets: &ParameterTargets) -> RoomTargets<'_> {
    match mode {
        FillMode::RoomNumber => RoomTargets {
            number: &targets.room_number,
            ..RoomTargets::default()
        },
        _ => RoomTargets {
            name: &targets.room_name,
            reference: &targets.room_reference,
            ..RoomTargets::default()
        },
    }
}

fn fill_rooms<H, F>(
    host: &mut H,
    mode: FillMode,
    config: &FillConfiguration,
    elements: &[CollectedElement],
    guard: &mut ParameterWriteGuard,
    accountant: &mut ProcessingAccountant,
    progress: &mut F,
) -> ModeTally
where
    H: ModelHost + ?Sized,
    F: FnMut(usize, &str),
{
    let resolver = RoomOwnershipResolver::for_document(&*host);
    let overwrite = config.overwrite_existing;
    let mut tally = ModeTally::default();

    for element in elements {
        match resolver.resolve(&*host, element.id) {
            None => accountant.record_skip(
                element.id,
                element.category.as_str(),
                SkipReason::NoRoom,
                "no enclosing room",
            ),
            Some(resolution) => {
                let written = if mode == FillMode::RoomOnly {
                    assign_legacy_room_parameters(
                        host,
                        guard,
                        accountant,
                        element.id,
                        &resolution.room,
                        &config.targets.room_only,
                        overwrite,
                    )
                } else {
                    assign_room_parameters(
                        host,
                        guard,
                        accountant,
                        element.id,
                        &resolution.room,
                        &room_targets(mode, &config.targets),
                        overwrite,
                    )
                };
                if written > 0 {
                    tally.updated.insert(element.id);
                    tally.rooms.insert(resolution.room.id);
                }
            }
        }
        tally.tick(mode, elements.len(), progress);
    }
    tally
}

fn fill_groups<H, F>(
    host: &mut H,
    config: &FillConfiguration,
    elements: &[CollectedElement],
    guard: &mut ParameterWriteGuard,
    accountant: &mut ProcessingAccountant,
    progress: &mut F,
) -> ModeTally
where
    H: ModelHost + ?Sized,
    F: FnMut(usize, &str),
{
    let resolver = GroupIdentityResolver::new()
        .with_aliases(config.group_aliases.clone())
        .with_category_filter(config.categories.clone());
    let mut tally = ModeTally::default();
    let total = elements.len();
    let collected: BTreeSet<ElementId> = elements.iter().map(|e| e.id).collect();
    let mut visited = BTreeSet::new();

    for target in &config.targets.groups {
        let fill = resolver.fill_from_groups_with(
            host,
            guard,
            accountant,
            target,
            config.overwrite_existing,
            config.include_group_element,
            |member| {
                if collected.contains(&member) && visited.insert(member) {
                    tally.tick(FillMode::Groups, total, progress);
                }
            },
        );
        tally.updated.extend(fill.updated_elements.iter().copied());
        tally.group_fills.push(fill);
    }

    let members = GroupIdentityResolver::member_ids(&*host);
    for element in elements {
        if visited.contains(&element.id) {
            continue;
        }
        if !members.contains(&element.id) && !host.is_group(element.id) {
            accountant.record_skip(
                element.id,
                element.category.as_str(),
                SkipReason::NoGroup,
                "not a member of any group",
            );
        }
        tally.tick(FillMode::Groups, total, progress);
    }
    tally
}

fn fill_level<H, F>(
    host: &mut H,
    band: &LevelBand,
    config: &FillConfiguration,
    elements: &[CollectedElement],
    guard: &mut ParameterWriteGuard,
    accountant: &mut ProcessingAccountant,
    progress: &mut F,
) -> ModeTally
where
    H: ModelHost + ?Sized,
    F: FnMut(usize, &str),
{
    let classifier = LevelBandClassifier::new(band.clone());
    let value = band.base.name.as_str();
    let mut tally = ModeTally::default();

    for element in elements {
        let category = element.category.as_str();
        match classifier.classify(&*host, element.id) {
            BandClassification::InBand => {
                let mut written = false;
                for parameter in &config.targets.level {
                    let result = guard.try_set(
                        host,
                        element.id,
                        parameter,
                        value,
                        config.overwrite_existing,
                    );
                    written |=
                        accountant.record_assignment(element.id, category, parameter, value, &result);
                }
                if written {
                    tally.updated.insert(element.id);
                }
            }
            BandClassification::BelowBand => accountant.record_skip(
                element.id,
                category,
                SkipReason::BelowBand,
                format!("below '{}'", band.base.name),
            ),
            BandClassification::AboveBand => accountant.record_skip(
                element.id,
                category,
                SkipReason::AboveBand,
                format!("above '{}'", band.top.name),
            ),
            BandClassification::NoBoundingBox => accountant.record_skip(
                element.id,
                category,
                SkipReason::NoBoundingBox,
                "no bounding box",
            ),
        }
        tally.tick(FillMode::Level, elements.len(), progress);
    }
    tally
}

fn preview_level<H: ModelHost + ?Sized>(
    host: &H,
    band: &LevelBand,
    elements: &[CollectedElement],
    config: &FillConfiguration,
) -> LevelPreview {
    let classifier = LevelBandClassifier::new(band.clone());
    let mut preview = LevelPreview::default();
    for element in elements {
        match classifier.classify(host, element.id) {
            BandClassification::InBand => {
                preview.in_band += 1;
                if config.targets.level.iter().any(|p| {
                    ParameterWriteGuard::check(host, element.id, p, config.overwrite_existing).is_ok()
                }) {
                    preview.would_update += 1;
                }
            }
            BandClassification::BelowBand => preview.below_band += 1,
            BandClassification::AboveBand => preview.above_band += 1,
            BandClassification::NoBoundingBox => preview.no_bounding_box += 1,
        }
    }
    preview
}

fn preview_rooms<H: ModelHost + ?Sized>(
    host: &H,
    config: &FillConfiguration,
    elements: &[CollectedElement],
) -> RoomPreview {
    let targets = &config.targets;
    let mut parameters: Vec<&str> = Vec::new();
    if config.modes.room_name {
        parameters.extend(
            targets
                .room_name
                .iter()
                .chain(&targets.room_reference)
                .map(String::as_str),
        );
    }
    if config.modes.room_number {
        parameters.extend(targets.room_number.iter().map(String::as_str));
    }
    if config.modes.room_only {
        parameters.extend(
            targets
                .room_only
                .iter()
                .map(String::as_str)
                .filter(|p| legacy_room_field(p).is_some()),
        );
    }

    let resolver = RoomOwnershipResolver::for_document(host);
    let mut rooms = BTreeSet::new();
    let mut preview = RoomPreview::default();
    for element in elements {
        let Some(resolution) = resolver.resolve(host, element.id) else {
            preview.without_room += 1;
            continue;
        };
        preview.with_room += 1;
        rooms.insert(resolution.room.id);
        *preview.by_method.entry(resolution.method).or_insert(0) += 1;
        if parameters.iter().any(|p| {
            ParameterWriteGuard::check(host, element.id, p, config.overwrite_existing).is_ok()
        }) {
            preview.would_update += 1;
        }
    }
    preview.unique_rooms = rooms.len();
    preview
}
