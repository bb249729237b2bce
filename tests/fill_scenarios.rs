use param_autofill::config::{FillConfiguration, FillMode, ParameterTargets};
use param_autofill::engine::{DetectionMethod, SkipReason};
use param_autofill::error::{ConfigError, FillError, HostError};
use param_autofill::fill::{FillOrchestrator, FillState};
use param_autofill::host::{Conflict, ConflictKind, ElementRecord, MemoryModel};
use param_autofill::model::{BoundingBox, ElementId, GroupInstance, Level, Parameter, Point3, Room};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

const PARAMETERS: &[&str] = &["Level", "Room Name", "Room Number", "Room Ref"];

fn bbox(min: (f64, f64, f64), max: (f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(Point3::new(min.0, min.1, min.2), Point3::new(max.0, max.1, max.2))
}

/// Two levels, two side-by-side rooms and a handful of walls and doors.
fn tower() -> MemoryModel {
    let mut model = MemoryModel::new("Tower");
    model
        .insert_level(Level::new(100, "L1", 0.0))
        .insert_level(Level::new(101, "L2", 10.0))
        .insert_room(Room::new(200, "101", "Office"), bbox((0.0, 0.0, -1.0), (10.0, 10.0, 30.0)), None)
        .insert_room(Room::new(201, "102", "Lobby"), bbox((10.0, 0.0, -1.0), (20.0, 10.0, 30.0)), None)
        .insert_element(
            ElementRecord::new(1, "Walls")
                .with_bounding_box(bbox((2.0, 2.0, 5.0), (4.0, 4.0, 12.0)))
                .with_empty_parameters(PARAMETERS),
        )
        .insert_element(
            ElementRecord::new(2, "Walls")
                .with_bounding_box(bbox((12.0, 2.0, 10.0), (14.0, 4.0, 15.0)))
                .with_empty_parameters(PARAMETERS),
        )
        .insert_element(
            ElementRecord::new(3, "Walls")
                .with_bounding_box(bbox((2.0, 6.0, -5.0), (4.0, 8.0, 0.0)))
                .with_empty_parameters(PARAMETERS),
        )
        .insert_element(ElementRecord::new(4, "Walls").with_empty_parameters(PARAMETERS))
        .insert_element(
            ElementRecord::new(5, "Doors")
                .with_bounding_box(bbox((2.0, 2.0, 0.0), (3.0, 3.0, 2.0)))
                .with_door_rooms(None, Some(ElementId(201)))
                .with_empty_parameters(PARAMETERS),
        )
        .insert_element(
            ElementRecord::new(6, "Walls")
                .with_bounding_box(bbox((2.0, 2.0, 1.0), (3.0, 3.0, 2.0)))
                .with_contained_room(201)
                .with_parameter(Parameter::new("Level", "Existing"))
                .with_empty_parameters(&["Room Name", "Room Number", "Room Ref"]),
        );
    model
}

fn targets() -> ParameterTargets {
    ParameterTargets {
        level: vec!["Level".to_string()],
        room_name: vec!["Room Name".to_string()],
        room_number: vec!["Room Number".to_string()],
        room_reference: vec!["Room Ref".to_string()],
        groups: vec!["Group".to_string()],
        room_only: vec!["Room Number".to_string()],
    }
}

fn config(modes: &[FillMode]) -> FillConfiguration {
    FillConfiguration::new(["Walls", "Doors"], modes.iter().copied().collect())
        .with_levels("L1", "L2")
        .with_targets(targets())
}

fn no_progress(_: usize, _: &str) {}

#[test]
fn level_band_writes_base_level_and_isolates() {
    let mut model = tower();
    let summary = FillOrchestrator::new(&mut model)
        .execute_fill(&config(&[FillMode::Level]), no_progress)
        .unwrap();

    assert_eq!(model.parameter_value(ElementId(1), "Level"), Some("L1"));
    assert_eq!(model.parameter_value(ElementId(5), "Level"), Some("L1"));
    assert_eq!(model.parameter_value(ElementId(6), "Level"), Some("Existing"));
    assert_eq!(model.parameter_value(ElementId(2), "Level"), Some(""));
    assert_eq!(model.parameter_value(ElementId(3), "Level"), Some(""));

    assert_eq!(summary.elements_updated, 2);
    assert_eq!(summary.skip_count(SkipReason::AboveBand), 1);
    assert_eq!(summary.skip_count(SkipReason::BelowBand), 1);
    assert_eq!(summary.skip_count(SkipReason::NoBoundingBox), 1);
    assert_eq!(summary.skip_count(SkipReason::ExistingValueNoOverwrite), 1);
    assert_eq!(model.isolated(), &[ElementId(1), ElementId(5)]);
    assert_eq!(model.commit_count(), 1);
}

#[test]
fn overwrite_replaces_existing_values() {
    let mut model = tower();
    let config = config(&[FillMode::Level]).with_overwrite(true);
    FillOrchestrator::new(&mut model)
        .execute_fill(&config, no_progress)
        .unwrap();

    assert_eq!(model.parameter_value(ElementId(6), "Level"), Some("L1"));
}

#[test]
fn rooms_follow_detection_tiers() {
    let mut model = tower();
    let summary = FillOrchestrator::new(&mut model)
        .execute_fill(&config(&[FillMode::RoomName, FillMode::RoomNumber]), no_progress)
        .unwrap();

    assert_eq!(model.parameter_value(ElementId(1), "Room Name"), Some("Office"));
    assert_eq!(model.parameter_value(ElementId(1), "Room Number"), Some("101"));
    assert_eq!(model.parameter_value(ElementId(1), "Room Ref"), Some("101: Office"));
    // Door center lies in the office, its to-room reference wins.
    assert_eq!(model.parameter_value(ElementId(5), "Room Name"), Some("Lobby"));
    assert_eq!(model.parameter_value(ElementId(6), "Room Name"), Some("Lobby"));
    assert_eq!(model.parameter_value(ElementId(2), "Room Number"), Some("102"));
    assert_eq!(model.parameter_value(ElementId(3), "Room Name"), Some(""));

    assert_eq!(summary.skip_count(SkipReason::NoRoom), 4);
    assert_eq!(
        summary.skipped_elements.get(&SkipReason::NoRoom),
        Some(&vec![ElementId(3), ElementId(4)])
    );
    assert_eq!(summary.rooms_touched, 2);
    assert_eq!(summary.modes.len(), 2);
    assert_eq!(model.commit_count(), 2);
}

#[test]
fn preview_never_mutates() {
    let mut model = tower();
    let mut orchestrator = FillOrchestrator::new(&mut model);
    let preview = orchestrator.preview_fill(&config(&[
        FillMode::Level,
        FillMode::RoomName,
        FillMode::RoomNumber,
    ]));
    assert_eq!(orchestrator.state(), FillState::Idle);

    assert!(preview.valid);
    assert_eq!(preview.elements_scanned, 6);
    let level = preview.level.unwrap();
    assert_eq!(
        (level.in_band, level.below_band, level.above_band, level.no_bounding_box),
        (3, 1, 1, 1)
    );
    assert_eq!(level.would_update, 2);

    let rooms = preview.rooms.unwrap();
    assert_eq!((rooms.with_room, rooms.without_room, rooms.unique_rooms), (4, 2, 2));
    assert_eq!(
        rooms.by_method,
        BTreeMap::from([
            (DetectionMethod::DirectReference, 1),
            (DetectionMethod::ToRoom, 1),
            (DetectionMethod::BoundingBoxCenter, 2),
        ])
    );

    assert_eq!(model.write_count(), 0);
    assert_eq!(model.commit_count(), 0);
    assert!(!model.in_transaction());
}

#[test]
fn second_run_only_skips() {
    let mut model = tower();
    let config = config(&[FillMode::Level, FillMode::RoomName, FillMode::RoomNumber]);

    let first = FillOrchestrator::new(&mut model)
        .execute_fill(&config, no_progress)
        .unwrap();
    let second = FillOrchestrator::new(&mut model)
        .execute_fill(&config, no_progress)
        .unwrap();

    assert!(first.successful_writes > 0);
    assert_eq!(second.successful_writes, 0);
    assert_eq!(second.elements_updated, 0);
    assert_eq!(
        second.skip_count(SkipReason::ExistingValueNoOverwrite),
        first.skip_count(SkipReason::ExistingValueNoOverwrite) + first.successful_writes
    );
}

#[test]
fn empty_selection_still_commits() {
    let mut model = tower();
    let config = FillConfiguration::new(["Furniture"], [FillMode::RoomName].into_iter().collect())
        .with_targets(targets());

    let summary = FillOrchestrator::new(&mut model)
        .execute_fill(&config, no_progress)
        .unwrap();

    assert_eq!(summary.elements_updated, 0);
    assert_eq!(summary.elements_scanned, 0);
    assert_eq!(summary.warnings, vec!["category 'Furniture' has no elements".to_string()]);
    assert_eq!(model.commit_count(), 1);
}

fn boxes() -> MemoryModel {
    let mut model = MemoryModel::new("Warehouse");
    for id in [10, 11, 20, 21, 30, 31, 40] {
        model.insert_element(ElementRecord::new(id, "Furniture").with_empty_parameters(&["Group"]));
    }
    for (id, members) in [(3, [30, 31]), (1, [10, 11]), (2, [20, 21])] {
        model.insert_group(
            GroupInstance {
                id: ElementId(id),
                type_id: ElementId(500),
                type_name: "Box A".to_string(),
                name: "BOX-A-01".to_string(),
            },
            members.into_iter().map(ElementId).collect(),
        );
    }
    model
}

#[test]
fn group_name_reaches_every_instance() {
    let mut model = boxes();
    let config = FillConfiguration::new(["Furniture"], [FillMode::Groups].into_iter().collect())
        .with_targets(targets());

    let summary = FillOrchestrator::new(&mut model)
        .execute_fill(&config, no_progress)
        .unwrap();

    let fill = &summary.group_fills[0];
    assert_eq!(fill.representatives, vec![ElementId(1)]);
    assert_eq!(fill.instances_found, 3);
    assert_eq!(fill.instances_skipped, 2);
    assert_eq!(fill.write_attempts, 2);
    assert_eq!(fill.members_propagated, 4);
    assert_eq!(summary.elements_updated, 6);
    assert_eq!(summary.successful_writes, 6);
    assert_eq!(
        summary.log.successes.iter().map(|e| e.element_id.0).collect::<Vec<_>>(),
        vec![10, 11, 20, 21, 30, 31]
    );
    for id in [10, 11, 20, 21, 30, 31] {
        assert_eq!(model.parameter_value(ElementId(id), "Group"), Some("BOX-A-01"));
    }
    assert_eq!(model.parameter_value(ElementId(40), "Group"), Some(""));
    assert_eq!(
        summary.skipped_elements.get(&SkipReason::NoGroup),
        Some(&vec![ElementId(40)])
    );
    assert_eq!(summary.group_types_touched, 1);
    assert_eq!((model.commit_count(), model.rollback_count()), (1, 0));
}

#[test]
fn unrelated_conflict_rolls_back_group_fill() {
    let mut model = boxes();
    model.queue_conflict(Conflict {
        kind: ConflictKind::Other("Duplicate Mark".to_string()),
        elements: vec![ElementId(10)],
        message: "Elements have duplicate 'Mark' values".to_string(),
    });
    let config = FillConfiguration::new(["Furniture"], [FillMode::Groups].into_iter().collect())
        .with_targets(targets());

    let err = FillOrchestrator::new(&mut model)
        .execute_fill(&config, no_progress)
        .unwrap_err();

    match err {
        FillError::ModeAborted {
            mode,
            committed,
            source,
        } => {
            assert_eq!(mode, FillMode::Groups);
            assert!(committed.is_empty());
            assert_eq!(
                source,
                HostError::UnresolvedConflict {
                    kind: ConflictKind::Other("Duplicate Mark".to_string()),
                    message: "Elements have duplicate 'Mark' values".to_string(),
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(model.parameter_value(ElementId(10), "Group"), Some(""));
    assert_eq!(model.parameter_value(ElementId(30), "Group"), Some(""));
    assert_eq!(model.rollback_count(), 1);
}

#[test]
fn failed_mode_keeps_earlier_commits() {
    let mut model = MemoryModel::new("Mixed");
    model
        .insert_level(Level::new(100, "L1", 0.0))
        .insert_level(Level::new(101, "L2", 10.0))
        .insert_room(Room::new(200, "101", "Office"), bbox((0.0, 0.0, 0.0), (10.0, 10.0, 3.0)), None);
    for id in [10, 11] {
        model.insert_element(
            ElementRecord::new(id, "Furniture")
                .with_bounding_box(bbox((100.0, 0.0, 1.0), (101.0, 1.0, 2.0)))
                .with_empty_parameters(&["Level", "Room Name"]),
        );
    }
    model.insert_element(
        ElementRecord::new(12, "Furniture")
            .with_bounding_box(bbox((1.0, 1.0, 1.0), (2.0, 2.0, 2.0)))
            .with_contained_room(200)
            .with_empty_parameters(&["Level", "Room Name"]),
    );
    model.insert_group(
        GroupInstance {
            id: ElementId(1),
            type_id: ElementId(500),
            type_name: "Desk Pair".to_string(),
            name: "Desk Pair".to_string(),
        },
        vec![ElementId(10), ElementId(11)],
    );
    let config = FillConfiguration::new(
        ["Furniture"],
        [FillMode::RoomName, FillMode::Level].into_iter().collect(),
    )
    .with_levels("L1", "L2")
    .with_targets(ParameterTargets {
        level: vec!["Level".to_string()],
        room_name: vec!["Room Name".to_string()],
        ..ParameterTargets::default()
    });

    let mut orchestrator = FillOrchestrator::new(&mut model);
    let err = orchestrator.execute_fill(&config, no_progress).unwrap_err();
    assert_eq!(orchestrator.state(), FillState::RolledBack);

    let FillError::ModeAborted {
        mode,
        committed,
        source,
    } = err
    else {
        panic!("expected an aborted mode");
    };
    assert_eq!(mode, FillMode::Level);
    assert_eq!(committed, vec![FillMode::RoomName]);
    assert!(matches!(
        source,
        HostError::UnresolvedConflict {
            kind: ConflictKind::AtomViolationSingleInstance,
            ..
        }
    ));

    assert_eq!(model.parameter_value(ElementId(12), "Room Name"), Some("Office"));
    assert_eq!(model.parameter_value(ElementId(12), "Level"), Some(""));
    assert_eq!(model.parameter_value(ElementId(10), "Level"), Some(""));
    assert_eq!((model.commit_count(), model.rollback_count()), (1, 1));
    assert!(model.isolated().is_empty());
}

#[test]
fn invalid_configuration_aborts_before_writing() {
    let mut model = tower();
    let config = FillConfiguration::new(["Walls"], [FillMode::Level].into_iter().collect())
        .with_targets(targets());

    let mut orchestrator = FillOrchestrator::new(&mut model);
    let err = orchestrator.execute_fill(&config, no_progress).unwrap_err();
    assert!(matches!(
        err,
        FillError::Config(ConfigError::MissingLevel { role: "base" })
    ));
    assert_eq!(orchestrator.state(), FillState::Aborted);

    let preview = orchestrator.preview_fill(&config);
    assert!(!preview.valid);
    assert_eq!(preview.warnings.len(), 1);
    assert!(preview.level.is_none());

    assert_eq!(model.write_count(), 0);
    assert_eq!(model.commit_count(), 0);
}

#[test]
fn inverted_levels_are_rejected() {
    let mut model = tower();
    let config = config(&[FillMode::Level]).with_levels("L2", "L1");

    let err = FillOrchestrator::new(&mut model)
        .execute_fill(&config, no_progress)
        .unwrap_err();
    assert!(matches!(
        err,
        FillError::Config(ConfigError::InvertedLevels { .. })
    ));
}

fn crowded(count: i64) -> MemoryModel {
    let mut model = MemoryModel::new("Crowded");
    model.insert_room(Room::new(200, "101", "Hall"), bbox((0.0, 0.0, 0.0), (1.0, 1.0, 1.0)), None);
    for id in 0..count {
        model.insert_element(
            ElementRecord::new(1000 + id, "Walls")
                .with_contained_room(200)
                .with_empty_parameters(&["Room Name"]),
        );
    }
    model
}

fn room_name_only() -> FillConfiguration {
    FillConfiguration::new(["Walls"], [FillMode::RoomName].into_iter().collect()).with_targets(
        ParameterTargets {
            room_name: vec!["Room Name".to_string()],
            ..ParameterTargets::default()
        },
    )
}

#[test]
fn progress_reported_every_hundred_elements() {
    let mut model = crowded(250);
    let mut calls = Vec::new();

    FillOrchestrator::new(&mut model)
        .execute_fill(&room_name_only(), |processed, message| {
            calls.push((processed, message.to_string()));
        })
        .unwrap();

    assert_eq!(
        calls,
        vec![
            (100, "Room Name: 100 of 250 elements".to_string()),
            (200, "Room Name: 200 of 250 elements".to_string()),
        ]
    );
}

#[test]
fn panic_inside_boundary_rolls_back() {
    let mut model = crowded(150);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        FillOrchestrator::new(&mut model).execute_fill(&room_name_only(), |processed, _| {
            assert!(processed < 100, "progress callback gave up");
        })
    }));

    assert!(result.is_err());
    assert!(!model.in_transaction());
    assert_eq!(model.rollback_count(), 1);
    assert_eq!(model.parameter_value(ElementId(1000), "Room Name"), Some(""));
}

#[test]
fn door_like_categories_use_from_room_first() {
    let mut model = tower();
    model.insert_element(
        ElementRecord::new(7, "Windows")
            .with_door_rooms(Some(ElementId(200)), Some(ElementId(201)))
            .with_empty_parameters(PARAMETERS),
    );
    let config = FillConfiguration::new(["Windows"], [FillMode::RoomNumber].into_iter().collect())
        .with_targets(targets());

    FillOrchestrator::new(&mut model)
        .execute_fill(&config, no_progress)
        .unwrap();
    assert_eq!(model.parameter_value(ElementId(7), "Room Number"), Some("101"));
}

#[test]
fn group_progress_counts_each_element_once() {
    let mut model = MemoryModel::new("Campus");
    let parameters = ["Group", "Group Tag"];
    for (instance, base) in [(1, 1000), (2, 2000)] {
        let members: Vec<ElementId> = (base..base + 60).map(ElementId).collect();
        for member in &members {
            model.insert_element(ElementRecord::new(*member, "Furniture").with_empty_parameters(&parameters));
        }
        model.insert_group(
            GroupInstance {
                id: ElementId(instance),
                type_id: ElementId(600),
                type_name: "Workstation".to_string(),
                name: "WS-01".to_string(),
            },
            members,
        );
    }
    for id in 3000..3040 {
        model.insert_element(ElementRecord::new(id, "Furniture").with_empty_parameters(&parameters));
    }
    let config = FillConfiguration::new(["Furniture"], [FillMode::Groups].into_iter().collect())
        .with_targets(ParameterTargets {
            groups: parameters.iter().map(ToString::to_string).collect(),
            ..ParameterTargets::default()
        });
    let mut calls = Vec::new();

    let summary = FillOrchestrator::new(&mut model)
        .execute_fill(&config, |processed, message| {
            calls.push((processed, message.to_string()));
        })
        .unwrap();

    assert_eq!(calls, vec![(100, "Groups: 100 of 160 elements".to_string())]);
    let groups = summary.mode(FillMode::Groups).unwrap();
    assert_eq!(groups.elements_processed, 160);
    assert_eq!(groups.elements_updated, 120);
    assert_eq!(summary.skip_count(SkipReason::NoGroup), 40);
}

#[test]
fn legacy_room_fill_reports_rejected_writes() {
    let mut model = MemoryModel::new("Clinic");
    model
        .insert_room(Room::new(200, "101", "Hall"), bbox((0.0, 0.0, 0.0), (1.0, 1.0, 1.0)), None)
        .insert_element(
            ElementRecord::new(1, "Walls")
                .with_contained_room(200)
                .with_empty_parameters(&["Room No.", "Room Name", "Remarks"]),
        )
        .insert_element(
            ElementRecord::new(2, "Walls")
                .with_contained_room(200)
                .with_empty_parameters(&["Room No."])
                .rejecting_writes("element is pinned"),
        );
    let config = FillConfiguration::new(["Walls"], [FillMode::RoomOnly].into_iter().collect())
        .with_targets(ParameterTargets {
            room_only: vec![
                "Room No.".to_string(),
                "Room Name".to_string(),
                "Remarks".to_string(),
            ],
            ..ParameterTargets::default()
        });

    let summary = FillOrchestrator::new(&mut model)
        .execute_fill(&config, no_progress)
        .unwrap();

    assert_eq!(model.parameter_value(ElementId(1), "Room No."), Some("101"));
    assert_eq!(model.parameter_value(ElementId(1), "Room Name"), Some("Hall"));
    assert_eq!(model.parameter_value(ElementId(1), "Remarks"), Some(""));
    assert_eq!(model.parameter_value(ElementId(2), "Room No."), Some(""));

    assert_eq!(summary.successful_writes, 2);
    assert_eq!(summary.elements_updated, 1);
    assert_eq!(summary.errors, 1);
    let error = &summary.log.errors[0];
    assert_eq!(error.element_id, ElementId(2));
    assert_eq!(error.message, "Room No.: write failed");
    assert!(error
        .exception
        .as_deref()
        .is_some_and(|e| e.starts_with("WriteException:") && e.contains("element is pinned")));
    assert_eq!(summary.skip_count(SkipReason::UnrecognizedRoomParameter), 2);
    assert_eq!(summary.skip_count(SkipReason::ParameterMissing), 1);
    assert_eq!(summary.mode(FillMode::RoomOnly).unwrap().errors, 1);
    assert_eq!((model.commit_count(), model.rollback_count()), (1, 0));
}
