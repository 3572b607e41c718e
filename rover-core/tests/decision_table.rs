use rover_core::decision::{SENSOR_COUNT, SensorSnapshot, SteeringAction, TurnSide, classify};

fn all_snapshots() -> impl Iterator<Item = SensorSnapshot> {
    (0_u8..32).map(|bits| {
        let mut active = [false; SENSOR_COUNT];
        for (index, slot) in active.iter_mut().enumerate() {
            *slot = bits & (1 << index) != 0;
        }
        SensorSnapshot::new(active)
    })
}

fn mirrored(snapshot: SensorSnapshot) -> SensorSnapshot {
    let mut active = snapshot.active();
    active.reverse();
    SensorSnapshot::new(active)
}

fn mirror_action(action: SteeringAction) -> SteeringAction {
    match action {
        SteeringAction::SlightRight => SteeringAction::SlightLeft,
        SteeringAction::MildRight => SteeringAction::MildLeft,
        SteeringAction::HardRight => SteeringAction::HardLeft,
        SteeringAction::SlightLeft => SteeringAction::SlightRight,
        SteeringAction::MildLeft => SteeringAction::MildRight,
        SteeringAction::HardLeft => SteeringAction::HardRight,
        other => other,
    }
}

#[test]
fn every_snapshot_classifies_deterministically() {
    for snapshot in all_snapshots() {
        assert_eq!(classify(&snapshot), classify(&snapshot), "{snapshot:?}");
    }
}

#[test]
fn empty_and_full_arrays_are_special() {
    for snapshot in all_snapshots() {
        let action = classify(&snapshot);
        match snapshot.active_count() {
            0 => assert_eq!(action, SteeringAction::LineLost),
            SENSOR_COUNT => assert_eq!(action, SteeringAction::OnJunction),
            _ => assert!(
                !matches!(action, SteeringAction::LineLost | SteeringAction::OnJunction),
                "{snapshot:?} -> {action}"
            ),
        }
    }
}

#[test]
fn mirrored_snapshots_turn_the_other_way() {
    for snapshot in all_snapshots() {
        assert_eq!(
            classify(&mirrored(snapshot)),
            mirror_action(classify(&snapshot)),
            "{snapshot:?}"
        );
    }
}

#[test]
fn weighted_side_matches_turn_bias() {
    for snapshot in all_snapshots() {
        let sum: i32 = snapshot
            .active()
            .iter()
            .zip(rover_core::decision::SENSOR_WEIGHTS)
            .filter(|(active, _)| **active)
            .map(|(_, weight)| weight)
            .sum();
        let bias = classify(&snapshot).bias();
        match sum {
            0 => assert_eq!(bias, None, "{snapshot:?}"),
            s if s > 0 && snapshot.active_count() < SENSOR_COUNT => {
                assert_eq!(bias, Some(TurnSide::Right), "{snapshot:?}");
            }
            s if s < 0 => assert_eq!(bias, Some(TurnSide::Left), "{snapshot:?}"),
            _ => {}
        }
    }
}

#[test]
fn single_sensor_table() {
    let expected = [
        SteeringAction::HardRight,
        SteeringAction::MildRight,
        SteeringAction::Forward,
        SteeringAction::MildLeft,
        SteeringAction::HardLeft,
    ];
    for (index, action) in expected.into_iter().enumerate() {
        let mut active = [false; SENSOR_COUNT];
        active[index] = true;
        assert_eq!(classify(&SensorSnapshot::new(active)), action, "sensor {index}");
    }
}

#[test]
fn adjacent_pairs_soften_the_turn() {
    let cases = [
        ([1, 1, 0, 0, 0], SteeringAction::HardRight),
        ([0, 1, 1, 0, 0], SteeringAction::SlightRight),
        ([0, 0, 1, 1, 0], SteeringAction::SlightLeft),
        ([0, 0, 0, 1, 1], SteeringAction::HardLeft),
        ([0, 1, 1, 1, 0], SteeringAction::Forward),
        ([1, 1, 1, 0, 0], SteeringAction::MildRight),
    ];
    for (levels, action) in cases {
        assert_eq!(classify(&SensorSnapshot::from_levels(levels)), action, "{levels:?}");
    }
}
