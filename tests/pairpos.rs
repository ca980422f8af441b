mod common;

use std::collections::BTreeMap;

use pairclass::binary::read::ReadScope;
use pairclass::layout::{Device, ValueFormat, ValueRecord};
use pairclass::pairpos::apply::Effect;
use pairclass::report::{DiagnosticKind, Severity};
use pairclass::{Key, PairClasses, PairValue, Report};

use crate::common::{class_def, encode, round_trip, x_advance};

fn hinted_grid() -> PairClasses {
    let device = vec![(11, -1), (12, 1)].into_iter().collect::<Device>();
    let first = ValueRecord {
        x_advance: -40,
        x_advance_device: Some(device.clone()),
        ..ValueRecord::default()
    };
    let second = ValueRecord {
        y_placement: 30,
        y_placement_device: Some(device),
        ..ValueRecord::default()
    };
    let mut grid = PairClasses::new(
        BTreeMap::new(),
        class_def(&[(10, 1), (11, 2), (12, 1)]),
        class_def(&[(20, 1), (21, 2)]),
    );
    grid.insert(Key::new(1, 1), PairValue::new(Some(first), None));
    grid.insert(Key::new(2, 2), PairValue::new(None, Some(second)));
    grid
}

#[test]
fn test_round_trip_with_devices() {
    let grid = hinted_grid();
    let report = Report::new();
    let decoded = round_trip(&grid, &report).unwrap();
    assert_eq!(decoded, grid);
    assert_eq!(
        decoded.masks(),
        (
            ValueFormat::X_ADVANCE | ValueFormat::X_ADVANCE_DEVICE,
            ValueFormat::Y_PLACEMENT | ValueFormat::Y_PLACEMENT_DEVICE
        )
    );
    assert_eq!(report.count_severity(Severity::Error), 0);
    assert_eq!(report.count(DiagnosticKind::UnusedClass), 0);
}

#[test]
fn test_variation_index_next_to_delta_tables() {
    let mut grid = hinted_grid();
    let varied = ValueRecord {
        x_advance: -5,
        x_advance_device: Some(Device::VariationIndex { outer: 1, inner: 4 }),
        ..ValueRecord::default()
    };
    grid.insert(Key::new(2, 1), PairValue::new(Some(varied), None));

    let report = Report::new();
    let decoded = round_trip(&grid, &report).unwrap();
    assert_eq!(decoded, grid);
    let device = decoded
        .get(Key::new(2, 1))
        .and_then(|value| value.first.as_ref())
        .and_then(|record| record.x_advance_device.clone());
    assert_eq!(device, Some(Device::VariationIndex { outer: 1, inner: 4 }));
    assert_eq!(report.count_severity(Severity::Error), 0);
}

#[test]
fn test_encoding_is_stable() {
    let grid = hinted_grid();
    let data = encode(&grid);
    let report = Report::new();
    let decoded = ReadScope::new(&data)
        .read_dep::<PairClasses>(&report)
        .unwrap();
    assert_eq!(encode(&decoded), data);
}

#[test]
fn test_truncated_data_never_panics() {
    let data = encode(&hinted_grid());
    for len in 0..data.len() {
        let report = Report::new();
        // Either outcome is acceptable, as long as reading returns.
        let _ = ReadScope::new(&data[..len]).read_dep::<PairClasses>(&report);
    }
}

#[test]
fn test_compacted_then_encoded() {
    let mut grid = hinted_grid();
    grid.class_def1.insert(13, 4);
    grid.class_def2.insert(22, 5);
    grid.insert(Key::new(4, 5), PairValue::new(Some(ValueRecord::default()), None));

    let report = Report::new();
    let compacted = grid.compacted(&report);
    assert_eq!(compacted.class_counts(), (3, 3));
    assert!(!compacted.class_def1.contains(13));
    assert!(!compacted.class_def2.contains(22));
    assert_eq!(round_trip(&compacted, &Report::new()).unwrap(), compacted);
}

#[test]
fn test_renumbered_then_encoded() {
    let old_to_new = vec![(10, 100), (11, 101), (12, 102), (20, 200)]
        .into_iter()
        .collect::<BTreeMap<u16, u16>>();
    let renumbered = hinted_grid().glyphs_renumbered(&old_to_new);

    assert_eq!(renumbered.len(), 1);
    assert_eq!(renumbered.class_def1.get(101), None);
    assert_eq!(renumbered.class_def1.get(100), Some(1));
    assert_eq!(renumbered.class_def2.get(200), Some(1));
    assert_eq!(round_trip(&renumbered, &Report::new()).unwrap(), renumbered);
}

#[test]
fn test_kern_pairs_then_applied() {
    let pairs = vec![(Key::new(1, 1), -60), (Key::new(1, 2), 0), (Key::new(2, 1), 25)];
    let grid = PairClasses::from_kern_class_pairs(
        class_def(&[(36, 1), (37, 2)]),
        class_def(&[(68, 1), (69, 2)]),
        pairs,
    );
    assert_eq!(grid.len(), 2);

    let report = Report::new();
    let decoded = round_trip(&grid, &report).unwrap();
    let glyphs = [36, 68, 37, 68];
    let never = |_: usize, _: u16| false;
    let (effects, count) = decoded.run_one(&glyphs, 0, None, never).unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        effects[1],
        Effect {
            x_placement: -60,
            ..Effect::default()
        }
    );
    let (effects, _) = decoded.run_one(&glyphs, 2, Some(&effects), never).unwrap();
    assert_eq!(effects[1].x_placement, -60);
    assert_eq!(effects[3].x_placement, 25);
    assert_eq!(decoded.run_one(&glyphs, 1, None, never), None);
}

#[test]
fn test_coverage_extras_survive_round_trip() {
    let mut grid = PairClasses::new(BTreeMap::new(), class_def(&[(5, 1)]), class_def(&[(9, 1)]));
    grid.insert(Key::new(1, 1), PairValue::new(x_advance(-20), None));
    grid.insert(Key::new(0, 1), PairValue::new(x_advance(-5), None));
    grid.coverage_extras.insert(6);

    let report = Report::new();
    let decoded = round_trip(&grid, &report).unwrap();
    assert_eq!(decoded, grid);
    assert!(!report.has_errors());

    let (effects, count) = decoded.run_one(&[6, 9], 0, None, |_, _| false).unwrap();
    assert_eq!(count, 1);
    assert_eq!(effects[0].x_advance, -5);
}
