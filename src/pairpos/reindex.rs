//! Renumber the classes of a pair grid so they are dense and every class is used.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use crate::layout::ClassDef;
use crate::pairpos::{Key, PairValue};
use crate::report::{DiagnosticKind, Location, Report};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReindexOptions {
    /// Treat class 0 as always defined on both sides and keep it as class 0.
    ///
    /// Set this for grids read from binary data, where class 0 means "every other glyph". Leave
    /// it unset for grids built from source text, where class 0 only exists if a glyph was
    /// explicitly given it, and such a class is moved after the others.
    pub keep_implicit_zero: bool,
}

/// Remove cells and glyphs that refer to missing or unused classes, then renumber the classes of
/// both sides to `1..=n`.
///
/// A cell is dropped if either of its classes is not defined. A glyph is dropped if no remaining
/// cell uses its class. Each drop is reported as a warning.
pub fn reindexed(
    cells: BTreeMap<Key, PairValue>,
    mut class_def1: ClassDef,
    mut class_def2: ClassDef,
    options: ReindexOptions,
    report: &Report,
) -> (BTreeMap<Key, PairValue>, ClassDef, ClassDef) {
    let defined = |class_def: &ClassDef| {
        let mut classes = class_def.values();
        if options.keep_implicit_zero {
            classes.insert(0);
        }
        classes
    };
    let defined1 = defined(&class_def1);
    let defined2 = defined(&class_def2);

    let cells = cells
        .into_iter()
        .filter(|(key, _)| {
            let keep = defined1.contains(&key.first) && defined2.contains(&key.second);
            if !keep {
                report.warning(
                    DiagnosticKind::DroppedKey,
                    Some(Location::Cell(key.first, key.second)),
                    format!(
                        "removing class pair {}: first or second class not listed in the class definitions",
                        key
                    ),
                );
            }
            keep
        })
        .collect::<BTreeMap<_, _>>();

    let used1 = cells.keys().map(|key| key.first).collect::<BTreeSet<_>>();
    let used2 = cells.keys().map(|key| key.second).collect::<BTreeSet<_>>();
    prune_unused(&mut class_def1, &used1, "first", report);
    prune_unused(&mut class_def2, &used2, "second", report);

    let remap1 = remapping(&class_def1, options.keep_implicit_zero);
    let remap2 = remapping(&class_def2, options.keep_implicit_zero);

    let mut reindexed_cells = BTreeMap::new();
    for (key, value) in cells {
        let first = remap1.get(&key.first).copied();
        let second = remap2.get(&key.second).copied();
        match (first, second) {
            (Some(first), Some(second))
                if options.keep_implicit_zero || (first != 0 && second != 0) =>
            {
                reindexed_cells.insert(Key::new(first, second), value);
            }
            _ => report.warning(
                DiagnosticKind::DroppedKey,
                Some(Location::Cell(key.first, key.second)),
                format!(
                    "removing class pair {}: first or second class empty or missing",
                    key
                ),
            ),
        }
    }

    let renumber = |class_def: &ClassDef, remap: &FxHashMap<u16, u16>| {
        class_def
            .iter()
            .filter_map(|(glyph, class)| remap.get(&class).map(|&new| (glyph, new)))
            .collect::<ClassDef>()
    };
    let class_def1 = renumber(&class_def1, &remap1);
    let class_def2 = renumber(&class_def2, &remap2);
    (reindexed_cells, class_def1, class_def2)
}

fn prune_unused(class_def: &mut ClassDef, used: &BTreeSet<u16>, side: &str, report: &Report) {
    class_def.retain(|glyph, class| {
        let keep = used.contains(&class);
        if !keep {
            report.warning(
                DiagnosticKind::PrunedGlyph,
                Some(Location::Glyph(glyph)),
                format!(
                    "removing glyph {} from {} classes because its class ({}) is not used by any class pair",
                    glyph, side, class
                ),
            );
        }
        keep
    });
}

/// Old class to new class for every class in `class_def`.
///
/// Non-zero classes are numbered from 1 in ascending order. An explicit class 0 follows them,
/// unless `keep_implicit_zero` is set, in which case 0 maps to itself whether or not it is listed.
pub fn remapping(class_def: &ClassDef, keep_implicit_zero: bool) -> FxHashMap<u16, u16> {
    let classes = class_def.values();
    let mut remap = classes
        .iter()
        .filter(|&&class| class != 0)
        .zip(1u16..)
        .map(|(&old, new)| (old, new))
        .collect::<FxHashMap<_, _>>();
    if keep_implicit_zero {
        remap.insert(0, 0);
    } else if classes.contains(&0) {
        let next = remap.values().copied().max().unwrap_or(0) + 1;
        remap.insert(0, next);
    }
    remap
}
