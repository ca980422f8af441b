//! Class-based pair positioning: GPOS lookup type 2, subtable format 2.
//!
//! Glyphs are bucketed into classes by two class definitions, one for the first glyph of a pair
//! and one for the second. Adjustments are then stored per class pair rather than per glyph pair.
//! [`PairClasses`] holds the grid of adjustments together with both class definitions, and is
//! read from and written to the binary subtable by the [`codec`] module.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/gpos#pair-adjustment-positioning-format-2-class-pair-adjustment>

pub mod apply;
pub mod codec;
pub mod reconcile;
pub mod reindex;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::error::KeyError;
use crate::layout::{ClassDef, Coverage, GlyphSet, ValueFormat, ValueRecord};
use crate::report::{DiagnosticKind, Location, Report};

use self::reindex::{reindexed, ReindexOptions};

/// One cell of the grid: a (first class, second class) pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub first: u16,
    pub second: u16,
}

impl Key {
    pub fn new(first: u16, second: u16) -> Self {
        Key { first, second }
    }
}

impl From<(u16, u16)> for Key {
    fn from((first, second): (u16, u16)) -> Self {
        Key::new(first, second)
    }
}

impl TryFrom<(i64, i64)> for Key {
    type Error = KeyError;

    fn try_from((first, second): (i64, i64)) -> Result<Self, KeyError> {
        match (u16::try_from(first), u16::try_from(second)) {
            (Ok(f), Ok(s)) => Ok(Key::new(f, s)),
            _ => Err(KeyError::InvalidKey { first, second }),
        }
    }
}

impl TryFrom<(i32, i32)> for Key {
    type Error = KeyError;

    fn try_from((first, second): (i32, i32)) -> Result<Self, KeyError> {
        Key::try_from((i64::from(first), i64::from(second)))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// Adjustments for the first and second glyph of a matched pair.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairValue {
    pub first: Option<ValueRecord>,
    pub second: Option<ValueRecord>,
}

impl PairValue {
    pub fn new(first: Option<ValueRecord>, second: Option<ValueRecord>) -> Self {
        PairValue { first, second }
    }

    /// The value formats needed to hold the first and second records.
    pub fn masks(&self) -> (ValueFormat, ValueFormat) {
        let mask = |record: &Option<ValueRecord>| {
            record
                .as_ref()
                .map_or(ValueFormat::empty(), ValueRecord::format)
        };
        (mask(&self.first), mask(&self.second))
    }

    pub fn is_effectless(&self) -> bool {
        let (first, second) = self.masks();
        first.is_empty() && second.is_empty()
    }

    pub fn has_effect(&self) -> bool {
        !self.is_effectless()
    }
}

/// A class pair adjustment grid with its class definitions.
///
/// `cells` holds only the populated cells; any other class pair in
/// `0..class1_count × 0..class2_count` has no effect. Glyphs in `coverage_extras` are covered by
/// the subtable without being listed in `class_def1`, which places them in first class 0.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PairClasses {
    pub cells: BTreeMap<Key, PairValue>,
    pub class_def1: ClassDef,
    pub class_def2: ClassDef,
    pub coverage_extras: GlyphSet,
}

impl PairClasses {
    pub fn new(
        cells: BTreeMap<Key, PairValue>,
        class_def1: ClassDef,
        class_def2: ClassDef,
    ) -> Self {
        PairClasses {
            cells,
            class_def1,
            class_def2,
            coverage_extras: GlyphSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, key: Key) -> Option<&PairValue> {
        self.cells.get(&key)
    }

    pub fn insert(&mut self, key: Key, value: PairValue) -> Option<PairValue> {
        self.cells.insert(key, value)
    }

    /// Remove every cell. Class definitions and extras are kept.
    pub fn clear(&mut self) {
        self.cells.clear()
    }

    /// The subtable-wide value formats: the union of every cell's formats.
    pub fn masks(&self) -> (ValueFormat, ValueFormat) {
        self.cells
            .values()
            .map(PairValue::masks)
            .fold((ValueFormat::empty(), ValueFormat::empty()), |acc, m| {
                (acc.0 | m.0, acc.1 | m.1)
            })
    }

    /// The number of first and second classes, including class 0.
    pub fn class_counts(&self) -> (u16, u16) {
        (
            self.class_def1.max_class().saturating_add(1),
            self.class_def2.max_class().saturating_add(1),
        )
    }

    /// The glyphs the subtable applies to: everything with a first class plus the extras.
    pub fn coverage(&self) -> Coverage {
        Coverage::from_glyphs(
            self.class_def1
                .glyphs()
                .chain(self.coverage_extras.iter().copied()),
        )
    }

    /// Report problems with the grid. Returns `false` if any were errors.
    pub fn validate(&self, report: &Report) -> bool {
        let mut ok = true;
        let classes1 = self.class_def1.values();
        let classes2 = self.class_def2.values();
        for (key, value) in &self.cells {
            let location = Some(Location::Cell(key.first, key.second));
            if value.is_effectless() {
                report.warning(
                    DiagnosticKind::EffectlessValue,
                    location,
                    format!("the value for class pair {} has no effect", key),
                );
            }
            if (key.first != 0 && !classes1.contains(&key.first))
                || (key.second != 0 && !classes2.contains(&key.second))
            {
                report.error(
                    DiagnosticKind::UndefinedClass,
                    location,
                    format!("class pair {} refers to a class with no glyphs", key),
                );
                ok = false;
            }
        }

        let overlap = self
            .coverage_extras
            .iter()
            .filter(|&&glyph| self.class_def1.contains(glyph))
            .collect::<Vec<_>>();
        if !overlap.is_empty() {
            report.error(
                DiagnosticKind::ExtrasOverlap,
                None,
                format!(
                    "glyphs {:?} are coverage extras and also have a first class",
                    overlap
                ),
            );
            ok = false;
        }
        ok
    }

    /// A copy without cells that have no effect or refer to undefined classes, with classes
    /// renumbered to close any gaps.
    pub fn compacted(&self, report: &Report) -> PairClasses {
        let classes1 = self.class_def1.values();
        let classes2 = self.class_def2.values();
        let cells = self
            .cells
            .iter()
            .filter(|(key, value)| {
                (key.first == 0 || classes1.contains(&key.first))
                    && (key.second == 0 || classes2.contains(&key.second))
                    && value.has_effect()
            })
            .map(|(&key, value)| (key, value.clone()))
            .collect();
        let options = ReindexOptions {
            keep_implicit_zero: true,
        };
        let (cells, class_def1, class_def2) = reindexed(
            cells,
            self.class_def1.clone(),
            self.class_def2.clone(),
            options,
            report,
        );
        PairClasses {
            cells,
            class_def1,
            class_def2,
            coverage_extras: self.coverage_extras.clone(),
        }
    }

    /// A copy with glyph ids replaced according to `old_to_new`.
    ///
    /// Glyphs without a new id are dropped. If either class definition ends up empty the result
    /// is an empty grid. The result is compacted.
    pub fn glyphs_renumbered(&self, old_to_new: &BTreeMap<u16, u16>) -> PairClasses {
        let class_def1 = self.class_def1.glyphs_renumbered(old_to_new);
        let class_def2 = self.class_def2.glyphs_renumbered(old_to_new);
        if class_def1.is_empty() || class_def2.is_empty() {
            return PairClasses::default();
        }

        let valid1 = class_def1.values();
        let valid2 = class_def2.values();
        let cells = self
            .cells
            .iter()
            .filter(|(key, _)| {
                (key.first == 0 || valid1.contains(&key.first))
                    && (key.second == 0 || valid2.contains(&key.second))
            })
            .map(|(&key, value)| (key, value.clone()))
            .collect();
        // Pruning classes lost to renumbering is expected here, not worth surfacing.
        let scratch = Report::new();
        let options = ReindexOptions {
            keep_implicit_zero: true,
        };
        let (cells, class_def1, class_def2) =
            reindexed(cells, class_def1, class_def2, options, &scratch);
        let coverage_extras = self
            .coverage_extras
            .iter()
            .filter_map(|glyph| old_to_new.get(glyph).copied())
            .collect();
        PairClasses {
            cells,
            class_def1,
            class_def2,
            coverage_extras,
        }
    }

    /// Build a grid from a kern table's class pairs: `pairs` maps (left class, right class) to a
    /// distance. Each distance becomes an x placement on the second glyph; zero distances are
    /// skipped.
    pub fn from_kern_class_pairs(
        left: ClassDef,
        right: ClassDef,
        pairs: impl IntoIterator<Item = (Key, i16)>,
    ) -> PairClasses {
        let mut pool = FxHashMap::<i16, PairValue>::default();
        let cells = pairs
            .into_iter()
            .filter(|&(_, distance)| distance != 0)
            .map(|(key, distance)| {
                let value = pool
                    .entry(distance)
                    .or_insert_with(|| PairValue {
                        first: None,
                        second: Some(ValueRecord {
                            x_placement: distance,
                            ..ValueRecord::default()
                        }),
                    })
                    .clone();
                (key, value)
            })
            .collect();
        PairClasses::new(cells, left, right)
    }

    /// For each glyph these adjustments can move across the line, the largest and smallest
    /// cross-stream placement: y placement for horizontal text, x placement for vertical text.
    ///
    /// A class 0 side applies to every glyph below `glyph_count` that is not in the class
    /// definition for that side.
    pub fn effect_extrema(
        &self,
        for_horizontal: bool,
        glyph_count: u16,
    ) -> BTreeMap<u16, (i32, i32)> {
        let placement = |record: &ValueRecord| {
            if for_horizontal {
                i32::from(record.y_placement)
            } else {
                i32::from(record.x_placement)
            }
        };
        let inverted1 = self.class_def1.invert();
        let inverted2 = self.class_def2.invert();
        let others = |class_def: &ClassDef| -> GlyphSet {
            (0..glyph_count)
                .filter(|&glyph| !class_def.contains(glyph))
                .collect()
        };
        let mut others1 = None;
        let mut others2 = None;
        let empty = GlyphSet::new();

        let mut extrema = BTreeMap::new();
        for (key, value) in &self.cells {
            let sides = [
                (value.first.as_ref(), key.first, &inverted1, &mut others1, &self.class_def1),
                (value.second.as_ref(), key.second, &inverted2, &mut others2, &self.class_def2),
            ];
            for (record, class, inverted, others_cache, class_def) in sides {
                let delta = match record.map(|record| placement(record)) {
                    Some(delta) if delta != 0 => delta,
                    _ => continue,
                };
                let glyphs: &GlyphSet = if class == 0 {
                    &*others_cache.get_or_insert_with(|| others(class_def))
                } else {
                    inverted.get(&class).unwrap_or(&empty)
                };
                let pair = (delta.max(0), delta.min(0));
                for &glyph in glyphs {
                    extrema
                        .entry(glyph)
                        .and_modify(|(max, min): &mut (i32, i32)| {
                            *max = (*max).max(pair.0);
                            *min = (*min).min(pair.1);
                        })
                        .or_insert(pair);
                }
            }
        }
        extrema
    }

    /// First classes in use by the cells, in order.
    pub fn first_classes(&self) -> BTreeSet<u16> {
        self.cells.keys().map(|key| key.first).collect()
    }

    /// Second classes in use by the cells, in order.
    pub fn second_classes(&self) -> BTreeSet<u16> {
        self.cells.keys().map(|key| key.second).collect()
    }
}

impl fmt::Display for PairClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.cells {
            writeln!(f, "(First class {}, Second class {}):", key.first, key.second)?;
            if let Some(first) = &value.first {
                writeln!(f, "  First adjustment: {}", first)?;
            }
            if let Some(second) = &value.second {
                writeln!(f, "  Second adjustment: {}", second)?;
            }
        }
        let class_defs = [
            ("first", &self.class_def1),
            ("second", &self.class_def2),
        ];
        for (label, class_def) in class_defs {
            writeln!(f, "Class definition table for {} glyph:", label)?;
            for (class, glyphs) in &class_def.invert() {
                writeln!(f, "  {}: {}", class, glyphs.iter().join(", "))?;
            }
        }
        if !self.coverage_extras.is_empty() {
            writeln!(
                f,
                "Coverage extras: {}",
                self.coverage_extras.iter().join(", ")
            )?;
        }
        Ok(())
    }
}
