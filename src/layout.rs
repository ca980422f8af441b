//! Coverage and class definition tables shared by the positioning subtables.

pub mod device;
pub mod value;

use std::collections::{BTreeMap, BTreeSet};

use crate::binary::read::{ReadBinary, ReadCtxt, ReadFrom};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::U16Be;
use crate::error::{ParseError, WriteError};

pub use device::Device;
pub use value::{ValueFormat, ValueRecord};

/// An ordered set of glyph ids.
pub type GlyphSet = BTreeSet<u16>;

/// The glyphs a subtable applies to, in ascending glyph order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Coverage {
    glyphs: Vec<u16>,
}

struct CoverageRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    start_coverage_index: u16,
}

impl ReadFrom for CoverageRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, start_coverage_index): (u16, u16, u16)) -> Self {
        CoverageRangeRecord {
            start_glyph,
            end_glyph,
            start_coverage_index,
        }
    }
}

impl ReadBinary for Coverage {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let glyph_count = ctxt.read_u16be()?;
                let glyph_array = ctxt.read_array::<U16Be>(usize::from(glyph_count))?;
                Ok(Coverage::from_glyphs(glyph_array.iter()))
            }
            2 => {
                let coverage_range_count = ctxt.read_u16be()?;
                let coverage_range_array =
                    ctxt.read_array::<CoverageRangeRecord>(usize::from(coverage_range_count))?;
                let mut glyphs = Vec::new();
                let mut prev_end = None;
                for coverage_range_record in &coverage_range_array {
                    check_range(
                        ctxt,
                        &mut prev_end,
                        coverage_range_record.start_glyph,
                        coverage_range_record.end_glyph,
                    )?;
                    glyphs.extend(
                        coverage_range_record.start_glyph..=coverage_range_record.end_glyph,
                    );
                }
                Ok(Coverage::from_glyphs(glyphs))
            }
            format => Err(ParseError::UnsupportedFormat(format)),
        }
    }
}

/// Ranges must be in ascending glyph order and must not overlap, which also bounds the glyphs
/// a table can expand to.
fn check_range(
    ctxt: &ReadCtxt<'_>,
    prev_end: &mut Option<u16>,
    start: u16,
    end: u16,
) -> Result<(), ParseError> {
    ctxt.check(prev_end.map_or(true, |prev| start > prev) && start <= end)?;
    *prev_end = Some(end);
    Ok(())
}

impl WriteBinary<&Self> for Coverage {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, coverage: &Coverage) -> Result<(), WriteError> {
        let ranges = coverage.ranges();
        if coverage.prefer_format_1(ranges.len()) {
            U16Be::write(ctxt, 1u16)?;
            U16Be::write(ctxt, u16::try_from(coverage.glyphs.len())?)?;
            ctxt.write_iter::<U16Be, _>(coverage.glyphs.iter().copied())
        } else {
            U16Be::write(ctxt, 2u16)?;
            U16Be::write(ctxt, u16::try_from(ranges.len())?)?;
            for range in ranges {
                U16Be::write(ctxt, range.start_glyph)?;
                U16Be::write(ctxt, range.end_glyph)?;
                U16Be::write(ctxt, range.start_coverage_index)?;
            }
            Ok(())
        }
    }
}

impl Coverage {
    /// Build a coverage from glyphs in any order; duplicates are removed.
    pub fn from_glyphs(glyphs: impl IntoIterator<Item = u16>) -> Self {
        let mut glyphs = glyphs.into_iter().collect::<Vec<_>>();
        glyphs.sort_unstable();
        glyphs.dedup();
        Coverage { glyphs }
    }

    pub fn glyph_coverage_value(&self, glyph: u16) -> Option<u16> {
        // The glyph indices must be in numerical order for binary searching of the list.
        // https://docs.microsoft.com/en-us/typography/opentype/spec/chapter2#coverage-format-1
        self.glyphs
            .binary_search(&glyph)
            .ok()
            .and_then(|index| u16::try_from(index).ok())
    }

    pub fn contains(&self, glyph: u16) -> bool {
        self.glyphs.binary_search(&glyph).is_ok()
    }

    pub fn glyphs(&self) -> &[u16] {
        &self.glyphs
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.glyphs.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    fn ranges(&self) -> Vec<CoverageRangeRecord> {
        let mut ranges: Vec<CoverageRangeRecord> = Vec::new();
        for (index, &glyph) in self.glyphs.iter().enumerate() {
            match ranges.last_mut() {
                Some(range) if u32::from(range.end_glyph) + 1 == u32::from(glyph) => {
                    range.end_glyph = glyph
                }
                _ => ranges.push(CoverageRangeRecord {
                    start_glyph: glyph,
                    end_glyph: glyph,
                    start_coverage_index: index as u16,
                }),
            }
        }
        ranges
    }

    fn prefer_format_1(&self, range_count: usize) -> bool {
        let len_format1 = 4 + 2 * self.glyphs.len();
        let len_format2 = 4 + 6 * range_count;
        len_format1 <= len_format2
    }
}

/// Maps glyph ids to class values.
///
/// Glyphs that are not present have class 0. Class 0 entries read from binary data are not
/// stored, but an explicit class 0 may be inserted, for example by text import.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClassDef {
    classes: BTreeMap<u16, u16>,
}

struct ClassRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    class_value: u16,
}

impl ReadFrom for ClassRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, class_value): (u16, u16, u16)) -> Self {
        ClassRangeRecord {
            start_glyph,
            end_glyph,
            class_value,
        }
    }
}

impl ReadBinary for ClassDef {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let mut classes = BTreeMap::new();
        match ctxt.read_u16be()? {
            1 => {
                let start_glyph = ctxt.read_u16be()?;
                let glyph_count = ctxt.read_u16be()?;
                ctxt.check(u32::from(start_glyph) + u32::from(glyph_count) <= 0x10000)?;
                let class_value_array = ctxt.read_array::<U16Be>(usize::from(glyph_count))?;
                for (index, class_value) in class_value_array.iter().enumerate() {
                    if class_value != 0 {
                        classes.insert(start_glyph + index as u16, class_value);
                    }
                }
            }
            2 => {
                let class_range_count = usize::from(ctxt.read_u16be()?);
                let class_range_array = ctxt
                    .read_array::<ClassRangeRecord>(class_range_count)
                    // Some fonts declare more ranges than the table holds. Cap the length based
                    // on the bytes available.
                    .or_else(|_| ctxt.read_array_upto_hack::<ClassRangeRecord>(class_range_count))?;
                let mut prev_end = None;
                for class_range in &class_range_array {
                    check_range(
                        ctxt,
                        &mut prev_end,
                        class_range.start_glyph,
                        class_range.end_glyph,
                    )?;
                    if class_range.class_value != 0 {
                        for glyph in class_range.start_glyph..=class_range.end_glyph {
                            classes.insert(glyph, class_range.class_value);
                        }
                    }
                }
            }
            format => return Err(ParseError::UnsupportedFormat(format)),
        }
        Ok(ClassDef { classes })
    }
}

impl WriteBinary<&Self> for ClassDef {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, class_def: &ClassDef) -> Result<(), WriteError> {
        let written = class_def
            .classes
            .iter()
            .filter(|(_, &class)| class != 0)
            .map(|(&glyph, &class)| (glyph, class))
            .collect::<BTreeMap<_, _>>();
        let ranges = class_ranges(&written);
        let first = written.keys().next().copied();
        let last = written.keys().next_back().copied();

        match (first, last) {
            (Some(first), Some(last))
                if 6 + 2 * (usize::from(last - first) + 1) < 4 + 6 * ranges.len() =>
            {
                U16Be::write(ctxt, 1u16)?;
                U16Be::write(ctxt, first)?;
                U16Be::write(ctxt, u16::try_from(usize::from(last - first) + 1)?)?;
                let values = (first..=last).map(|glyph| *written.get(&glyph).unwrap_or(&0));
                ctxt.write_iter::<U16Be, _>(values)
            }
            _ => {
                U16Be::write(ctxt, 2u16)?;
                U16Be::write(ctxt, u16::try_from(ranges.len())?)?;
                for range in ranges {
                    U16Be::write(ctxt, range.start_glyph)?;
                    U16Be::write(ctxt, range.end_glyph)?;
                    U16Be::write(ctxt, range.class_value)?;
                }
                Ok(())
            }
        }
    }
}

fn class_ranges(classes: &BTreeMap<u16, u16>) -> Vec<ClassRangeRecord> {
    let mut ranges: Vec<ClassRangeRecord> = Vec::new();
    for (&glyph, &class_value) in classes {
        match ranges.last_mut() {
            Some(range)
                if u32::from(range.end_glyph) + 1 == u32::from(glyph)
                    && range.class_value == class_value =>
            {
                range.end_glyph = glyph
            }
            _ => ranges.push(ClassRangeRecord {
                start_glyph: glyph,
                end_glyph: glyph,
                class_value,
            }),
        }
    }
    ranges
}

impl ClassDef {
    pub fn new() -> Self {
        ClassDef::default()
    }

    pub fn get(&self, glyph: u16) -> Option<u16> {
        self.classes.get(&glyph).copied()
    }

    /// The class of `glyph`, or `default` when the glyph is not listed.
    pub fn get_or(&self, glyph: u16, default: u16) -> u16 {
        self.get(glyph).unwrap_or(default)
    }

    pub fn glyph_class_value(&self, glyph: u16) -> u16 {
        self.get_or(glyph, 0)
    }

    pub fn insert(&mut self, glyph: u16, class: u16) -> Option<u16> {
        self.classes.insert(glyph, class)
    }

    pub fn remove(&mut self, glyph: u16) -> Option<u16> {
        self.classes.remove(&glyph)
    }

    pub fn contains(&self, glyph: u16) -> bool {
        self.classes.contains_key(&glyph)
    }

    /// The distinct class values in use.
    pub fn values(&self) -> BTreeSet<u16> {
        self.classes.values().copied().collect()
    }

    /// The largest class value, or 0 for an empty class definition.
    pub fn max_class(&self) -> u16 {
        self.classes.values().copied().max().unwrap_or(0)
    }

    pub fn glyphs(&self) -> impl Iterator<Item = u16> + '_ {
        self.classes.keys().copied()
    }

    /// (glyph, class) pairs in glyph order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.classes.iter().map(|(&glyph, &class)| (glyph, class))
    }

    /// Class value to the glyphs in that class.
    pub fn invert(&self) -> BTreeMap<u16, GlyphSet> {
        let mut inverted = BTreeMap::<u16, GlyphSet>::new();
        for (glyph, class) in self.iter() {
            inverted.entry(class).or_default().insert(glyph);
        }
        inverted
    }

    pub fn retain(&mut self, mut f: impl FnMut(u16, u16) -> bool) {
        self.classes.retain(|&glyph, &mut class| f(glyph, class))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// A copy with every glyph replaced by its new id. Glyphs with no entry in `old_to_new` are
    /// dropped.
    pub fn glyphs_renumbered(&self, old_to_new: &BTreeMap<u16, u16>) -> ClassDef {
        self.iter()
            .filter_map(|(glyph, class)| old_to_new.get(&glyph).map(|&new| (new, class)))
            .collect()
    }
}

impl FromIterator<(u16, u16)> for ClassDef {
    fn from_iter<I: IntoIterator<Item = (u16, u16)>>(iter: I) -> Self {
        ClassDef {
            classes: iter.into_iter().collect(),
        }
    }
}
