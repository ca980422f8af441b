//! Reading and writing the class pair adjustment subtable (`PairPosFormat2`).
//!
//! ```text
//! u16 posFormat = 2
//! Offset16 coverageOffset
//! u16 valueFormat1
//! u16 valueFormat2
//! Offset16 classDef1Offset
//! Offset16 classDef2Offset
//! u16 class1Count
//! u16 class2Count
//! Class1Record class1Records[class1Count]   (each: Class2Record[class2Count])
//! ```
//!
//! All offsets, including those to device tables inside value records, are from the start of the
//! subtable. When writing, the referenced tables follow the grid in the order coverage, first
//! class definition, second class definition, then device tables.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::binary::read::{ReadBinaryDep, ReadCache, ReadCtxt};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::U16Be;
use crate::error::{ClassSide, ParseError, WriteError};
use crate::layout::value::DevicePool;
use crate::layout::{ClassDef, Coverage, ValueFormat, ValueRecord};
use crate::pairpos::reconcile::reconcile;
use crate::pairpos::{Key, PairClasses, PairValue};
use crate::report::{DiagnosticKind, Location, Report};

const PAIR_POS_FORMAT_2: u16 = 2;
const HEADER_SIZE: usize = 8 * 2;

impl ReadBinaryDep for PairClasses {
    type Args<'a> = &'a Report;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, report: &'a Report) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        if ctxt.remaining() < HEADER_SIZE {
            return Err(ParseError::TruncatedHeader);
        }
        let format = ctxt.read_u16be()?;
        if format != PAIR_POS_FORMAT_2 {
            return Err(ParseError::UnsupportedFormat(format));
        }
        let coverage_offset = ctxt.read_u16be()?;
        if coverage_offset == 0 {
            return Err(ParseError::MissingCoverage);
        }
        let coverage = scope
            .offset(usize::from(coverage_offset))
            .read::<Coverage>()?;

        let value_format1 = ctxt.read::<ValueFormat>()?;
        let value_format2 = ctxt.read::<ValueFormat>()?;
        if value_format1.is_empty() && value_format2.is_empty() {
            report.warning(
                DiagnosticKind::EmptyValueFormats,
                Some(Location::Offset(scope.base())),
                "both value formats are zero, the subtable has no effect",
            );
            return Ok(PairClasses::default());
        }

        let class_def1_offset = ctxt.read_u16be()?;
        let class_def2_offset = ctxt.read_u16be()?;
        let class1_count = ctxt.read_u16be()?;
        let class2_count = ctxt.read_u16be()?;
        debug!(
            "pair classes at {}: value formats {:?}/{:?}, {}x{} classes",
            scope.base(),
            value_format1,
            value_format2,
            class1_count,
            class2_count
        );

        let class_def1 = scope
            .offset(usize::from(class_def1_offset))
            .read::<ClassDef>()?;
        check_class_count(&class_def1, class1_count, ClassSide::First, report)?;
        let class_def2 = scope
            .offset(usize::from(class_def2_offset))
            .read::<ClassDef>()?;
        check_class_count(&class_def2, class2_count, ClassSide::Second, report)?;

        let devices = RefCell::new(ReadCache::new());
        // A copy of the context, narrowed to the lifetime of the device cache.
        let mut rows: ReadCtxt<'_> = ctxt.clone();
        let mut cells = BTreeMap::new();
        let mut used1 = BTreeSet::new();
        let mut used2 = BTreeSet::new();
        for class1 in 0..class1_count {
            for class2 in 0..class2_count {
                let first = rows.read_dep::<ValueRecord>((value_format1, scope, &devices))?;
                let second = rows.read_dep::<ValueRecord>((value_format2, scope, &devices))?;
                let value = PairValue::new(
                    Some(first).filter(ValueRecord::has_effect),
                    Some(second).filter(ValueRecord::has_effect),
                );
                if value.has_effect() {
                    used1.insert(class1);
                    used2.insert(class2);
                    cells.insert(Key::new(class1, class2), value);
                } else if class1 != 0 && class2 != 0 {
                    report.info(
                        DiagnosticKind::EffectlessValue,
                        Some(Location::Cell(class1, class2)),
                        format!("class pair ({}, {}) has no effect", class1, class2),
                    );
                }
            }
        }
        report_unused(class1_count, &used1, ClassSide::First, report);
        report_unused(class2_count, &used2, ClassSide::Second, report);
        debug!("read {} class pairs with an effect", cells.len());

        let mut grid = PairClasses::new(cells, class_def1, class_def2);
        let reconciliation = reconcile(&coverage, &grid, report);
        if !reconciliation.ok_to_proceed {
            debug!("discarding pair classes at {}", scope.base());
            return Ok(PairClasses::default());
        }
        grid.coverage_extras = reconciliation.extras;
        Ok(grid)
    }
}

fn check_class_count(
    class_def: &ClassDef,
    count: u16,
    which: ClassSide,
    report: &Report,
) -> Result<(), ParseError> {
    let mut classes = class_def.values();
    classes.insert(0);
    if usize::from(count) == classes.len() {
        Ok(())
    } else if u32::from(count) == u32::from(class_def.max_class()) + 1 {
        report.warning(
            DiagnosticKind::SparseClassCount,
            None,
            format!(
                "{} class count is {} but only {} classes have glyphs",
                which,
                count,
                classes.len()
            ),
        );
        Ok(())
    } else {
        Err(ParseError::ClassCountMismatch { which, count })
    }
}

fn report_unused(count: u16, used: &BTreeSet<u16>, which: ClassSide, report: &Report) {
    for class in (1..count).filter(|class| !used.contains(class)) {
        report.warning(
            DiagnosticKind::UnusedClass,
            None,
            format!("{} class {} is not used by any class pair", which, class),
        );
    }
}

impl WriteBinary<&Self> for PairClasses {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, grid: &PairClasses) -> Result<(), WriteError> {
        let base = ctxt.bytes_written();
        let (value_format1, value_format2) = grid.masks();
        let (class1_count, class2_count) = grid.class_counts();
        if grid
            .cells
            .keys()
            .any(|key| key.first >= class1_count || key.second >= class2_count)
        {
            return Err(WriteError::BadValue);
        }

        U16Be::write(ctxt, PAIR_POS_FORMAT_2)?;
        let coverage_offset = ctxt.placeholder::<U16Be, u16>()?;
        U16Be::write(ctxt, value_format1.bits())?;
        U16Be::write(ctxt, value_format2.bits())?;
        let class_def1_offset = ctxt.placeholder::<U16Be, u16>()?;
        let class_def2_offset = ctxt.placeholder::<U16Be, u16>()?;
        U16Be::write(ctxt, class1_count)?;
        U16Be::write(ctxt, class2_count)?;

        let mut pool = DevicePool::new();
        for class1 in 0..class1_count {
            for class2 in 0..class2_count {
                let value = grid.get(Key::new(class1, class2));
                let first = value.and_then(|value| value.first.as_ref());
                let second = value.and_then(|value| value.second.as_ref());
                ValueRecord::write_pooled(ctxt, first, value_format1, &mut pool)?;
                ValueRecord::write_pooled(ctxt, second, value_format2, &mut pool)?;
            }
        }

        let offset = u16::try_from(ctxt.bytes_written() - base)?;
        ctxt.write_placeholder(coverage_offset, offset)?;
        Coverage::write(ctxt, &grid.coverage())?;

        let offset = u16::try_from(ctxt.bytes_written() - base)?;
        ctxt.write_placeholder(class_def1_offset, offset)?;
        ClassDef::write(ctxt, &grid.class_def1)?;

        let offset = u16::try_from(ctxt.bytes_written() - base)?;
        ctxt.write_placeholder(class_def2_offset, offset)?;
        ClassDef::write(ctxt, &grid.class_def2)?;

        debug!("writing {} shared device tables", pool.len());
        pool.write_devices(ctxt, base)
    }
}
