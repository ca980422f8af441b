//! Shared test code.

use std::collections::BTreeMap;

use crate::layout::{ClassDef, ValueRecord};
use crate::pairpos::{Key, PairClasses, PairValue};

pub(crate) mod writer {
    //! Assemble big-endian test fixtures from typed fields.
    #![allow(dead_code)]

    // The writer module is derived from ttf-parser, licenced under Apache-2.0.
    // https://github.com/RazrFalcon/ttf-parser/blob/439aaaebd50eb8aed66302e3c1b51fae047f85b2/src/writer.rs

    #[allow(missing_debug_implementations)]
    #[derive(Clone, Copy)]
    pub enum TtfType {
        Int16(i16),
        UInt16(u16),
    }

    pub fn convert(values: &[TtfType]) -> Vec<u8> {
        let mut data = Vec::with_capacity(256);
        for v in values {
            convert_type(*v, &mut data);
        }

        data
    }

    pub fn convert_type(value: TtfType, data: &mut Vec<u8>) {
        match value {
            TtfType::Int16(n) => {
                data.extend_from_slice(&i16::to_be_bytes(n));
            }
            TtfType::UInt16(n) => {
                data.extend_from_slice(&u16::to_be_bytes(n));
            }
        }
    }
}

/// Build a class definition from `(glyph, class)` pairs.
pub(crate) fn cd(entries: &[(u16, u16)]) -> ClassDef {
    entries.iter().copied().collect()
}

/// A grid with one class pair that moves the second glyph left by 10 units.
///
/// First class 2 (glyph 7) is not used by any class pair.
pub(crate) fn sample_grid() -> PairClasses {
    let mut cells = BTreeMap::new();
    cells.insert(
        Key::new(1, 1),
        PairValue::new(
            None,
            Some(ValueRecord {
                x_placement: -10,
                ..ValueRecord::default()
            }),
        ),
    );
    PairClasses::new(
        cells,
        cd(&[(5, 1), (6, 1), (7, 2), (15, 1)]),
        cd(&[(20, 1), (21, 1), (22, 1)]),
    )
}

/// A grid where one class pair adjusts only the first glyph and another adjusts both.
pub(crate) fn runone_grid() -> PairClasses {
    let first = ValueRecord {
        x_advance: -15,
        ..ValueRecord::default()
    };
    let second = ValueRecord {
        y_placement: 20,
        ..ValueRecord::default()
    };
    let mut cells = BTreeMap::new();
    cells.insert(Key::new(1, 1), PairValue::new(Some(first.clone()), None));
    cells.insert(Key::new(1, 2), PairValue::new(Some(first), Some(second)));
    PairClasses::new(cells, cd(&[(8, 1)]), cd(&[(15, 2), (20, 1)]))
}
