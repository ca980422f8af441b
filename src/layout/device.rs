//! Device tables: per-ppem pixel adjustments attached to a positioning value.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/chapter2#device-and-variationindex-tables>

use std::collections::BTreeMap;

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::U16Be;
use crate::error::{ParseError, WriteError};

const LOCAL_2_BIT_DELTAS: u16 = 1;
const LOCAL_4_BIT_DELTAS: u16 = 2;
const LOCAL_8_BIT_DELTAS: u16 = 3;
const VARIATION_INDEX: u16 = 0x8000;

/// A device table, or the variation index table that shares its offset slot in variable fonts.
///
/// Two devices are equal when they hold the same content, whatever format they were read from.
/// Delta tables order before variation indices; delta tables are ordered lexicographically over
/// their `(ppem, delta)` pairs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Device {
    /// Non-zero pixel deltas keyed by ppem.
    Deltas(BTreeMap<u16, i8>),
    /// A delta set in the font's item variation store.
    VariationIndex { outer: u16, inner: u16 },
}

impl Default for Device {
    fn default() -> Self {
        Device::Deltas(BTreeMap::new())
    }
}

impl ReadBinary for Device {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let start_size = ctxt.read_u16be()?;
        let end_size = ctxt.read_u16be()?;
        let delta_format = ctxt.read_u16be()?;
        let bits = match delta_format {
            LOCAL_2_BIT_DELTAS => 2,
            LOCAL_4_BIT_DELTAS => 4,
            LOCAL_8_BIT_DELTAS => 8,
            // the first two fields hold the delta set indices
            VARIATION_INDEX => {
                return Ok(Device::VariationIndex {
                    outer: start_size,
                    inner: end_size,
                })
            }
            _ => return Err(ParseError::UnsupportedFormat(delta_format)),
        };
        ctxt.check(start_size <= end_size)?;

        let count = usize::from(end_size - start_size) + 1;
        let words = ctxt.read_array::<U16Be>((count * bits + 15) / 16)?;
        let mask = (1u16 << bits) - 1;
        let mut deltas = BTreeMap::new();
        for (i, ppem) in (start_size..=end_size).enumerate() {
            let bit_index = i * bits;
            let word = words.get_item(bit_index / 16).ok_or(ParseError::BadIndex)?;
            let shift = 16 - bits - bit_index % 16;
            let raw = (word >> shift) & mask;
            // sign extend
            let delta = if raw & (1 << (bits - 1)) != 0 {
                i32::from(raw) - (1 << bits)
            } else {
                i32::from(raw)
            };
            if delta != 0 {
                deltas.insert(ppem, delta as i8);
            }
        }
        Ok(Device::Deltas(deltas))
    }
}

impl WriteBinary<&Self> for Device {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, device: &Device) -> Result<(), WriteError> {
        let deltas = match device {
            Device::Deltas(deltas) => deltas,
            Device::VariationIndex { outer, inner } => {
                U16Be::write(ctxt, *outer)?;
                U16Be::write(ctxt, *inner)?;
                return U16Be::write(ctxt, VARIATION_INDEX);
            }
        };
        let (start_size, end_size) = match (deltas.keys().next(), deltas.keys().next_back()) {
            (Some(&start), Some(&end)) => (start, end),
            // An empty device is never referenced, but keep it well formed.
            _ => (0, 0),
        };
        let values = (start_size..=end_size)
            .map(|ppem| device.get(ppem))
            .collect::<Vec<_>>();
        let delta_format = device.delta_format();

        U16Be::write(ctxt, start_size)?;
        U16Be::write(ctxt, end_size)?;
        U16Be::write(ctxt, delta_format)?;
        ctxt.write_iter::<U16Be, _>(encode_deltas(delta_format, &values).into_iter())
    }
}

fn encode_deltas(delta_format: u16, values: &[i8]) -> Vec<u16> {
    let (chunk_size, mask, bits) = match delta_format {
        LOCAL_2_BIT_DELTAS => (8, 0b11, 2),
        LOCAL_4_BIT_DELTAS => (4, 0b1111, 4),
        _ => (2, 0b11111111, 8),
    };
    values
        .chunks(chunk_size)
        .map(|chunk| encode_chunk(chunk, mask, bits))
        .collect()
}

fn encode_chunk(chunk: &[i8], mask: u8, bits: usize) -> u16 {
    let mut out = 0u16;
    for (i, val) in chunk.iter().enumerate() {
        out |= ((val.to_be_bytes()[0] & mask) as u16) << ((16 - bits) - i * bits);
    }
    out
}

impl Device {
    pub fn new() -> Self {
        Device::default()
    }

    /// Set the delta for `ppem`. A delta of zero removes the entry.
    ///
    /// A variation index is replaced by a delta table holding just this entry.
    pub fn insert(&mut self, ppem: u16, delta: i8) {
        if let Device::VariationIndex { .. } = self {
            *self = Device::new();
        }
        if let Device::Deltas(deltas) = self {
            if delta == 0 {
                deltas.remove(&ppem);
            } else {
                deltas.insert(ppem, delta);
            }
        }
    }

    /// The delta at `ppem`, zero when none is set or for a variation index.
    pub fn get(&self, ppem: u16) -> i8 {
        match self {
            Device::Deltas(deltas) => deltas.get(&ppem).copied().unwrap_or(0),
            Device::VariationIndex { .. } => 0,
        }
    }

    /// The `(ppem, delta)` pairs of a delta table. Empty for a variation index.
    pub fn iter(&self) -> impl Iterator<Item = (u16, i8)> + '_ {
        let deltas = match self {
            Device::Deltas(deltas) => Some(deltas),
            Device::VariationIndex { .. } => None,
        };
        deltas
            .into_iter()
            .flatten()
            .map(|(&ppem, &delta)| (ppem, delta))
    }

    /// A delta table with no deltas has no effect. A variation index always refers to something.
    pub fn is_empty(&self) -> bool {
        match self {
            Device::Deltas(deltas) => deltas.is_empty(),
            Device::VariationIndex { .. } => false,
        }
    }

    /// The narrowest delta format that can hold every delta, or `0x8000` for a variation index.
    pub fn delta_format(&self) -> u16 {
        let deltas = match self {
            Device::Deltas(deltas) => deltas,
            Device::VariationIndex { .. } => return VARIATION_INDEX,
        };
        let (min, max) = deltas
            .values()
            .fold((0i8, 0i8), |(min, max), &d| (min.min(d), max.max(d)));
        if min >= -2 && max <= 1 {
            LOCAL_2_BIT_DELTAS
        } else if min >= -8 && max <= 7 {
            LOCAL_4_BIT_DELTAS
        } else {
            LOCAL_8_BIT_DELTAS
        }
    }
}

impl FromIterator<(u16, i8)> for Device {
    fn from_iter<I: IntoIterator<Item = (u16, i8)>>(iter: I) -> Self {
        let mut device = Device::new();
        for (ppem, delta) in iter {
            device.insert(ppem, delta);
        }
        device
    }
}
