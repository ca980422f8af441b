//! Value formats and value records: the adjustment applied to one glyph of a pair.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;

use crate::binary::read::{ReadBinary, ReadBinaryDep, ReadCache, ReadCtxt, ReadFixed, ReadScope};
use crate::binary::write::{Placeholder, WriteBinary, WriteContext};
use crate::binary::{I16Be, U16Be};
use crate::error::{ParseError, WriteError};
use crate::layout::device::Device;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ValueFormat: u16 {
        const X_PLACEMENT        = 0x0001;
        const Y_PLACEMENT        = 0x0002;
        const X_ADVANCE          = 0x0004;
        const Y_ADVANCE          = 0x0008;
        const X_PLACEMENT_DEVICE = 0x0010;
        const Y_PLACEMENT_DEVICE = 0x0020;
        const X_ADVANCE_DEVICE   = 0x0040;
        const Y_ADVANCE_DEVICE   = 0x0080;
        // 0xFF00   Reserved    For future use (set to zero)
    }
}

impl ReadBinary for ValueFormat {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let value_format = ctxt.read_u16be()?;
        ValueFormat::from_bits(value_format).ok_or(ParseError::ReservedBitsSet(value_format))
    }
}

impl ValueFormat {
    /// Number of bytes a value record of this format occupies.
    pub fn size(self) -> usize {
        self.bits().count_ones() as usize * U16Be::SIZE
    }
}

/// Adjustments for one glyph. A zero delta or a missing device means no adjustment.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueRecord {
    pub x_placement: i16,
    pub y_placement: i16,
    pub x_advance: i16,
    pub y_advance: i16,
    pub x_placement_device: Option<Device>,
    pub y_placement_device: Option<Device>,
    pub x_advance_device: Option<Device>,
    pub y_advance_device: Option<Device>,
}

/// Arguments for reading a value record: its format, the scope device offsets are relative to,
/// and a cache so a device shared by many records is read once.
pub type ValueRecordArgs<'a> = (ValueFormat, ReadScope<'a>, &'a RefCell<ReadCache<Device>>);

impl ReadBinaryDep for ValueRecord {
    type Args<'a> = ValueRecordArgs<'a>;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, args: Self::Args<'a>) -> Result<Self, ParseError> {
        let (value_format, scope, devices) = args;
        let mut read_delta = |flag: ValueFormat| -> Result<i16, ParseError> {
            if value_format.contains(flag) {
                Ok(ctxt.read_i16be()?)
            } else {
                Ok(0)
            }
        };
        let x_placement = read_delta(ValueFormat::X_PLACEMENT)?;
        let y_placement = read_delta(ValueFormat::Y_PLACEMENT)?;
        let x_advance = read_delta(ValueFormat::X_ADVANCE)?;
        let y_advance = read_delta(ValueFormat::Y_ADVANCE)?;

        let mut read_device = |flag: ValueFormat| -> Result<Option<Device>, ParseError> {
            if !value_format.contains(flag) {
                return Ok(None);
            }
            match ctxt.read_u16be()? {
                0 => Ok(None),
                offset => {
                    let device = scope
                        .offset(usize::from(offset))
                        .read_cache::<Device>(&mut devices.borrow_mut())?;
                    Ok(Some(Device::clone(&device)).filter(|device| !device.is_empty()))
                }
            }
        };
        let x_placement_device = read_device(ValueFormat::X_PLACEMENT_DEVICE)?;
        let y_placement_device = read_device(ValueFormat::Y_PLACEMENT_DEVICE)?;
        let x_advance_device = read_device(ValueFormat::X_ADVANCE_DEVICE)?;
        let y_advance_device = read_device(ValueFormat::Y_ADVANCE_DEVICE)?;

        Ok(ValueRecord {
            x_placement,
            y_placement,
            x_advance,
            y_advance,
            x_placement_device,
            y_placement_device,
            x_advance_device,
            y_advance_device,
        })
    }
}

impl ValueRecord {
    /// The fields of this record that have an effect.
    pub fn format(&self) -> ValueFormat {
        let mut format = ValueFormat::empty();
        format.set(ValueFormat::X_PLACEMENT, self.x_placement != 0);
        format.set(ValueFormat::Y_PLACEMENT, self.y_placement != 0);
        format.set(ValueFormat::X_ADVANCE, self.x_advance != 0);
        format.set(ValueFormat::Y_ADVANCE, self.y_advance != 0);
        format.set(
            ValueFormat::X_PLACEMENT_DEVICE,
            has_device(&self.x_placement_device),
        );
        format.set(
            ValueFormat::Y_PLACEMENT_DEVICE,
            has_device(&self.y_placement_device),
        );
        format.set(
            ValueFormat::X_ADVANCE_DEVICE,
            has_device(&self.x_advance_device),
        );
        format.set(
            ValueFormat::Y_ADVANCE_DEVICE,
            has_device(&self.y_advance_device),
        );
        format
    }

    pub fn has_effect(&self) -> bool {
        !self.format().is_empty()
    }

    fn devices(&self) -> [(ValueFormat, Option<&Device>); 4] {
        [
            (
                ValueFormat::X_PLACEMENT_DEVICE,
                self.x_placement_device.as_ref(),
            ),
            (
                ValueFormat::Y_PLACEMENT_DEVICE,
                self.y_placement_device.as_ref(),
            ),
            (ValueFormat::X_ADVANCE_DEVICE, self.x_advance_device.as_ref()),
            (ValueFormat::Y_ADVANCE_DEVICE, self.y_advance_device.as_ref()),
        ]
    }

    /// Write `record` (or an all-zero record for `None`) in `value_format`.
    ///
    /// Device offsets are reserved and queued on `pool`; they are filled in by
    /// `DevicePool::write_devices`. Fails with `WriteError::BadValue` if the record has an effect
    /// that `value_format` cannot hold.
    pub fn write_pooled<'d, C: WriteContext>(
        ctxt: &mut C,
        record: Option<&'d ValueRecord>,
        value_format: ValueFormat,
        pool: &mut DevicePool<'d>,
    ) -> Result<(), WriteError> {
        let empty = ValueRecord::default();
        let deltas = record.unwrap_or(&empty);
        if !value_format.contains(deltas.format()) {
            return Err(WriteError::BadValue);
        }

        for (flag, delta) in [
            (ValueFormat::X_PLACEMENT, deltas.x_placement),
            (ValueFormat::Y_PLACEMENT, deltas.y_placement),
            (ValueFormat::X_ADVANCE, deltas.x_advance),
            (ValueFormat::Y_ADVANCE, deltas.y_advance),
        ] {
            if value_format.contains(flag) {
                I16Be::write(ctxt, delta)?;
            }
        }

        let devices = match record {
            Some(record) => record.devices(),
            None => [
                (ValueFormat::X_PLACEMENT_DEVICE, None),
                (ValueFormat::Y_PLACEMENT_DEVICE, None),
                (ValueFormat::X_ADVANCE_DEVICE, None),
                (ValueFormat::Y_ADVANCE_DEVICE, None),
            ],
        };
        for (flag, device) in devices {
            if !value_format.contains(flag) {
                continue;
            }
            match device.filter(|device| !device.is_empty()) {
                Some(device) => {
                    let placeholder = ctxt.placeholder::<U16Be, u16>()?;
                    pool.add(device, placeholder);
                }
                None => U16Be::write(ctxt, 0u16)?,
            }
        }
        Ok(())
    }
}

fn has_device(device: &Option<Device>) -> bool {
    device.as_ref().map_or(false, |device| !device.is_empty())
}

/// Device tables referenced while writing one subtable, each written once.
///
/// Devices are compared by content, and are written in content order so output does not
/// depend on the order in which values were visited.
#[derive(Default)]
pub struct DevicePool<'d> {
    pending: BTreeMap<&'d Device, Vec<Placeholder<U16Be, u16>>>,
}

impl<'d> DevicePool<'d> {
    pub fn new() -> Self {
        DevicePool::default()
    }

    fn add(&mut self, device: &'d Device, placeholder: Placeholder<U16Be, u16>) {
        self.pending.entry(device).or_default().push(placeholder);
    }

    /// Number of distinct devices queued.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Write every queued device and fill in the offsets that refer to it. Offsets are relative
    /// to `base`, the position the subtable started at.
    pub fn write_devices<C: WriteContext>(
        self,
        ctxt: &mut C,
        base: usize,
    ) -> Result<(), WriteError> {
        for (device, placeholders) in self.pending {
            let offset = u16::try_from(ctxt.bytes_written() - base)?;
            Device::write(ctxt, device)?;
            for placeholder in placeholders {
                ctxt.write_placeholder(placeholder, offset)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ValueRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for (name, delta) in [
            ("x placement", self.x_placement),
            ("y placement", self.y_placement),
            ("x advance", self.x_advance),
            ("y advance", self.y_advance),
        ] {
            if delta != 0 {
                parts.push(format!("{} {}", name, delta));
            }
        }
        for (flag, device) in self.devices() {
            if let Some(device) = device.filter(|device| !device.is_empty()) {
                parts.push(format!("{:?} {:?}", flag, device));
            }
        }
        if parts.is_empty() {
            f.write_str("no effect")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}
