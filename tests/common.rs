#![allow(dead_code)]

use pairclass::binary::read::ReadScope;
use pairclass::binary::write::{WriteBinary, WriteBuffer};
use pairclass::error::ReadWriteError;
use pairclass::layout::{ClassDef, ValueRecord};
use pairclass::{PairClasses, Report};

pub fn class_def(entries: &[(u16, u16)]) -> ClassDef {
    entries.iter().copied().collect()
}

pub fn x_advance(delta: i16) -> Option<ValueRecord> {
    Some(ValueRecord {
        x_advance: delta,
        ..ValueRecord::default()
    })
}

pub fn encode(grid: &PairClasses) -> Vec<u8> {
    let mut buffer = WriteBuffer::new();
    PairClasses::write(&mut buffer, grid).expect("error writing pair classes");
    buffer.into_inner()
}

/// Write `grid` and read it back.
pub fn round_trip(grid: &PairClasses, report: &Report) -> Result<PairClasses, ReadWriteError> {
    let mut buffer = WriteBuffer::new();
    PairClasses::write(&mut buffer, grid)?;
    let decoded = ReadScope::new(buffer.bytes()).read_dep::<PairClasses>(report)?;
    Ok(decoded)
}
