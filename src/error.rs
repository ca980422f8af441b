//! Error types

use crate::binary::read::ReadEof;
use std::fmt;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadIndex,
    LimitExceeded,
    /// Fewer than the 16 bytes of a PairPos format 2 header are available.
    TruncatedHeader,
    /// A subtable or device table declared a format this crate does not read.
    UnsupportedFormat(u16),
    /// The coverage offset of a subtable is zero.
    MissingCoverage,
    /// A value format has bits set outside of the defined `0x00FF` mask.
    ReservedBitsSet(u16),
    /// A declared class count disagrees with the classes its class definition uses.
    ClassCountMismatch { which: ClassSide, count: u16 },
}

/// Identifies which of the two class definitions of a subtable an error refers to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ClassSide {
    First,
    Second,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
            ParseError::TruncatedHeader => write!(f, "insufficient bytes for subtable header"),
            ParseError::UnsupportedFormat(format) => write!(f, "unsupported format {}", format),
            ParseError::MissingCoverage => write!(f, "subtable has no coverage table"),
            ParseError::ReservedBitsSet(bits) => {
                write!(f, "value format has reserved bits set (0x{:04X})", bits)
            }
            ParseError::ClassCountMismatch { which, count } => write!(
                f,
                "class count {} does not agree with the {} class definition",
                count, which
            ),
        }
    }
}

impl std::error::Error for ParseError {}

impl fmt::Display for ClassSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassSide::First => f.write_str("first"),
            ClassSide::Second => f.write_str("second"),
        }
    }
}

/// Errors that originate when writing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriteError {
    /// A value cannot be represented in the binary format, such as an offset beyond 64 KiB or a
    /// value record field that is not covered by the subtable's value format.
    BadValue,
    PlaceholderMismatch,
}

impl From<std::num::TryFromIntError> for WriteError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        WriteError::BadValue
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BadValue => write!(f, "write: bad value"),
            WriteError::PlaceholderMismatch => {
                write!(f, "data written to placeholder did not match expected size")
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// Enum that can hold read (`ParseError`) and write errors
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ReadWriteError {
    Read(ParseError),
    Write(WriteError),
}

impl From<ParseError> for ReadWriteError {
    fn from(error: ParseError) -> Self {
        ReadWriteError::Read(error)
    }
}

impl From<WriteError> for ReadWriteError {
    fn from(error: WriteError) -> Self {
        ReadWriteError::Write(error)
    }
}

impl fmt::Display for ReadWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadWriteError::Read(err) => write!(f, "read error: {}", err),
            ReadWriteError::Write(err) => write!(f, "write error: {}", err),
        }
    }
}

impl std::error::Error for ReadWriteError {}

/// Errors from constructing a `Key` out of untrusted class indices
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum KeyError {
    /// A component is negative or does not fit in 16 bits.
    InvalidKey { first: i64, second: i64 },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::InvalidKey { first, second } => write!(
                f,
                "invalid class pair ({}, {}): classes must be in 0..=65535",
                first, second
            ),
        }
    }
}

impl std::error::Error for KeyError {}

/// Errors that abort reading Font Worker source text
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum FontWorkerError {
    /// The input ended before `subtable end` or `lookup end`. `line` is where the subtable began.
    MissingTerminator { line: usize },
    /// The input ended before any class definitions or pair data were found.
    Incomplete,
}

impl fmt::Display for FontWorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontWorkerError::MissingTerminator { line } => write!(
                f,
                "subtable starting at line {} has no 'subtable end' or 'lookup end'",
                line
            ),
            FontWorkerError::Incomplete => write!(f, "source ended before any pair data"),
        }
    }
}

impl std::error::Error for FontWorkerError {}

/// Errors that prevent a subtable from being expressed as VOLT source
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum VoltError {
    /// Glyphs covered without a first class cannot be expressed as VOLT groups.
    CoverageExtras,
    /// A value adjusts something other than the x advance.
    UnsupportedValueMask { first: u16, second: u16 },
    /// A key refers to class 0, which has no VOLT group.
    ImplicitClass,
}

impl fmt::Display for VoltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoltError::CoverageExtras => {
                write!(f, "coverage glyphs outside the first class definition")
            }
            VoltError::UnsupportedValueMask { first, second } => write!(
                f,
                "value masks 0x{:04X}/0x{:04X} cannot be expressed in VOLT",
                first, second
            ),
            VoltError::ImplicitClass => write!(f, "class 0 cannot be expressed in VOLT"),
        }
    }
}

impl std::error::Error for VoltError {}
