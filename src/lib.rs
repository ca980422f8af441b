#![warn(rust_2018_idioms)]

//! Reading, writing and editing of OpenType class pair positioning subtables
//! (GPOS lookup type 2, format 2).
//!
//! The central type is [`pairpos::PairClasses`]: a grid of adjustments indexed by a pair of glyph
//! classes, with the two class definitions that assign glyphs to classes. It can be
//! read from and written to binary data, checked against its coverage table, compacted,
//! renumbered, applied to a run of glyphs, and exchanged with Font Worker and VOLT source text.
//!
//! Problems that do not stop processing are collected in a [`report::Report`].

/// Reading and writing of binary data.
pub mod binary;
pub mod error;
pub mod fontworker;
pub mod layout;
pub mod pairpos;
pub mod report;
/// Shared test code.
#[cfg(test)]
pub mod tests;
pub mod volt;

pub use crate::pairpos::{Key, PairClasses, PairValue};
pub use crate::report::Report;
