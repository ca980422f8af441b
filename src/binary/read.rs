#![allow(missing_docs)]

//! Parse binary data
//!
//! Every table in this crate is read through a `ReadCtxt`, a cursor over a `ReadScope`. A scope
//! remembers its absolute position (`base`) so offsets read from a table header can be resolved
//! against the start of that table with `ReadScope::offset`. Reads check the remaining length
//! first and fail with `ReadEof` instead of reading out of bounds.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::binary::{I16Be, U16Be};
use crate::error::ParseError;

#[derive(Debug, Copy, Clone)]
pub struct ReadEof {}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadScope<'a> {
    base: usize,
    data: &'a [u8],
}

#[derive(Clone)]
pub struct ReadCtxt<'a> {
    scope: ReadScope<'a>,
    offset: usize,
}

/// Memoises tables that are referenced by offset from several places, keyed by their absolute
/// position in the data.
pub struct ReadCache<T> {
    map: HashMap<usize, Rc<T>>,
}

pub trait ReadBinary {
    type HostType<'a>: Sized;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError>;
}

/// Like `ReadBinary`, for types that need context from elsewhere in the data to be read.
pub trait ReadBinaryDep {
    type Args<'a>: Copy;
    type HostType<'a>: Sized;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError>;
}

/// A value stored in a fixed number of bytes. These can be read in arrays and reserved as
/// placeholders when writing.
pub trait ReadFixed {
    type HostType: Sized;

    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes.
    fn from_bytes(bytes: &[u8]) -> Self::HostType;
}

/// A record built from a fixed size tuple of fields.
pub trait ReadFrom {
    type ReadType: ReadFixed;
    fn read_from(value: <Self::ReadType as ReadFixed>::HostType) -> Self;
}

impl<T> ReadFixed for T
where
    T: ReadFrom,
{
    type HostType = T;

    const SIZE: usize = T::ReadType::SIZE;

    fn from_bytes(bytes: &[u8]) -> T {
        T::read_from(T::ReadType::from_bytes(bytes))
    }
}

impl<T> ReadBinary for T
where
    T: ReadFixed,
{
    type HostType<'a> = T::HostType;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let bytes = ctxt.read_bytes(T::SIZE)?;
        Ok(T::from_bytes(bytes))
    }
}

impl<T> ReadBinaryDep for T
where
    T: ReadBinary,
{
    type Args<'a> = ();
    type HostType<'a> = T::HostType<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (): Self::Args<'_>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        T::read(ctxt)
    }
}

/// A run of fixed size values, decoded on access.
#[derive(Clone)]
pub struct ReadArray<'a, T: ReadFixed> {
    data: &'a [u8],
    length: usize,
    phantom: PhantomData<T>,
}

pub struct ReadArrayIter<'a, T: ReadFixed> {
    chunks: std::slice::ChunksExact<'a, u8>,
    phantom: PhantomData<T>,
}

impl<'a> ReadScope<'a> {
    pub fn new(data: &'a [u8]) -> ReadScope<'a> {
        ReadScope { base: 0, data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Absolute position of this scope within the data it was created from.
    pub fn base(&self) -> usize {
        self.base
    }

    /// The scope starting `offset` bytes in. Offsets past the end give an empty scope, so the
    /// error surfaces at the first read.
    pub fn offset(&self, offset: usize) -> ReadScope<'a> {
        ReadScope {
            base: self.base + offset,
            data: self.data.get(offset..).unwrap_or(&[]),
        }
    }

    pub fn ctxt(&self) -> ReadCtxt<'a> {
        ReadCtxt {
            scope: *self,
            offset: 0,
        }
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&self) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read::<T>()
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read_dep::<T>(args)
    }

    /// Read `T` at this scope, or return the copy already read from the same position.
    pub fn read_cache<T>(
        &self,
        cache: &mut ReadCache<T::HostType<'a>>,
    ) -> Result<Rc<T::HostType<'a>>, ParseError>
    where
        T: 'static + ReadBinaryDep<Args<'a> = ()>,
    {
        match cache.map.entry(self.base) {
            Entry::Vacant(entry) => {
                let t = Rc::new(self.read::<T>()?);
                Ok(Rc::clone(entry.insert(t)))
            }
            Entry::Occupied(entry) => Ok(Rc::clone(entry.get())),
        }
    }
}

impl<T> ReadCache<T> {
    pub fn new() -> Self {
        ReadCache {
            map: HashMap::new(),
        }
    }
}

impl<T> Default for ReadCache<T> {
    fn default() -> Self {
        ReadCache::new()
    }
}

impl<'a> ReadCtxt<'a> {
    pub fn check(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadValue),
        }
    }

    /// The scope from the current position onwards.
    pub fn scope(&self) -> ReadScope<'a> {
        self.scope.offset(self.offset)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&mut self) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, ())
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &mut self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, args)
    }

    /// The number of bytes left to read in this context.
    pub fn remaining(&self) -> usize {
        self.scope.data.len().saturating_sub(self.offset)
    }

    fn read_bytes(&mut self, length: usize) -> Result<&'a [u8], ReadEof> {
        let end = self.offset.checked_add(length).ok_or(ReadEof {})?;
        let bytes = self.scope.data.get(self.offset..end).ok_or(ReadEof {})?;
        self.offset = end;
        Ok(bytes)
    }

    pub fn read_u16be(&mut self) -> Result<u16, ReadEof> {
        let bytes = self.read_bytes(U16Be::SIZE)?;
        Ok(U16Be::from_bytes(bytes))
    }

    pub fn read_i16be(&mut self) -> Result<i16, ReadEof> {
        let bytes = self.read_bytes(I16Be::SIZE)?;
        Ok(I16Be::from_bytes(bytes))
    }

    pub fn read_array<T: ReadFixed>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let byte_len = length
            .checked_mul(T::SIZE)
            .ok_or(ParseError::LimitExceeded)?;
        let data = self.read_bytes(byte_len)?;
        Ok(ReadArray {
            data,
            length,
            phantom: PhantomData,
        })
    }

    /// Read at most `length` items, capped to the number of whole items remaining.
    ///
    /// Some fonts in the wild declare more class ranges than they contain.
    pub fn read_array_upto_hack<T: ReadFixed>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let available = self.remaining() / T::SIZE;
        self.read_array(length.min(available))
    }
}

impl<'a, T: ReadFixed> ReadArray<'a, T> {
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn get_item(&self, index: usize) -> Option<T::HostType> {
        let start = index.checked_mul(T::SIZE)?;
        let bytes = self.data.get(start..start + T::SIZE)?;
        Some(T::from_bytes(bytes))
    }

    pub fn to_vec(&self) -> Vec<T::HostType> {
        self.iter().collect()
    }

    pub fn iter(&self) -> ReadArrayIter<'a, T> {
        ReadArrayIter {
            chunks: self.data.chunks_exact(T::SIZE),
            phantom: PhantomData,
        }
    }
}

impl<'a, 'b, T: ReadFixed> IntoIterator for &'b ReadArray<'a, T> {
    type Item = T::HostType;
    type IntoIter = ReadArrayIter<'a, T>;
    fn into_iter(self) -> ReadArrayIter<'a, T> {
        self.iter()
    }
}

impl<'a, T: ReadFixed> Iterator for ReadArrayIter<'a, T> {
    type Item = T::HostType;

    fn next(&mut self) -> Option<T::HostType> {
        self.chunks.next().map(T::from_bytes)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<'a, T: ReadFixed> ExactSizeIterator for ReadArrayIter<'a, T> {}

impl ReadFixed for U16Be {
    type HostType = u16;

    const SIZE: usize = 2;

    fn from_bytes(bytes: &[u8]) -> u16 {
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
}

impl ReadFixed for I16Be {
    type HostType = i16;

    const SIZE: usize = 2;

    fn from_bytes(bytes: &[u8]) -> i16 {
        i16::from_be_bytes([bytes[0], bytes[1]])
    }
}

impl<T1, T2, T3> ReadFixed for (T1, T2, T3)
where
    T1: ReadFixed,
    T2: ReadFixed,
    T3: ReadFixed,
{
    type HostType = (T1::HostType, T2::HostType, T3::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE + T3::SIZE;

    fn from_bytes(bytes: &[u8]) -> Self::HostType {
        let (b1, rest) = bytes.split_at(T1::SIZE);
        let (b2, b3) = rest.split_at(T2::SIZE);
        (T1::from_bytes(b1), T2::from_bytes(b2), T3::from_bytes(b3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u16_array() {
        let scope = ReadScope::new(&[0, 1, 0, 2, 0xFF, 0xFE]);
        let array = scope.ctxt().read_array::<U16Be>(3).unwrap();
        assert_eq!(array.to_vec(), vec![1, 2, 0xFFFE]);
        assert_eq!(array.get_item(2), Some(0xFFFE));
        assert_eq!(array.get_item(3), None);
        assert_eq!(array.iter().len(), 3);
    }

    #[test]
    fn test_read_past_end() {
        let scope = ReadScope::new(&[0, 1, 2]);
        let mut ctxt = scope.ctxt();
        assert_eq!(ctxt.read_u16be().unwrap(), 1);
        assert_eq!(ctxt.remaining(), 1);
        assert!(ctxt.read_u16be().is_err());
        assert!(ctxt.read_array::<U16Be>(1).is_err());
        // a failed read does not move the cursor
        assert_eq!(ctxt.remaining(), 1);
    }

    #[test]
    fn test_read_triples() {
        let scope = ReadScope::new(&[0, 5, 0, 9, 0xFF, 0xFF, 0, 1]);
        let array = scope
            .ctxt()
            .read_array_upto_hack::<(U16Be, U16Be, I16Be)>(4)
            .unwrap();
        assert_eq!(array.len(), 1);
        assert_eq!(array.to_vec(), vec![(5, 9, -1)]);
    }

    #[test]
    fn test_offset_keeps_base() {
        let scope = ReadScope::new(&[1, 2, 3, 4]);
        let sub = scope.offset(2);
        assert_eq!(sub.base(), 2);
        assert_eq!(sub.data(), &[3, 4]);
        assert_eq!(sub.offset(1).base(), 3);
        assert!(scope.offset(99).data().is_empty());
    }

    #[test]
    fn test_read_cache_reuses_position() {
        let data = [0, 7, 0, 7];
        let scope = ReadScope::new(&data);
        let mut cache = ReadCache::<u16>::new();
        let first = scope.offset(2).read_cache::<U16Be>(&mut cache).unwrap();
        let again = scope.offset(2).read_cache::<U16Be>(&mut cache).unwrap();
        let other = scope.read_cache::<U16Be>(&mut cache).unwrap();
        assert!(Rc::ptr_eq(&first, &again));
        assert!(!Rc::ptr_eq(&first, &other));
        assert_eq!(*other, 7);
    }
}
