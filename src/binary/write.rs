#![deny(missing_docs)]

//! Write binary data
//!
//! Subtables are written in a single pass. Fields whose value is not known until later in the
//! pass, such as offsets to tables that follow the header, are reserved with
//! `WriteContext::placeholder` and filled in with `WriteContext::write_placeholder` once the
//! referenced table has been written.

use std::marker::PhantomData;

use crate::binary::read::ReadFixed;
use crate::binary::{I16Be, U16Be};
use crate::error::WriteError;

/// An in-memory buffer that implements `WriteContext`.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    data: Vec<u8>,
}

/// A reserved, zero-filled field of type `T` that will be filled in later using
/// `WriteContext::write_placeholder`.
#[derive(Debug)]
pub struct Placeholder<T, HostType>
where
    T: WriteBinary<HostType>,
{
    offset: usize,
    length: usize,
    marker: PhantomData<(T, HostType)>,
}

/// Trait that describes a type that can be written to a `WriteContext` in binary form.
pub trait WriteBinary<HostType = Self> {
    /// The type of the value returned by `write`.
    type Output;

    /// Write the binary representation of `val` to `ctxt`.
    fn write<C: WriteContext>(ctxt: &mut C, val: HostType) -> Result<Self::Output, WriteError>;
}

/// Trait for types that can have binary data written to them.
pub trait WriteContext {
    /// Append `data`.
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError>;

    /// The total number of bytes written so far.
    fn bytes_written(&self) -> usize;

    /// Fill in a field reserved earlier by `placeholder`.
    ///
    /// Fails with `WriteError::PlaceholderMismatch` if `val` does not occupy exactly the
    /// reserved number of bytes.
    fn write_placeholder<T, HostType>(
        &mut self,
        placeholder: Placeholder<T, HostType>,
        val: HostType,
    ) -> Result<T::Output, WriteError>
    where
        T: WriteBinary<HostType>;

    /// Append `count` zero bytes.
    fn write_zeros(&mut self, count: usize) -> Result<(), WriteError> {
        self.write_bytes(&vec![0; count])
    }

    /// Write each item of an iterator as `T`.
    fn write_iter<T, HostType>(
        &mut self,
        iter: impl Iterator<Item = HostType>,
    ) -> Result<(), WriteError>
    where
        Self: Sized,
        T: WriteBinary<HostType>,
    {
        iter.map(|val| T::write(self, val).map(drop)).collect()
    }

    /// Reserve space for a `T` to be filled in later.
    fn placeholder<T, HostType>(&mut self) -> Result<Placeholder<T, HostType>, WriteError>
    where
        T: WriteBinary<HostType> + ReadFixed,
    {
        let offset = self.bytes_written();
        self.write_zeros(T::SIZE)?;
        Ok(Placeholder {
            offset,
            length: T::SIZE,
            marker: PhantomData,
        })
    }
}

impl<T> WriteBinary<T> for I16Be
where
    T: Into<i16>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        ctxt.write_bytes(&t.into().to_be_bytes())
    }
}

impl<T> WriteBinary<T> for U16Be
where
    T: Into<u16>,
{
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, t: T) -> Result<(), WriteError> {
        ctxt.write_bytes(&t.into().to_be_bytes())
    }
}

impl WriteContext for WriteBuffer {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn bytes_written(&self) -> usize {
        self.data.len()
    }

    fn write_placeholder<T, HostType>(
        &mut self,
        placeholder: Placeholder<T, HostType>,
        val: HostType,
    ) -> Result<T::Output, WriteError>
    where
        T: WriteBinary<HostType>,
    {
        let mut field = WriteBuffer::new();
        let output = T::write(&mut field, val)?;
        let end = placeholder.offset + placeholder.length;
        match self.data.get_mut(placeholder.offset..end) {
            Some(reserved) if field.len() == placeholder.length => {
                reserved.copy_from_slice(field.bytes());
                Ok(output)
            }
            _ => Err(WriteError::PlaceholderMismatch),
        }
    }
}

impl WriteBuffer {
    /// Create a new, empty `WriteBuffer`
    pub fn new() -> Self {
        WriteBuffer { data: Vec::new() }
    }

    /// Retrieve a slice of the data held by this buffer
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the current size of the data held by this buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written to this buffer
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume `self` and return the inner buffer
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}
