//! Buffer allocation and byte-level decoding helpers.

use alloc::vec::Vec;

use genio::error::ReadExactError;
use zerocopy::{AsBytes, FromBytes};

use crate::Error;

/// Allocates a zero-filled buffer, reporting allocator refusal instead of
/// aborting.
pub fn zeroed_buffer(len: usize) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory { bytes: len })?;
    buffer.resize(len, 0);
    Ok(buffer)
}

/// Appends `bytes` to `buffer`, growing it fallibly.
pub fn try_extend(buffer: &mut Vec<u8>, bytes: &[u8]) -> Result<(), Error> {
    buffer
        .try_reserve(bytes.len())
        .map_err(|_| Error::OutOfMemory {
            bytes: buffer.len() + bytes.len(),
        })?;
    buffer.extend_from_slice(bytes);
    Ok(())
}

/// Decodes a `T` from the bytes starting at `offset`.
pub fn read_struct<T: FromBytes>(bytes: &[u8], offset: usize) -> Option<T> {
    T::read_from_prefix(bytes.get(offset..)?)
}

/// Reads exactly `size_of::<T>()` bytes from `reader` and decodes them as a
/// `T`. Handy for pulling a header off the front of an open file.
pub fn zero_copy_read<R, T>(reader: &mut R) -> Result<T, ReadExactError<R::ReadError>>
where
    R: genio::Read,
    T: AsBytes + FromBytes,
{
    let mut s = T::new_zeroed();
    let buf = s.as_bytes_mut();
    reader.read_exact(buf)?;
    Ok(s)
}
