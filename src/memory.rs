//! Bounds-checked access to guest linear memory.
//!
//! The execution engine owns guest memory; `poll_oneoff` only needs to read
//! the subscription array, write the event array and store the event count.
//! Any engine can provide this by implementing [`GuestMemory`]; a plain byte
//! slice works out of the box.

use crate::{Error, Result};

pub trait GuestMemory {
    /// Borrow `len` bytes starting at guest address `ptr`.
    fn read(&self, ptr: u32, len: u32) -> Result<&[u8]>;

    /// Mutably borrow `len` bytes starting at guest address `ptr`.
    fn read_mut(&mut self, ptr: u32, len: u32) -> Result<&mut [u8]>;

    /// Store a little-endian `u32` at guest address `ptr`.
    fn write_u32(&mut self, ptr: u32, value: u32) -> Result<()> {
        self.read_mut(ptr, 4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

fn checked_range(ptr: u32, len: u32) -> Result<std::ops::Range<usize>> {
    // check for overflow
    let end = ptr.checked_add(len).ok_or(Error::Fault)?;
    Ok(ptr as usize..end as usize)
}

impl GuestMemory for [u8] {
    fn read(&self, ptr: u32, len: u32) -> Result<&[u8]> {
        self.get(checked_range(ptr, len)?).ok_or(Error::Fault)
    }

    fn read_mut(&mut self, ptr: u32, len: u32) -> Result<&mut [u8]> {
        self.get_mut(checked_range(ptr, len)?).ok_or(Error::Fault)
    }
}

impl GuestMemory for Vec<u8> {
    fn read(&self, ptr: u32, len: u32) -> Result<&[u8]> {
        self.as_slice().read(ptr, len)
    }

    fn read_mut(&mut self, ptr: u32, len: u32) -> Result<&mut [u8]> {
        self.as_mut_slice().read_mut(ptr, len)
    }
}

/// Compute the byte length of `count` records of `size` bytes each.
pub(crate) fn array_len(count: u32, size: u32) -> Result<u32> {
    count.checked_mul(size).ok_or(Error::Fault)
}
