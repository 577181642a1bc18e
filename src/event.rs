//! Guest `event` records and the gapless encoder that writes them.

use crate::types::{EVENT_SIZE, Errno, Eventrwflags, Eventtype, Userdata};
use crate::{Error, Result};

const ERROR_OFFSET: usize = 8;
const TYPE_OFFSET: usize = 10;
const NBYTES_OFFSET: usize = 16;
const FLAGS_OFFSET: usize = 24;

/// An event that occurred, ready to be handed back to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub userdata: Userdata,
    pub error: Errno,
    pub type_: Eventtype,
    pub fd_readwrite: EventFdReadwrite,
}

/// The contents of an `FdRead` or `FdWrite` event. Zero for clock events.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventFdReadwrite {
    pub nbytes: u64,
    pub flags: Eventrwflags,
}

impl Event {
    pub fn new(userdata: Userdata, type_: Eventtype) -> Event {
        Event {
            userdata,
            error: Errno::Success,
            type_,
            fd_readwrite: EventFdReadwrite::default(),
        }
    }

    pub fn with_error(mut self, error: Errno) -> Event {
        self.error = error;
        self
    }

    pub fn with_flags(mut self, flags: Eventrwflags) -> Event {
        self.fd_readwrite.flags = flags;
        self
    }

    /// Encode into the first `EVENT_SIZE` bytes of `out`; reserved bytes are
    /// left untouched, so `out` is expected to be zeroed.
    fn encode(&self, out: &mut [u8]) {
        out[..8].copy_from_slice(&u64::from(self.userdata).to_le_bytes());
        out[ERROR_OFFSET..ERROR_OFFSET + 2].copy_from_slice(&u16::from(self.error).to_le_bytes());
        out[TYPE_OFFSET] = self.type_ as u8;
        out[NBYTES_OFFSET..NBYTES_OFFSET + 8]
            .copy_from_slice(&self.fd_readwrite.nbytes.to_le_bytes());
        out[FLAGS_OFFSET..FLAGS_OFFSET + 2]
            .copy_from_slice(&self.fd_readwrite.flags.bits().to_le_bytes());
    }

    /// Decode an event record as written by [`EventWriter`].
    pub fn decode(bytes: &[u8]) -> Result<Event> {
        let bytes = bytes.get(..EVENT_SIZE as usize).ok_or(Error::Fault)?;
        let mut userdata = [0u8; 8];
        userdata.copy_from_slice(&bytes[..8]);
        let mut nbytes = [0u8; 8];
        nbytes.copy_from_slice(&bytes[NBYTES_OFFSET..NBYTES_OFFSET + 8]);
        let error = u16::from_le_bytes([bytes[ERROR_OFFSET], bytes[ERROR_OFFSET + 1]]);
        let flags = u16::from_le_bytes([bytes[FLAGS_OFFSET], bytes[FLAGS_OFFSET + 1]]);
        Ok(Event {
            userdata: u64::from_le_bytes(userdata).into(),
            error: Errno::try_from(error).map_err(|_| Error::Inval)?,
            type_: Eventtype::try_from(bytes[TYPE_OFFSET]).map_err(|_| Error::Inval)?,
            fd_readwrite: EventFdReadwrite {
                nbytes: u64::from_le_bytes(nbytes),
                flags: Eventrwflags::from_bits_retain(flags),
            },
        })
    }
}

/// Writes events into the guest's output array at consecutive slots.
///
/// Slot `i` always holds the `i`-th emitted event: subscriptions that produce
/// no event never leave a hole.
pub struct EventWriter<'a> {
    buf: &'a mut [u8],
    count: u32,
}

impl<'a> EventWriter<'a> {
    /// Take over `buf` and zero it, so stale bytes can never be mistaken for
    /// an event.
    pub fn new(buf: &'a mut [u8]) -> EventWriter<'a> {
        buf.fill(0);
        EventWriter { buf, count: 0 }
    }

    pub fn push(&mut self, event: &Event) -> Result<()> {
        let start = self.count as usize * EVENT_SIZE as usize;
        let slot = self
            .buf
            .get_mut(start..start + EVENT_SIZE as usize)
            .ok_or(Error::Overflow)?;
        event.encode(slot);
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Forget everything written so far.
    pub fn clear(&mut self) {
        let written = self.count as usize * EVENT_SIZE as usize;
        self.buf[..written].fill(0);
        self.count = 0;
    }
}
