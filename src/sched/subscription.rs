//! Guest `subscription` records.
//!
//! The guest passes an array of 48-byte records. Each is decoded into a
//! [`Subscription`] whose payload is a tagged variant over the event type, so
//! the rest of the crate matches exhaustively instead of poking at offsets.

use crate::types::{Eventtype, SUBSCRIPTION_SIZE, Subclockflags, Userdata};
use crate::{Error, Result};

const USERDATA_OFFSET: usize = 0;
const TAG_OFFSET: usize = 8;
const CONTENTS_OFFSET: usize = 16;

// Offsets of `subscription_clock` fields relative to the contents.
const CLOCK_ID_OFFSET: usize = CONTENTS_OFFSET;
const CLOCK_TIMEOUT_OFFSET: usize = CONTENTS_OFFSET + 8;
const CLOCK_PRECISION_OFFSET: usize = CONTENTS_OFFSET + 16;
const CLOCK_FLAGS_OFFSET: usize = CONTENTS_OFFSET + 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub userdata: Userdata,
    pub u: SubscriptionU,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionU {
    Clock(SubscriptionClock),
    FdRead(SubscriptionFdReadwrite),
    FdWrite(SubscriptionFdReadwrite),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionClock {
    pub id: u32,
    /// Nanoseconds, relative unless `SUBSCRIPTION_CLOCK_ABSTIME` is set.
    pub timeout: u64,
    pub precision: u64,
    pub flags: Subclockflags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionFdReadwrite {
    /// Guest handle. Signed so a malformed (negative) handle stays visible.
    pub file_descriptor: i32,
}

impl Subscription {
    /// Decode one record. `bytes` must hold at least `SUBSCRIPTION_SIZE`
    /// bytes.
    ///
    /// An unknown event type or undefined clock flag bits are `Inval`.
    pub fn decode(bytes: &[u8]) -> Result<Subscription> {
        let bytes = bytes
            .get(..SUBSCRIPTION_SIZE as usize)
            .ok_or(Error::Fault)?;
        let userdata = Userdata::from(u64_at(bytes, USERDATA_OFFSET));
        let u = match Eventtype::try_from(bytes[TAG_OFFSET]).map_err(|_| Error::Inval)? {
            Eventtype::Clock => {
                let flags = Subclockflags::from_bits(u16_at(bytes, CLOCK_FLAGS_OFFSET))
                    .ok_or(Error::Inval)?;
                SubscriptionU::Clock(SubscriptionClock {
                    id: u32_at(bytes, CLOCK_ID_OFFSET),
                    timeout: u64_at(bytes, CLOCK_TIMEOUT_OFFSET),
                    precision: u64_at(bytes, CLOCK_PRECISION_OFFSET),
                    flags,
                })
            }
            Eventtype::FdRead => SubscriptionU::FdRead(SubscriptionFdReadwrite {
                file_descriptor: u32_at(bytes, CONTENTS_OFFSET) as i32,
            }),
            Eventtype::FdWrite => SubscriptionU::FdWrite(SubscriptionFdReadwrite {
                file_descriptor: u32_at(bytes, CONTENTS_OFFSET) as i32,
            }),
        };
        Ok(Subscription { userdata, u })
    }

    /// Encode this subscription in the guest layout.
    pub fn to_bytes(&self) -> [u8; SUBSCRIPTION_SIZE as usize] {
        let mut out = [0u8; SUBSCRIPTION_SIZE as usize];
        out[..8].copy_from_slice(&u64::from(self.userdata).to_le_bytes());
        out[TAG_OFFSET] = self.eventtype() as u8;
        match self.u {
            SubscriptionU::Clock(c) => {
                put(&mut out, CLOCK_ID_OFFSET, &c.id.to_le_bytes());
                put(&mut out, CLOCK_TIMEOUT_OFFSET, &c.timeout.to_le_bytes());
                put(&mut out, CLOCK_PRECISION_OFFSET, &c.precision.to_le_bytes());
                put(&mut out, CLOCK_FLAGS_OFFSET, &c.flags.bits().to_le_bytes());
            }
            SubscriptionU::FdRead(rw) | SubscriptionU::FdWrite(rw) => {
                put(&mut out, CONTENTS_OFFSET, &rw.file_descriptor.to_le_bytes());
            }
        }
        out
    }

    pub fn eventtype(&self) -> Eventtype {
        match self.u {
            SubscriptionU::Clock(_) => Eventtype::Clock,
            SubscriptionU::FdRead(_) => Eventtype::FdRead,
            SubscriptionU::FdWrite(_) => Eventtype::FdWrite,
        }
    }
}

fn put(out: &mut [u8], offset: usize, bytes: &[u8]) {
    out[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(b)
}

fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(b)
}
