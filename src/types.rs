//! Guest-visible WASI preview 1 types used by `poll_oneoff`.
//!
//! Everything here mirrors the `wasi_snapshot_preview1` witx definitions:
//! the values are part of the guest ABI and must not change.

use bitflags::bitflags;

/// Size in bytes of a guest `subscription` record.
pub const SUBSCRIPTION_SIZE: u32 = 48;
/// Size in bytes of a guest `event` record.
pub const EVENT_SIZE: u32 = 32;

/// Guest file descriptor of standard input.
pub const FD_STDIN: u32 = 0;
/// Guest file descriptor of standard output.
pub const FD_STDOUT: u32 = 1;
/// Guest file descriptor of standard error.
pub const FD_STDERR: u32 = 2;

/// Error codes returned by WASI functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Errno {
    Success = 0,
    TooBig = 1,
    Acces = 2,
    Again = 6,
    Badf = 8,
    Connreset = 15,
    Fault = 21,
    Intr = 27,
    Inval = 28,
    Io = 29,
    Mfile = 33,
    Nomem = 48,
    Nosys = 52,
    Notsock = 57,
    Notsup = 58,
    Overflow = 61,
    Perm = 63,
    Pipe = 64,
}

impl From<Errno> for u16 {
    fn from(e: Errno) -> u16 {
        e as u16
    }
}

impl TryFrom<u16> for Errno {
    type Error = u16;

    fn try_from(code: u16) -> std::result::Result<Errno, u16> {
        Ok(match code {
            0 => Errno::Success,
            1 => Errno::TooBig,
            2 => Errno::Acces,
            6 => Errno::Again,
            8 => Errno::Badf,
            15 => Errno::Connreset,
            21 => Errno::Fault,
            27 => Errno::Intr,
            28 => Errno::Inval,
            29 => Errno::Io,
            33 => Errno::Mfile,
            48 => Errno::Nomem,
            52 => Errno::Nosys,
            57 => Errno::Notsock,
            58 => Errno::Notsup,
            61 => Errno::Overflow,
            63 => Errno::Perm,
            64 => Errno::Pipe,
            other => return Err(other),
        })
    }
}

/// Type of a subscription to an event or its occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Eventtype {
    Clock = 0,
    FdRead = 1,
    FdWrite = 2,
}

impl TryFrom<u8> for Eventtype {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        match tag {
            0 => Ok(Eventtype::Clock),
            1 => Ok(Eventtype::FdRead),
            2 => Ok(Eventtype::FdWrite),
            other => Err(other),
        }
    }
}

bitflags! {
    /// Flags determining how to interpret the timestamp of a clock subscription.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Subclockflags: u16 {
        const SUBSCRIPTION_CLOCK_ABSTIME = 0b1;
    }
}

bitflags! {
    /// The state of the file descriptor subscribed to with `FdRead` or `FdWrite`.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Eventrwflags: u16 {
        const FD_READWRITE_HANGUP = 0b1;
    }
}

/// User-provided value that may be attached to objects that is retained when
/// extracted from the implementation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Userdata(u64);

impl From<u64> for Userdata {
    fn from(u: u64) -> Userdata {
        Userdata(u)
    }
}

impl From<Userdata> for u64 {
    fn from(u: Userdata) -> u64 {
        u.0
    }
}
