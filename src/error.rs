use crate::types::Errno;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Internal error type for the `wasi-poll` crate.
///
/// The unit variants are the WASI `$errno` values `poll_oneoff` raises on its
/// own; host failures are carried in `Io` and translated into the same
/// taxonomy by [`Error::errno`].
#[derive(Debug, Error)]
pub enum Error {
    /// Errno::Badf: Bad file descriptor
    #[error("Badf: Bad file descriptor")]
    Badf,
    /// Errno::Fault: Bad address
    #[error("Fault: Bad address")]
    Fault,
    /// Errno::Inval: Invalid argument
    #[error("Inval: Invalid argument")]
    Inval,
    /// Errno::Notsock: Not a socket.
    #[error("Notsock: Not a socket")]
    Notsock,
    /// Errno::Notsup: Not supported, or operation not supported on socket.
    #[error("Notsup: Not supported, or operation not supported on socket")]
    Notsup,
    /// Errno::Overflow: Value too large to be stored in data type.
    #[error("Overflow: Value too large to be stored in data type")]
    Overflow,
    /// A failure reported by the host OS.
    #[error("Io: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// The guest-visible error code for this error.
    pub fn errno(&self) -> Errno {
        match self {
            Error::Badf => Errno::Badf,
            Error::Fault => Errno::Fault,
            Error::Inval => Errno::Inval,
            Error::Notsock => Errno::Notsock,
            Error::Notsup => Errno::Notsup,
            Error::Overflow => Errno::Overflow,
            Error::Io(e) => errno_from_io(e),
        }
    }
}

#[cfg(unix)]
impl From<rustix::io::Errno> for Error {
    fn from(e: rustix::io::Errno) -> Error {
        Error::Io(e.into())
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(_: std::num::TryFromIntError) -> Error {
        Error::Overflow
    }
}

fn errno_from_io(e: &io::Error) -> Errno {
    #[cfg(unix)]
    if let Some(code) = e.raw_os_error() {
        use rustix::io::Errno as E;
        match E::from_raw_os_error(code) {
            E::BADF => return Errno::Badf,
            E::FAULT => return Errno::Fault,
            E::INVAL => return Errno::Inval,
            E::MFILE => return Errno::Mfile,
            E::NOSYS => return Errno::Nosys,
            E::NOTSOCK => return Errno::Notsock,
            E::NOTSUP => return Errno::Notsup,
            E::OVERFLOW => return Errno::Overflow,
            E::PERM => return Errno::Perm,
            E::TOOBIG => return Errno::TooBig,
            _ => {}
        }
    }

    match e.kind() {
        io::ErrorKind::PermissionDenied => Errno::Acces,
        io::ErrorKind::WouldBlock => Errno::Again,
        io::ErrorKind::Interrupted => Errno::Intr,
        io::ErrorKind::InvalidInput => Errno::Inval,
        io::ErrorKind::Unsupported => Errno::Notsup,
        io::ErrorKind::BrokenPipe => Errno::Pipe,
        io::ErrorKind::ConnectionReset => Errno::Connreset,
        io::ErrorKind::OutOfMemory => Errno::Nomem,
        _ => Errno::Io,
    }
}
