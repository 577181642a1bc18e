use super::emulate::{self, EmulatedFd, FileKind, Probe};
use super::{Interest, PollTarget};
use crate::Result;
use std::io;
use std::os::windows::io::{AsRawHandle, AsRawSocket, BorrowedHandle, BorrowedSocket};
use std::ptr;
use std::time::Duration;
use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::Networking::WinSock::{self, SOCKET_ERROR, WSAGetLastError, WSAPOLLFD, WSAPoll};
use windows_sys::Win32::Storage::FileSystem::{FILE_TYPE_PIPE, FILE_TYPE_UNKNOWN, GetFileType};
use windows_sys::Win32::System::Pipes::{GetNamedPipeInfo, PeekNamedPipe};

const _: () = {
    assert!(emulate::POLLRDNORM == WinSock::POLLRDNORM);
    assert!(emulate::POLLRDBAND == WinSock::POLLRDBAND);
    assert!(emulate::POLLWRNORM == WinSock::POLLWRNORM);
    assert!(emulate::POLLERR == WinSock::POLLERR);
    assert!(emulate::POLLHUP == WinSock::POLLHUP);
    assert!(emulate::POLLNVAL == WinSock::POLLNVAL);
};

/// A host handle that can be polled: a file or pipe handle, or a socket.
#[derive(Debug, Clone, Copy)]
pub enum HostHandle<'a> {
    Handle(BorrowedHandle<'a>),
    Socket(BorrowedSocket<'a>),
}

impl HostHandle<'_> {
    fn raw(&self) -> usize {
        match self {
            HostHandle::Handle(h) => h.as_raw_handle() as usize,
            HostHandle::Socket(s) => s.as_raw_socket() as usize,
        }
    }
}

impl<'a> From<BorrowedHandle<'a>> for HostHandle<'a> {
    fn from(h: BorrowedHandle<'a>) -> Self {
        HostHandle::Handle(h)
    }
}

impl<'a> From<BorrowedSocket<'a>> for HostHandle<'a> {
    fn from(s: BorrowedSocket<'a>) -> Self {
        HostHandle::Socket(s)
    }
}

pub(super) fn poll(
    targets: &mut [PollTarget<'_>],
    timeout_ms: i32,
    pipe_poll_interval: Duration,
) -> Result<usize> {
    let mut fds: Vec<EmulatedFd> = targets
        .iter()
        .map(|t| EmulatedFd::new(t.handle.raw(), events_from(t.interest)))
        .collect();
    let ready = emulate::poll(&HostProbe, &mut fds, timeout_ms, pipe_poll_interval)?;
    for (target, fd) in targets.iter_mut().zip(fds.iter()) {
        target.observed = interest_from(fd.revents);
    }
    Ok(ready)
}

fn events_from(interest: Interest) -> i16 {
    let mut events = 0;
    if interest.contains(Interest::READABLE) {
        events |= emulate::POLLIN;
    }
    if interest.contains(Interest::WRITABLE) {
        events |= emulate::POLLOUT;
    }
    events
}

fn interest_from(revents: i16) -> Interest {
    let mut interest = Interest::empty();
    if revents & emulate::POLLIN != 0 {
        interest |= Interest::READABLE;
    }
    if revents & emulate::POLLOUT != 0 {
        interest |= Interest::WRITABLE;
    }
    if revents & emulate::POLLHUP != 0 {
        interest |= Interest::HANGUP;
    }
    if revents & emulate::POLLERR != 0 {
        interest |= Interest::ERROR;
    }
    if revents & emulate::POLLNVAL != 0 {
        interest |= Interest::INVALID;
    }
    interest
}

struct HostProbe;

impl Probe for HostProbe {
    fn file_kind(&self, handle: usize) -> Result<FileKind> {
        let handle = handle as HANDLE;
        // SAFETY: `handle` comes from a `BorrowedHandle` that outlives the poll.
        let ty = unsafe { GetFileType(handle) };
        if ty == FILE_TYPE_UNKNOWN {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(0) {
                return Err(err.into());
            }
        }
        if ty != FILE_TYPE_PIPE {
            return Ok(FileKind::Regular);
        }
        // Sockets report as pipes too; only real pipes answer this query.
        // SAFETY: the handle is live and every out-pointer is optional.
        let ok = unsafe {
            GetNamedPipeInfo(
                handle,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if ok != 0 {
            Ok(FileKind::Pipe)
        } else {
            Ok(FileKind::Socket)
        }
    }

    fn pipe_bytes(&self, handle: usize) -> Result<u64> {
        let mut avail = 0u32;
        // SAFETY: no buffer is passed, so only `avail` is written, and it
        // lives on this stack frame.
        let ok = unsafe {
            PeekNamedPipe(
                handle as HANDLE,
                ptr::null_mut(),
                0,
                ptr::null_mut(),
                &mut avail,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(avail.into())
    }

    fn poll_sockets(&self, fds: &mut [EmulatedFd], timeout_ms: i32) -> Result<usize> {
        if fds.is_empty() {
            return Ok(0);
        }
        let mut pollfds: Vec<WSAPOLLFD> = fds
            .iter()
            .map(|fd| WSAPOLLFD {
                fd: fd.handle,
                events: fd.events,
                revents: 0,
            })
            .collect();
        let len = u32::try_from(pollfds.len())?;
        // SAFETY: `pollfds` holds exactly `len` initialized entries for the
        // whole call.
        let ready = unsafe { WSAPoll(pollfds.as_mut_ptr(), len, timeout_ms) };
        if ready == SOCKET_ERROR {
            // SAFETY: reads thread-local error state only.
            let code = unsafe { WSAGetLastError() };
            return Err(io::Error::from_raw_os_error(code).into());
        }
        for (fd, pollfd) in fds.iter_mut().zip(pollfds.iter()) {
            fd.revents = pollfd.revents;
        }
        Ok(usize::try_from(ready)?)
    }
}
