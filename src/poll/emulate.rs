//! `poll` emulation for hosts whose native primitive only understands
//! sockets.
//!
//! Targets are sorted into three kinds. Regular files (and character devices)
//! are always ready. Pipes are probed for buffered bytes, since `WSAPoll`
//! rejects them. Sockets are delegated to the host socket poll. When pipes are
//! involved and nothing is ready yet, pipes and sockets are re-probed on a
//! fixed tick until something becomes ready or the deadline passes.
//!
//! The host is reached only through [`Probe`], which keeps the algorithm
//! itself platform-neutral.

use crate::{Error, Result};
use std::thread;
use std::time::{Duration, Instant};

// Winsock `pollfd` event bits.
pub(crate) const POLLRDNORM: i16 = 0x0100;
pub(crate) const POLLRDBAND: i16 = 0x0200;
pub(crate) const POLLIN: i16 = POLLRDNORM | POLLRDBAND;
pub(crate) const POLLWRNORM: i16 = 0x0010;
pub(crate) const POLLOUT: i16 = POLLWRNORM;
pub(crate) const POLLERR: i16 = 0x0001;
pub(crate) const POLLHUP: i16 = 0x0002;
pub(crate) const POLLNVAL: i16 = 0x0004;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileKind {
    Regular,
    Pipe,
    Socket,
}

/// A single `pollfd`-style entry in the emulated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EmulatedFd {
    pub handle: usize,
    pub events: i16,
    pub revents: i16,
}

impl EmulatedFd {
    pub fn new(handle: usize, events: i16) -> EmulatedFd {
        EmulatedFd {
            handle,
            events,
            revents: 0,
        }
    }
}

/// Host operations the emulation is built from.
pub(crate) trait Probe {
    fn file_kind(&self, handle: usize) -> Result<FileKind>;

    /// Number of bytes buffered in a pipe without consuming them.
    fn pipe_bytes(&self, handle: usize) -> Result<u64>;

    /// Native socket poll. Fills in `revents` and returns the ready count.
    fn poll_sockets(&self, fds: &mut [EmulatedFd], timeout_ms: i32) -> Result<usize>;
}

/// Poll `fds` through `probe`, re-checking pipes every `tick`.
///
/// On return `fds` holds the merged `revents` in the caller's order.
pub(crate) fn poll<P: Probe + ?Sized>(
    probe: &P,
    fds: &mut [EmulatedFd],
    timeout_ms: i32,
    tick: Duration,
) -> Result<usize> {
    if fds.is_empty() {
        // Nothing could ever wake an infinite wait on nothing.
        let Ok(ms) = u64::try_from(timeout_ms) else {
            return Err(Error::Notsup);
        };
        thread::sleep(Duration::from_millis(ms));
        return Ok(0);
    }

    let mut set = HandleSet::classify(probe, fds)?;

    let ready = set.probe_all(probe, fds)?;
    if ready > 0 {
        return Ok(ready);
    }

    if set.pipes.is_empty() {
        return set.poll_sockets(probe, fds, timeout_ms);
    }

    let tick = tick.max(Duration::from_millis(1));
    let start = Instant::now();
    let deadline = u64::try_from(timeout_ms)
        .ok()
        .map(|ms| start + Duration::from_millis(ms));
    let mut next_tick = start + tick;
    loop {
        if let Some(deadline) = deadline {
            if deadline <= next_tick {
                sleep_until(deadline);
                tracing::trace!("emulated poll timed out");
                return Ok(0);
            }
        }
        sleep_until(next_tick);
        let ready = set.probe_all(probe, fds)?;
        if ready > 0 {
            return Ok(ready);
        }
        next_tick += tick;
    }
}

fn sleep_until(when: Instant) {
    let now = Instant::now();
    if when > now {
        thread::sleep(when - now);
    }
}

/// Indices into the caller's list, split by kind. Sockets are also kept as a
/// contiguous scratch list for the host socket poll.
struct HandleSet {
    regular: Vec<usize>,
    pipes: Vec<usize>,
    sockets: Vec<usize>,
    socket_fds: Vec<EmulatedFd>,
}

impl HandleSet {
    fn classify<P: Probe + ?Sized>(probe: &P, fds: &[EmulatedFd]) -> Result<HandleSet> {
        let mut set = HandleSet {
            regular: Vec::new(),
            pipes: Vec::new(),
            sockets: Vec::new(),
            socket_fds: Vec::new(),
        };
        for (i, fd) in fds.iter().enumerate() {
            match probe.file_kind(fd.handle)? {
                FileKind::Regular => set.regular.push(i),
                FileKind::Pipe => set.pipes.push(i),
                FileKind::Socket => {
                    set.sockets.push(i);
                    set.socket_fds.push(EmulatedFd::new(fd.handle, fd.events));
                }
            }
        }
        tracing::trace!(
            regular = set.regular.len(),
            pipes = set.pipes.len(),
            sockets = set.sockets.len(),
            "classified handles"
        );
        Ok(set)
    }

    /// One non-blocking pass over every handle.
    fn probe_all<P: Probe + ?Sized>(
        &mut self,
        probe: &P,
        fds: &mut [EmulatedFd],
    ) -> Result<usize> {
        for &i in &self.regular {
            fds[i].revents = fds[i].events & (POLLIN | POLLOUT);
        }
        for &i in &self.pipes {
            let fd = &mut fds[i];
            fd.revents = 0;
            if fd.events & POLLIN != 0 && probe.pipe_bytes(fd.handle)? > 0 {
                fd.revents |= POLLRDNORM;
            }
            // Pipe writes are never observed to block.
            fd.revents |= fd.events & POLLOUT;
        }
        self.poll_sockets(probe, fds, 0)
    }

    fn poll_sockets<P: Probe + ?Sized>(
        &mut self,
        probe: &P,
        fds: &mut [EmulatedFd],
        timeout_ms: i32,
    ) -> Result<usize> {
        if !self.socket_fds.is_empty() {
            for fd in self.socket_fds.iter_mut() {
                fd.revents = 0;
            }
            probe.poll_sockets(&mut self.socket_fds, timeout_ms)?;
            for (&i, socket) in self.sockets.iter().zip(self.socket_fds.iter()) {
                fds[i].revents = socket.revents;
            }
        }
        Ok(merge(fds))
    }
}

/// Normalize readability and count ready entries.
///
/// Any readable bit means the whole of `POLLIN`, so callers can test for
/// readability with a single mask.
fn merge(fds: &mut [EmulatedFd]) -> usize {
    let mut ready = 0;
    for fd in fds.iter_mut() {
        if fd.revents & POLLIN != 0 {
            fd.revents |= POLLIN;
        }
        if fd.revents != 0 {
            ready += 1;
        }
    }
    ready
}
