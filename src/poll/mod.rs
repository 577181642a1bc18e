//! Platform-uniform readiness polling.
//!
//! Callers hand a [`Poller`] a list of [`PollTarget`]s, each a borrowed host
//! handle plus the symbolic [`Interest`] to wait for, and get back the number
//! of ready targets with every target's observed interest filled in. Unix
//! maps this directly onto `poll(2)`; Windows has no single primitive that
//! covers regular files, pipes and sockets, so it is emulated, see
//! [`emulate`].

use crate::{Error, Result};
use bitflags::bitflags;
use std::time::Duration;

#[cfg_attr(
    not(windows),
    allow(dead_code, reason = "driven only by the Windows backend outside of tests")
)]
pub(crate) mod emulate;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as sys;

        /// A host handle that can be polled.
        pub type HostHandle<'a> = rustix::fd::BorrowedFd<'a>;
    } else if #[cfg(windows)] {
        mod windows;
        use windows as sys;

        pub use windows::HostHandle;
    } else {
        compile_error!("wasi-poll supports only unix and windows hosts");
    }
}

bitflags! {
    /// Readiness conditions, both requested and observed.
    ///
    /// Only `READABLE` and `WRITABLE` can be requested. The remaining bits are
    /// reported by the host alongside them.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Interest: u8 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const HANGUP = 1 << 2;
        const ERROR = 1 << 3;
        const INVALID = 1 << 4;
    }
}

/// One handle to wait on. Lives only for the duration of a poll call.
#[derive(Debug)]
pub struct PollTarget<'a> {
    handle: HostHandle<'a>,
    interest: Interest,
    observed: Interest,
}

impl<'a> PollTarget<'a> {
    pub fn new(handle: HostHandle<'a>, interest: Interest) -> PollTarget<'a> {
        PollTarget {
            handle,
            interest,
            observed: Interest::empty(),
        }
    }

    pub fn handle(&self) -> HostHandle<'a> {
        self.handle
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// What the host reported for this handle after the last poll; empty if
    /// it was not ready.
    pub fn observed(&self) -> Interest {
        self.observed
    }

    /// Record what the host reported for this handle. Schedulers outside
    /// this crate use it to mark the targets they found ready.
    pub fn set_observed(&mut self, observed: Interest) {
        self.observed = observed;
    }
}

/// How often the Windows emulation re-checks pipes while waiting.
pub const DEFAULT_PIPE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct Poller {
    pipe_poll_interval: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Poller::new()
    }
}

impl Poller {
    pub fn new() -> Self {
        Poller {
            pipe_poll_interval: DEFAULT_PIPE_POLL_INTERVAL,
        }
    }

    /// Set the tick of the pipe re-check loop. Unused on Unix.
    pub fn with_pipe_poll_interval(mut self, interval: Duration) -> Self {
        self.pipe_poll_interval = interval;
        self
    }

    /// Wait until at least one target is ready or `timeout_ms` elapses.
    ///
    /// A negative timeout blocks indefinitely. Returns the number of ready
    /// targets; zero means the timeout expired.
    pub fn poll(&self, targets: &mut [PollTarget<'_>], timeout_ms: i32) -> Result<usize> {
        for target in targets.iter_mut() {
            target.observed = Interest::empty();
        }
        tracing::debug!(
            poll_timeout = timeout_ms,
            poll_fds = tracing::field::debug(&targets),
            "poll"
        );
        let ready = sys::poll(targets, timeout_ms, self.pipe_poll_interval)?;
        tracing::trace!(ready, "poll returned");
        Ok(ready)
    }

    /// Block until at least one target is readable, without a timeout.
    ///
    /// Every target must request exactly [`Interest::READABLE`], otherwise
    /// the call fails with `Inval`.
    pub fn poll_readable(&self, targets: &mut [PollTarget<'_>]) -> Result<usize> {
        wait_readable(targets, |targets| self.poll(targets, -1))
    }
}

/// Drive `poll` with an infinite timeout until something is readable. A
/// wakeup with nothing ready polls again.
pub(crate) fn wait_readable<'a>(
    targets: &mut [PollTarget<'a>],
    mut poll: impl FnMut(&mut [PollTarget<'a>]) -> Result<usize>,
) -> Result<usize> {
    if targets.is_empty() || targets.iter().any(|t| t.interest != Interest::READABLE) {
        return Err(Error::Inval);
    }
    loop {
        let ready = poll(&mut *targets)?;
        if ready > 0 {
            return Ok(ready);
        }
        tracing::trace!("woke with nothing readable, polling again");
    }
}

/// Convert an optional deadline into a `poll`-style millisecond timeout.
///
/// Rounds up so a wait never ends before the deadline, and saturates at
/// `i32::MAX`. `None` is an infinite wait.
pub fn timeout_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        Some(d) => d
            .as_nanos()
            .div_ceil(1_000_000)
            .try_into()
            .unwrap_or(i32::MAX),
        None => -1,
    }
}
