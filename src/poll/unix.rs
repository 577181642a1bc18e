use super::{Interest, PollTarget, timeout_millis};
use crate::Result;
use rustix::event::{PollFd, PollFlags, Timespec};
use std::time::{Duration, Instant};

pub(super) fn poll(
    targets: &mut [PollTarget<'_>],
    timeout_ms: i32,
    _pipe_poll_interval: Duration,
) -> Result<usize> {
    let mut pollfds: Vec<PollFd<'_>> = targets
        .iter()
        .map(|t| PollFd::from_borrowed_fd(t.handle, flags_from(t.interest)))
        .collect();

    // A negative value requests an infinite timeout.
    let deadline = u64::try_from(timeout_ms)
        .ok()
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let mut timeout = timespec(timeout_ms);
    let ready = loop {
        match rustix::event::poll(&mut pollfds, timeout.as_ref()) {
            Ok(ready) => break ready,
            Err(rustix::io::Errno::INTR) => timeout = timespec(remaining_millis(deadline)),
            Err(err) => return Err(err.into()),
        }
    };

    for (target, pollfd) in targets.iter_mut().zip(pollfds.iter()) {
        target.observed = interest_from(pollfd.revents());
    }
    Ok(ready)
}

fn timespec(timeout_ms: i32) -> Option<Timespec> {
    (timeout_ms >= 0).then(|| Timespec {
        tv_sec: (timeout_ms / 1000).into(),
        tv_nsec: ((timeout_ms % 1000) * 1_000_000).into(),
    })
}

/// Milliseconds left until `deadline`, for resuming an interrupted wait.
fn remaining_millis(deadline: Option<Instant>) -> i32 {
    timeout_millis(deadline.map(|d| d.saturating_duration_since(Instant::now())))
}

fn flags_from(interest: Interest) -> PollFlags {
    let mut flags = PollFlags::empty();
    if interest.contains(Interest::READABLE) {
        flags |= PollFlags::IN;
    }
    if interest.contains(Interest::WRITABLE) {
        flags |= PollFlags::OUT;
    }
    flags
}

fn interest_from(revents: PollFlags) -> Interest {
    let mut interest = Interest::empty();
    if revents.intersects(PollFlags::IN | PollFlags::PRI) {
        interest |= Interest::READABLE;
    }
    if revents.contains(PollFlags::OUT) {
        interest |= Interest::WRITABLE;
    }
    if revents.contains(PollFlags::HUP) {
        interest |= Interest::HANGUP;
    }
    if revents.contains(PollFlags::ERR) {
        interest |= Interest::ERROR;
    }
    if revents.contains(PollFlags::NVAL) {
        interest |= Interest::INVALID;
    }
    interest
}
