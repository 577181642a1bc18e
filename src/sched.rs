use crate::Result;
use crate::poll::{PollTarget, Poller};
use std::thread;
use std::time::Duration;

pub mod subscription;

/// The host primitives `poll_oneoff` blocks on.
pub trait WasiSched: Send + Sync {
    /// Wait for readiness on `targets`, see [`Poller::poll`].
    fn poll(&self, targets: &mut [PollTarget<'_>], timeout_ms: i32) -> Result<usize>;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration) -> Result<()>;
}

/// Blocks the calling thread in the host's poll primitive.
#[derive(Debug, Default)]
pub struct SyncSched {
    poller: Poller,
}

impl SyncSched {
    pub fn new() -> Self {
        SyncSched::default()
    }

    pub fn with_poller(poller: Poller) -> Self {
        SyncSched { poller }
    }
}

impl WasiSched for SyncSched {
    fn poll(&self, targets: &mut [PollTarget<'_>], timeout_ms: i32) -> Result<usize> {
        self.poller.poll(targets, timeout_ms)
    }

    fn sleep(&self, duration: Duration) -> Result<()> {
        thread::sleep(duration);
        Ok(())
    }
}
