use crate::WasiCtx;
use crate::event::{Event, EventWriter};
use crate::file::{FileEntry, TableFileExt};
use crate::memory::{GuestMemory, array_len};
use crate::poll::{Interest, PollTarget, timeout_millis};
use crate::sched::subscription::{Subscription, SubscriptionU};
use crate::types::{
    EVENT_SIZE, Errno, Eventrwflags, FD_STDERR, FD_STDIN, FD_STDOUT, SUBSCRIPTION_SIZE,
    Subclockflags,
};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

impl WasiCtx {
    /// Concurrently poll for the occurrence of a set of events.
    ///
    /// Reads `nsubscriptions` subscription records from guest memory at
    /// `in_`, blocks until at least one of them is ready (or the earliest
    /// clock subscription expires) and writes the resulting events to `out`.
    /// The number of events is stored at `result_nevents` and also returned.
    ///
    /// Per-subscription failures, such as an unknown file descriptor, are
    /// reported as events carrying an error code. Anything else fails the
    /// whole call, in which case `result_nevents` is left at zero.
    #[tracing::instrument(skip(self, mem))]
    pub fn poll_oneoff<M: GuestMemory + ?Sized>(
        &self,
        mem: &mut M,
        in_: u32,
        out: u32,
        nsubscriptions: u32,
        result_nevents: u32,
    ) -> Result<u32> {
        if nsubscriptions == 0 {
            return Err(Error::Inval);
        }
        let subs = mem
            .read(in_, array_len(nsubscriptions, SUBSCRIPTION_SIZE)?)?
            .to_vec();
        let out_len = array_len(nsubscriptions, EVENT_SIZE)?;
        // Make sure the whole output array is addressable before any blocking.
        mem.read_mut(out, out_len)?;
        mem.write_u32(result_nevents, 0)?;

        let mut events = EventWriter::new(mem.read_mut(out, out_len)?);
        if let Err(e) = self.poll_subscriptions(&subs, &mut events) {
            events.clear();
            return Err(e);
        }
        let nevents = events.count();
        mem.write_u32(result_nevents, nevents)?;
        tracing::debug!(nevents, "poll_oneoff done");
        Ok(nevents)
    }

    fn poll_subscriptions(&self, subs: &[u8], events: &mut EventWriter<'_>) -> Result<()> {
        // The earliest clock, with its timeout in nanoseconds. Ties keep the
        // first subscription.
        let mut clock: Option<(Event, u64)> = None;
        let mut stdin_reads: Vec<Event> = Vec::new();
        let mut entries: Vec<Arc<FileEntry>> = Vec::new();
        let mut pending: Vec<(Event, Interest)> = Vec::new();

        for raw in subs.chunks_exact(SUBSCRIPTION_SIZE as usize) {
            let sub = Subscription::decode(raw)?;
            let event = Event::new(sub.userdata, sub.eventtype());
            let (fd, interest) = match sub.u {
                SubscriptionU::Clock(c) => {
                    if c.flags.contains(Subclockflags::SUBSCRIPTION_CLOCK_ABSTIME) {
                        return Err(Error::Notsup);
                    }
                    if clock.is_none_or(|(_, timeout)| c.timeout < timeout) {
                        clock = Some((event, c.timeout));
                    }
                    continue;
                }
                SubscriptionU::FdRead(rw) => (rw.file_descriptor, Interest::READABLE),
                SubscriptionU::FdWrite(rw) => (rw.file_descriptor, Interest::WRITABLE),
            };
            let key = u32::try_from(fd).map_err(|_| Error::Badf)?;
            let Ok(entry) = self.table().get_file(key) else {
                tracing::trace!(fd, "unknown file descriptor");
                events.push(&event.with_error(Errno::Badf))?;
                continue;
            };
            let file = entry.file();
            if key == FD_STDIN && interest == Interest::READABLE {
                if file.is_nonblocking() {
                    events.push(&event)?;
                } else {
                    stdin_reads.push(event);
                }
            } else if (key == FD_STDOUT || key == FD_STDERR) && interest == Interest::WRITABLE {
                events.push(&event)?;
            } else if file.pollable().is_none() {
                tracing::trace!(fd, "file descriptor cannot be polled");
                events.push(&event.with_error(Errno::Notsup))?;
            } else {
                entries.push(entry);
                pending.push((event, interest));
            }
        }

        // Anything already ready must not wait behind a clock.
        let immediate = events.count() > 0;
        let timeout_ms = if immediate {
            0
        } else {
            timeout_millis(clock.map(|(_, ns)| Duration::from_nanos(ns)))
        };
        let clock_event = clock
            .filter(|(_, ns)| !immediate || *ns == 0)
            .map(|(event, _)| event);

        if entries.is_empty() {
            if let Some((_, ns)) = clock {
                if !immediate && ns > 0 {
                    self.sched().sleep(Duration::from_nanos(ns))?;
                }
            }
            if let Some(event) = clock_event {
                events.push(&event)?;
            }
        } else {
            let mut targets = Vec::with_capacity(entries.len());
            for (entry, (_, interest)) in entries.iter().zip(&pending) {
                let handle = entry.file().pollable().ok_or(Error::Notsup)?;
                targets.push(PollTarget::new(handle, *interest));
            }
            let ready = self.sched().poll(&mut targets, timeout_ms)?;
            if ready == 0 {
                if let Some(event) = clock_event {
                    events.push(&event)?;
                }
            } else {
                for (target, (event, _)) in targets.iter().zip(&pending) {
                    let observed = target.observed();
                    if observed.is_empty() {
                        continue;
                    }
                    let mut event = *event;
                    if observed.contains(Interest::HANGUP) {
                        event = event.with_flags(Eventrwflags::FD_READWRITE_HANGUP);
                    }
                    events.push(&event)?;
                }
            }
        }

        // Blocking stdin gets its own wait, with the same timeout again.
        if !stdin_reads.is_empty() && self.stdin_ready(timeout_ms)? {
            for event in &stdin_reads {
                events.push(event)?;
            }
        }
        Ok(())
    }

    fn stdin_ready(&self, timeout_ms: i32) -> Result<bool> {
        let stdin = self.table().get_file(FD_STDIN)?;
        match stdin.file().pollable() {
            Some(handle) => {
                let mut target = [PollTarget::new(handle, Interest::READABLE)];
                Ok(self.sched().poll(&mut target, timeout_ms)? > 0)
            }
            // In-memory stdin never blocks: it has data or is at EOF.
            None => Ok(true),
        }
    }
}

/// [`WasiCtx::poll_oneoff`] for host-function glue that hands the result
/// straight back to the guest as an errno.
pub fn poll_oneoff_errno<M: GuestMemory + ?Sized>(
    ctx: &WasiCtx,
    mem: &mut M,
    in_: u32,
    out: u32,
    nsubscriptions: u32,
    result_nevents: u32,
) -> Errno {
    match ctx.poll_oneoff(mem, in_, out, nsubscriptions, result_nevents) {
        Ok(_) => Errno::Success,
        Err(e) => {
            tracing::debug!(error = %e, "poll_oneoff failed");
            e.errno()
        }
    }
}
