mod poll_oneoff;
mod sched;

use std::time::Duration;
use wasi_poll::event::Event;
use wasi_poll::sched::subscription::{
    Subscription, SubscriptionClock, SubscriptionFdReadwrite, SubscriptionU,
};
use wasi_poll::types::{EVENT_SIZE, SUBSCRIPTION_SIZE, Subclockflags};
use wasi_poll::{Error, WasiCtx};

/// Guest memory layout used by every test: subscriptions at `IN`, events at
/// `OUT` and the event count at `NEVENTS`.
pub(crate) const IN: u32 = 0;
pub(crate) const OUT: u32 = 1024;
pub(crate) const NEVENTS: u32 = 3000;
pub(crate) const MEMORY_SIZE: usize = 4096;

pub(crate) fn guest_memory(subs: &[Subscription]) -> Vec<u8> {
    let mut mem = vec![0u8; MEMORY_SIZE];
    for (i, sub) in subs.iter().enumerate() {
        let start = IN as usize + i * SUBSCRIPTION_SIZE as usize;
        mem[start..start + SUBSCRIPTION_SIZE as usize].copy_from_slice(&sub.to_bytes());
    }
    mem
}

pub(crate) fn nevents(mem: &[u8]) -> u32 {
    let at = NEVENTS as usize;
    u32::from_le_bytes([mem[at], mem[at + 1], mem[at + 2], mem[at + 3]])
}

/// Run `poll_oneoff` over `subs` and decode the events it wrote.
pub(crate) fn poll(ctx: &WasiCtx, subs: &[Subscription]) -> Result<Vec<Event>, Error> {
    let mut mem = guest_memory(subs);
    let nsubs = u32::try_from(subs.len()).unwrap();
    let n = ctx.poll_oneoff(&mut mem, IN, OUT, nsubs, NEVENTS)?;
    assert_eq!(nevents(&mem), n);
    assert!(n <= nsubs);
    let events = (0..n as usize)
        .map(|i| {
            let start = OUT as usize + i * EVENT_SIZE as usize;
            Event::decode(&mem[start..]).unwrap()
        })
        .collect();
    Ok(events)
}

pub(crate) fn clock(userdata: u64, timeout: Duration) -> Subscription {
    Subscription {
        userdata: userdata.into(),
        u: SubscriptionU::Clock(SubscriptionClock {
            id: 1,
            timeout: u64::try_from(timeout.as_nanos()).unwrap(),
            precision: 0,
            flags: Subclockflags::empty(),
        }),
    }
}

pub(crate) fn read(userdata: u64, fd: i32) -> Subscription {
    Subscription {
        userdata: userdata.into(),
        u: SubscriptionU::FdRead(SubscriptionFdReadwrite {
            file_descriptor: fd,
        }),
    }
}

pub(crate) fn write(userdata: u64, fd: i32) -> Subscription {
    Subscription {
        userdata: userdata.into(),
        u: SubscriptionU::FdWrite(SubscriptionFdReadwrite {
            file_descriptor: fd,
        }),
    }
}

pub(crate) fn fd(key: u32) -> i32 {
    i32::try_from(key).unwrap()
}
