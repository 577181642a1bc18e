//! Timeouts handed to the host scheduler, observed through a recording
//! `WasiSched`.

use crate::{clock, fd, poll, read, write};
use anyhow::Result;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wasi_poll::event::Event;
use wasi_poll::file::File;
use wasi_poll::poll::{Interest, PollTarget};
use wasi_poll::types::Eventtype;
use wasi_poll::{WasiCtx, WasiSched};

#[derive(Debug, PartialEq)]
enum Call {
    Poll { targets: usize, timeout_ms: i32 },
    Sleep(Duration),
}

/// Records every call and reports nothing as ready.
#[derive(Clone, Default)]
struct RecordingSched(Arc<Mutex<Vec<Call>>>);

impl RecordingSched {
    fn calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl WasiSched for RecordingSched {
    fn poll(&self, targets: &mut [PollTarget<'_>], timeout_ms: i32) -> wasi_poll::Result<usize> {
        self.0.lock().unwrap().push(Call::Poll {
            targets: targets.len(),
            timeout_ms,
        });
        Ok(0)
    }

    fn sleep(&self, duration: Duration) -> wasi_poll::Result<()> {
        self.0.lock().unwrap().push(Call::Sleep(duration));
        Ok(())
    }
}

/// Reports every target ready for exactly what it asked for.
#[derive(Clone, Default)]
struct ReadySched(RecordingSched);

impl WasiSched for ReadySched {
    fn poll(&self, targets: &mut [PollTarget<'_>], timeout_ms: i32) -> wasi_poll::Result<usize> {
        self.0.poll(targets, timeout_ms)?;
        for target in targets.iter_mut() {
            target.set_observed(target.interest());
        }
        Ok(targets.len())
    }

    fn sleep(&self, duration: Duration) -> wasi_poll::Result<()> {
        self.0.sleep(duration)
    }
}

fn recording_ctx() -> (WasiCtx, RecordingSched) {
    let sched = RecordingSched::default();
    let ctx = WasiCtx::builder().sched(Box::new(sched.clone())).build();
    (ctx, sched)
}

fn socket() -> Result<TcpStream> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(TcpStream::connect(listener.local_addr()?)?)
}

#[test_log::test]
fn clock_timeouts_round_up_to_milliseconds() -> Result<()> {
    let (ctx, sched) = recording_ctx();
    let sock = ctx.insert_tcp_stream(socket()?)?;

    let events = poll(
        &ctx,
        &[read(1, fd(sock)), clock(2, Duration::from_micros(1_500_500))],
    )?;
    assert_eq!(events, vec![Event::new(2u64.into(), Eventtype::Clock)]);
    assert_eq!(
        sched.calls(),
        vec![Call::Poll {
            targets: 1,
            timeout_ms: 1501
        }]
    );
    Ok(())
}

#[test_log::test]
fn no_clock_blocks_indefinitely() -> Result<()> {
    let (ctx, sched) = recording_ctx();
    let sock = ctx.insert_tcp_stream(socket()?)?;

    let events = poll(&ctx, &[write(1, fd(sock))])?;
    assert!(events.is_empty());
    assert_eq!(
        sched.calls(),
        vec![Call::Poll {
            targets: 1,
            timeout_ms: -1
        }]
    );
    Ok(())
}

#[test_log::test]
fn clock_only_sleeps_for_the_exact_timeout() -> Result<()> {
    let (ctx, sched) = recording_ctx();
    let timeout = Duration::from_nanos(2_000_001);
    poll(&ctx, &[clock(1, timeout)])?;
    assert_eq!(sched.calls(), vec![Call::Sleep(timeout)]);
    Ok(())
}

#[test_log::test]
fn immediate_events_do_not_wait() -> Result<()> {
    let (ctx, sched) = recording_ctx();
    let sock = ctx.insert_tcp_stream(socket()?)?;

    let events = poll(
        &ctx,
        &[
            read(1, 1234),
            read(2, fd(sock)),
            clock(3, Duration::from_secs(60)),
        ],
    )?;
    assert_eq!(events.len(), 1);
    assert_eq!(u64::from(events[0].userdata), 1);
    assert_eq!(
        sched.calls(),
        vec![Call::Poll {
            targets: 1,
            timeout_ms: 0
        }]
    );
    Ok(())
}

#[test_log::test]
fn blocking_stdin_reuses_the_timeout() -> Result<()> {
    let sched = RecordingSched::default();
    let stdin = File::from_std(tempfile::tempfile()?);
    let ctx = WasiCtx::builder()
        .stdin(Box::new(stdin))
        .sched(Box::new(sched.clone()))
        .build();
    let sock = ctx.insert_tcp_stream(socket()?)?;

    let events = poll(
        &ctx,
        &[
            read(1, 0),
            read(2, fd(sock)),
            clock(3, Duration::from_millis(20)),
        ],
    )?;
    assert_eq!(events, vec![Event::new(3u64.into(), Eventtype::Clock)]);
    assert_eq!(
        sched.calls(),
        vec![
            Call::Poll {
                targets: 1,
                timeout_ms: 20
            },
            Call::Poll {
                targets: 1,
                timeout_ms: 20
            },
        ]
    );
    Ok(())
}

#[test_log::test]
fn custom_scheduler_marks_ready_targets() -> Result<()> {
    let sched = ReadySched::default();
    let ctx = WasiCtx::builder().sched(Box::new(sched.clone())).build();
    let sock = ctx.insert_tcp_stream(socket()?)?;

    let events = poll(
        &ctx,
        &[clock(1, Duration::from_secs(5)), write(2, fd(sock))],
    )?;
    assert_eq!(events, vec![Event::new(2u64.into(), Eventtype::FdWrite)]);
    assert_eq!(
        sched.0.calls(),
        vec![Call::Poll {
            targets: 1,
            timeout_ms: 5000
        }]
    );
    Ok(())
}

#[test_log::test]
fn ready_blocking_stdin_emits_every_deferred_read() -> Result<()> {
    let sched = ReadySched::default();
    let stdin = File::from_std(tempfile::tempfile()?);
    let ctx = WasiCtx::builder()
        .stdin(Box::new(stdin))
        .sched(Box::new(sched.clone()))
        .build();
    let sock = ctx.insert_tcp_stream(socket()?)?;

    let events = poll(
        &ctx,
        &[
            read(1, 0),
            read(2, fd(sock)),
            read(3, 0),
            clock(4, Duration::from_secs(5)),
        ],
    )?;
    assert_eq!(
        events,
        vec![
            Event::new(2u64.into(), Eventtype::FdRead),
            Event::new(1u64.into(), Eventtype::FdRead),
            Event::new(3u64.into(), Eventtype::FdRead),
        ]
    );
    assert_eq!(sched.0.calls().len(), 2);
    Ok(())
}

#[test_log::test]
fn tcp_stream_wait_polls_again_until_ready() -> Result<()> {
    struct Eventually {
        calls: Mutex<usize>,
    }

    impl WasiSched for Eventually {
        fn poll(
            &self,
            targets: &mut [PollTarget<'_>],
            timeout_ms: i32,
        ) -> wasi_poll::Result<usize> {
            assert_eq!(timeout_ms, -1);
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls < 3 {
                return Ok(0);
            }
            targets[1].set_observed(Interest::READABLE);
            Ok(1)
        }

        fn sleep(&self, _: Duration) -> wasi_poll::Result<()> {
            unreachable!()
        }
    }

    let ctx = WasiCtx::builder()
        .sched(Box::new(Eventually {
            calls: Mutex::new(0),
        }))
        .build();
    let a = ctx.insert_tcp_stream(socket()?)?;
    let b = ctx.insert_tcp_stream(socket()?)?;
    assert_eq!(ctx.poll_tcp_streams(&[a, b])?, vec![b]);
    Ok(())
}
