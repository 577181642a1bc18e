use crate::{IN, NEVENTS, OUT, clock, fd, guest_memory, nevents, poll, read, write};
use anyhow::Result;
use std::time::{Duration, Instant};
use wasi_poll::event::Event;
use wasi_poll::pipe::{ReadPipe, WritePipe};
use wasi_poll::sched::subscription::{SubscriptionClock, SubscriptionU};
use wasi_poll::types::{Errno, Eventtype, Subclockflags};
use wasi_poll::{Error, WasiCtx, poll_oneoff_errno};

#[test_log::test]
fn single_clock_sleeps_for_its_timeout() -> Result<()> {
    let ctx = WasiCtx::builder().build();
    let start = Instant::now();
    let events = poll(&ctx, &[clock(1, Duration::from_millis(50))])?;
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(events, vec![Event::new(1u64.into(), Eventtype::Clock)]);
    Ok(())
}

#[test_log::test]
fn zero_clock_returns_immediately() -> Result<()> {
    let ctx = WasiCtx::builder().build();
    let events = poll(&ctx, &[clock(9, Duration::ZERO)])?;
    assert_eq!(events, vec![Event::new(9u64.into(), Eventtype::Clock)]);
    Ok(())
}

#[test_log::test]
fn earliest_clock_wins() -> Result<()> {
    let ctx = WasiCtx::builder().build();
    let start = Instant::now();
    let events = poll(
        &ctx,
        &[
            clock(1, Duration::from_secs(10)),
            clock(2, Duration::from_millis(20)),
            clock(3, Duration::from_millis(20)),
        ],
    )?;
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(20), "took {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    // Of two equal deadlines the first subscription is reported.
    assert_eq!(events, vec![Event::new(2u64.into(), Eventtype::Clock)]);
    Ok(())
}

#[test_log::test]
fn unknown_fd_is_reported_without_waiting() -> Result<()> {
    let ctx = WasiCtx::builder().build();
    let start = Instant::now();
    let events = poll(&ctx, &[clock(1, Duration::from_secs(10)), read(2, 42)])?;
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(
        events,
        vec![Event::new(2u64.into(), Eventtype::FdRead).with_error(Errno::Badf)]
    );
    Ok(())
}

#[test_log::test]
fn stdout_and_stderr_are_always_writable() -> Result<()> {
    let ctx = WasiCtx::builder()
        .stdout(Box::new(WritePipe::new_in_memory()))
        .build();
    let start = Instant::now();
    let events = poll(
        &ctx,
        &[clock(1, Duration::from_secs(10)), write(2, 1), write(3, 2)],
    )?;
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(
        events,
        vec![
            Event::new(2u64.into(), Eventtype::FdWrite),
            Event::new(3u64.into(), Eventtype::FdWrite),
        ]
    );
    Ok(())
}

#[test_log::test]
fn events_are_packed_without_gaps() -> Result<()> {
    let ctx = WasiCtx::builder().build();
    let subs = [
        read(1, 99),
        clock(2, Duration::from_secs(10)),
        write(3, 1),
        write(4, 77),
    ];
    let mut mem = guest_memory(&subs);
    let n = ctx.poll_oneoff(&mut mem, IN, OUT, 4, NEVENTS)?;
    assert_eq!(n, 3);
    assert_eq!(nevents(&mem), 3);

    let out = OUT as usize;
    let userdata: Vec<u64> = (0..3)
        .map(|i| u64::from(Event::decode(&mem[out + i * 32..]).unwrap().userdata))
        .collect();
    assert_eq!(userdata, vec![1, 3, 4]);
    // The slot after the last event stays zeroed.
    assert!(mem[out + 96..out + 128].iter().all(|b| *b == 0));
    Ok(())
}

#[test_log::test]
fn in_memory_stdin_is_readable() -> Result<()> {
    let ctx = WasiCtx::builder()
        .stdin(Box::new(ReadPipe::from("hello")))
        .build();
    let events = poll(&ctx, &[read(5, 0)])?;
    assert_eq!(events, vec![Event::new(5u64.into(), Eventtype::FdRead)]);
    Ok(())
}

#[test_log::test]
fn unpollable_resources_report_notsup() -> Result<()> {
    let ctx = WasiCtx::builder().build();
    let pipe = ctx.push_file(Box::new(ReadPipe::from("data")))?;
    let events = poll(&ctx, &[read(1, fd(pipe))])?;
    assert_eq!(
        events,
        vec![Event::new(1u64.into(), Eventtype::FdRead).with_error(Errno::Notsup)]
    );
    Ok(())
}

#[test_log::test]
fn regular_files_are_ready() -> Result<()> {
    let ctx = WasiCtx::builder().build();
    let file = ctx.insert_file(tempfile::tempfile()?)?;
    let start = Instant::now();
    let events = poll(
        &ctx,
        &[read(1, fd(file)), clock(2, Duration::from_secs(10))],
    )?;
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(events.len(), 1);
    assert_eq!(u64::from(events[0].userdata), 1);
    assert_eq!(events[0].error, Errno::Success);
    Ok(())
}

#[test_log::test]
fn zero_subscriptions_is_inval_and_leaves_memory_alone() {
    let ctx = WasiCtx::builder().build();
    let mut mem = vec![0xaau8; crate::MEMORY_SIZE];
    let result = ctx.poll_oneoff(&mut mem, IN, OUT, 0, NEVENTS);
    assert!(matches!(result, Err(Error::Inval)));
    assert!(mem.iter().all(|b| *b == 0xaa));
}

#[test_log::test]
fn negative_fd_fails_the_whole_call() {
    let ctx = WasiCtx::builder().build();
    let subs = [write(1, 1), read(2, -1)];
    let mut mem = guest_memory(&subs);
    mem[NEVENTS as usize..NEVENTS as usize + 4].fill(0xff);

    let errno = poll_oneoff_errno(&ctx, &mut mem, IN, OUT, 2, NEVENTS);
    assert_eq!(errno, Errno::Badf);
    assert_eq!(nevents(&mem), 0);
    // The stdout event written before the bad record is discarded.
    let out = OUT as usize;
    assert!(mem[out..out + 64].iter().all(|b| *b == 0));
}

#[test_log::test]
fn absolute_clocks_are_not_supported() {
    let ctx = WasiCtx::builder().build();
    let mut sub = clock(1, Duration::from_millis(1));
    sub.u = SubscriptionU::Clock(SubscriptionClock {
        id: 1,
        timeout: 1,
        precision: 0,
        flags: Subclockflags::SUBSCRIPTION_CLOCK_ABSTIME,
    });
    assert!(matches!(poll(&ctx, &[sub]), Err(Error::Notsup)));
}

#[test_log::test]
fn malformed_records_are_inval() {
    let ctx = WasiCtx::builder().build();

    let mut mem = guest_memory(&[read(1, 0)]);
    mem[IN as usize + 8] = 7;
    assert_eq!(
        poll_oneoff_errno(&ctx, &mut mem, IN, OUT, 1, NEVENTS),
        Errno::Inval
    );

    let mut mem = guest_memory(&[clock(1, Duration::ZERO)]);
    mem[IN as usize + 40] = 0b100;
    assert_eq!(
        poll_oneoff_errno(&ctx, &mut mem, IN, OUT, 1, NEVENTS),
        Errno::Inval
    );
}

#[test_log::test]
fn out_of_bounds_pointers_fault() {
    let ctx = WasiCtx::builder().build();
    let mut mem = guest_memory(&[clock(1, Duration::ZERO)]);
    let len = u32::try_from(mem.len()).unwrap();

    // Subscriptions running past the end of memory.
    assert_eq!(
        poll_oneoff_errno(&ctx, &mut mem, len - 40, OUT, 1, NEVENTS),
        Errno::Fault
    );
    // Output array that does not fit.
    assert_eq!(
        poll_oneoff_errno(&ctx, &mut mem, IN, len - 16, 1, NEVENTS),
        Errno::Fault
    );
    // A subscription count whose byte length overflows.
    assert_eq!(
        poll_oneoff_errno(&ctx, &mut mem, IN, OUT, u32::MAX, NEVENTS),
        Errno::Fault
    );
    // Nowhere to put the count.
    assert_eq!(
        poll_oneoff_errno(&ctx, &mut mem, IN, OUT, 1, len),
        Errno::Fault
    );
}

#[test_log::test]
fn errno_wrapper_reports_success() {
    let ctx = WasiCtx::builder().build();
    let mut mem = guest_memory(&[write(1, 2)]);
    assert_eq!(
        poll_oneoff_errno(&ctx, &mut mem, IN, OUT, 1, NEVENTS),
        Errno::Success
    );
    assert_eq!(nevents(&mem), 1);
}

#[test_log::test]
fn nonblocking_stdin_is_ready_at_once() -> Result<()> {
    let ctx = WasiCtx::builder()
        .inherit_stdin()
        .stdin_nonblocking(true)
        .build();
    let start = Instant::now();
    let events = poll(&ctx, &[clock(1, Duration::from_secs(5)), read(2, 0)])?;
    assert!(start.elapsed() < Duration::from_secs(4));
    assert_eq!(events, vec![Event::new(2u64.into(), Eventtype::FdRead)]);
    Ok(())
}

#[test_log::test]
fn ready_blocking_stdin_reports_each_read() -> Result<()> {
    let stdin = wasi_poll::file::File::from_std(tempfile::tempfile()?);
    let ctx = WasiCtx::builder().stdin(Box::new(stdin)).build();
    let events = poll(&ctx, &[read(1, 0), read(2, 0)])?;
    assert_eq!(
        events,
        vec![
            Event::new(1u64.into(), Eventtype::FdRead),
            Event::new(2u64.into(), Eventtype::FdRead),
        ]
    );
    Ok(())
}
