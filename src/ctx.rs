use crate::file::{FileEntry, TableFileExt, WasiFile};
use crate::pipe::{ReadPipe, WritePipe};
use crate::poll::{self, DEFAULT_PIPE_POLL_INTERVAL, Interest, PollTarget, Poller};
use crate::sched::{SyncSched, WasiSched};
use crate::stdio::{self, Stdin};
use crate::table::{Table, TableError};
use crate::types::{FD_STDERR, FD_STDIN, FD_STDOUT};
use crate::{Error, file, net};
use std::sync::Arc;
use std::time::Duration;

/// Per-instance state backing `poll_oneoff`: the handle table and the host
/// scheduler that does the blocking.
pub struct WasiCtx {
    table: Arc<Table>,
    sched: Box<dyn WasiSched>,
}

impl WasiCtx {
    pub fn builder() -> WasiCtxBuilder {
        WasiCtxBuilder::new()
    }

    /// The handle table, shared so the embedder can keep registering
    /// resources while the guest runs.
    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub(crate) fn sched(&self) -> &dyn WasiSched {
        &*self.sched
    }

    /// Register a resource under the next free guest handle.
    pub fn push_file(&self, file: Box<dyn WasiFile>) -> Result<u32, TableError> {
        self.table.push(Arc::new(FileEntry::new(file)))
    }

    pub fn insert_file(&self, file: std::fs::File) -> Result<u32, TableError> {
        let fd = self.push_file(Box::new(file::File::from_std(file)))?;
        tracing::trace!(fd, "registered file");
        Ok(fd)
    }

    pub fn insert_tcp_stream(&self, stream: std::net::TcpStream) -> Result<u32, TableError> {
        let fd = self.push_file(Box::new(net::TcpStream::from_std(stream)))?;
        tracing::trace!(fd, "registered tcp stream");
        Ok(fd)
    }

    pub fn insert_tcp_listener(
        &self,
        listener: std::net::TcpListener,
    ) -> Result<u32, TableError> {
        let fd = self.push_file(Box::new(net::TcpListener::from_std(listener)))?;
        tracing::trace!(fd, "registered tcp listener");
        Ok(fd)
    }

    /// Block until at least one of the registered TCP streams `fds` has data
    /// to read, and return the ready ones in the order given.
    ///
    /// There is no timeout. An empty list is `Inval`, an unknown handle
    /// `Badf` and anything other than a TCP stream `Notsock`.
    pub fn poll_tcp_streams(&self, fds: &[u32]) -> crate::Result<Vec<u32>> {
        let mut entries = Vec::with_capacity(fds.len());
        for &fd in fds {
            let entry = self.table.get_file(fd)?;
            if !entry.file().as_any().is::<net::TcpStream>() {
                return Err(Error::Notsock);
            }
            entries.push(entry);
        }
        let mut targets = Vec::with_capacity(entries.len());
        for entry in &entries {
            let handle = entry.file().pollable().ok_or(Error::Notsock)?;
            targets.push(PollTarget::new(handle, Interest::READABLE));
        }
        poll::wait_readable(&mut targets, |targets| self.sched().poll(targets, -1))?;
        let ready = fds
            .iter()
            .zip(&targets)
            .filter(|(_, t)| !t.observed().is_empty())
            .map(|(fd, _)| *fd)
            .collect::<Vec<_>>();
        tracing::trace!(?ready, "tcp streams readable");
        Ok(ready)
    }

    pub fn set_stdin(&self, f: Box<dyn WasiFile>) {
        self.insert_stdio(FD_STDIN, f);
    }

    pub fn set_stdout(&self, f: Box<dyn WasiFile>) {
        self.insert_stdio(FD_STDOUT, f);
    }

    pub fn set_stderr(&self, f: Box<dyn WasiFile>) {
        self.insert_stdio(FD_STDERR, f);
    }

    fn insert_stdio(&self, fd: u32, f: Box<dyn WasiFile>) {
        self.table.insert_at(fd, Arc::new(FileEntry::new(f)));
    }
}

pub struct WasiCtxBuilder {
    stdin: Box<dyn WasiFile>,
    stdout: Box<dyn WasiFile>,
    stderr: Box<dyn WasiFile>,
    stdin_nonblocking: bool,
    max_handles: Option<usize>,
    pipe_poll_interval: Duration,
    sched: Option<Box<dyn WasiSched>>,
}

impl Default for WasiCtxBuilder {
    fn default() -> Self {
        WasiCtxBuilder::new()
    }
}

impl WasiCtxBuilder {
    /// A builder with empty in-memory stdio.
    pub fn new() -> Self {
        WasiCtxBuilder {
            stdin: Box::new(ReadPipe::new(std::io::empty())),
            stdout: Box::new(WritePipe::new(std::io::sink())),
            stderr: Box::new(WritePipe::new(std::io::sink())),
            stdin_nonblocking: false,
            max_handles: None,
            pipe_poll_interval: DEFAULT_PIPE_POLL_INTERVAL,
            sched: None,
        }
    }

    pub fn stdin(mut self, f: Box<dyn WasiFile>) -> Self {
        self.stdin = f;
        self
    }

    pub fn stdout(mut self, f: Box<dyn WasiFile>) -> Self {
        self.stdout = f;
        self
    }

    pub fn stderr(mut self, f: Box<dyn WasiFile>) -> Self {
        self.stderr = f;
        self
    }

    pub fn inherit_stdin(self) -> Self {
        self.stdin(Box::new(stdio::stdin()))
    }

    pub fn inherit_stdout(self) -> Self {
        self.stdout(Box::new(stdio::stdout()))
    }

    pub fn inherit_stderr(self) -> Self {
        self.stderr(Box::new(stdio::stderr()))
    }

    pub fn inherit_stdio(self) -> Self {
        self.inherit_stdin().inherit_stdout().inherit_stderr()
    }

    /// Treat reads from an inherited stdin as non-blocking.
    pub fn stdin_nonblocking(mut self, nonblocking: bool) -> Self {
        self.stdin_nonblocking = nonblocking;
        self
    }

    /// Cap the number of resources the table holds, stdio included.
    pub fn max_handles(mut self, max: usize) -> Self {
        self.max_handles = Some(max);
        self
    }

    /// How often pipes are re-checked while waiting on Windows.
    pub fn pipe_poll_interval(mut self, interval: Duration) -> Self {
        self.pipe_poll_interval = interval;
        self
    }

    /// Replace the host scheduler. Overrides `pipe_poll_interval`.
    pub fn sched(mut self, sched: Box<dyn WasiSched>) -> Self {
        self.sched = Some(sched);
        self
    }

    pub fn build(self) -> WasiCtx {
        let table = match self.max_handles {
            Some(max) => Table::with_max_entries(max),
            None => Table::new(),
        };
        if let Some(stdin) = self.stdin.as_any().downcast_ref::<Stdin>() {
            stdin.set_nonblocking(self.stdin_nonblocking);
        }
        let sched = self.sched.unwrap_or_else(|| {
            let poller = Poller::new().with_pipe_poll_interval(self.pipe_poll_interval);
            Box::new(SyncSched::with_poller(poller))
        });
        let ctx = WasiCtx {
            table: Arc::new(table),
            sched,
        };
        ctx.set_stdin(self.stdin);
        ctx.set_stdout(self.stdout);
        ctx.set_stderr(self.stderr);
        ctx
    }
}
