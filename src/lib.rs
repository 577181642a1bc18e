//! Readiness polling for the WASI preview 1 `poll_oneoff` call.
//!
//! A [`WasiCtx`] owns a [`Table`] mapping guest file descriptors to host
//! resources and a [`WasiSched`] that does the blocking. Host-function glue
//! hands [`WasiCtx::poll_oneoff`] the guest's linear memory (anything
//! implementing [`GuestMemory`]) along with the raw call arguments, and gets
//! back the number of events written, or an [`Error`] whose
//! [`errno`](Error::errno) is what the guest should see.
//!
//! Waiting itself goes through the [`poll`] façade, which maps onto `poll(2)`
//! on Unix and onto an emulation built from `WSAPoll` and pipe peeking on
//! Windows.

pub mod ctx;
pub mod error;
pub mod event;
pub mod file;
pub mod memory;
pub mod net;
pub mod pipe;
pub mod poll;
pub mod sched;
pub mod snapshots;
pub mod stdio;
pub mod table;
pub mod types;

pub use ctx::{WasiCtx, WasiCtxBuilder};
pub use error::{Error, Result};
pub use file::WasiFile;
pub use memory::GuestMemory;
pub use sched::{SyncSched, WasiSched};
pub use snapshots::preview_1::poll_oneoff_errno;
pub use table::{Table, TableError};
