//! The host's standard streams as guest resources.

use crate::file::WasiFile;
use crate::poll::HostHandle;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use std::os::unix::io::AsFd;
#[cfg(windows)]
use std::os::windows::io::AsHandle;

pub struct Stdin {
    stdin: std::io::Stdin,
    nonblocking: AtomicBool,
}

pub fn stdin() -> Stdin {
    Stdin {
        stdin: std::io::stdin(),
        nonblocking: AtomicBool::new(false),
    }
}

impl Stdin {
    /// Mark reads from stdin as non-blocking, which makes a read
    /// subscription on it ready straight away.
    pub fn set_nonblocking(&self, nonblocking: bool) {
        self.nonblocking.store(nonblocking, Ordering::Relaxed);
    }
}

impl WasiFile for Stdin {
    fn as_any(&self) -> &dyn Any {
        self
    }
    #[cfg(unix)]
    fn pollable(&self) -> Option<HostHandle<'_>> {
        Some(self.stdin.as_fd())
    }
    #[cfg(windows)]
    fn pollable(&self) -> Option<HostHandle<'_>> {
        Some(HostHandle::Handle(self.stdin.as_handle()))
    }
    fn is_nonblocking(&self) -> bool {
        self.nonblocking.load(Ordering::Relaxed)
    }
}

macro_rules! wasi_file_write_impl {
    ($ty:ident, $std:ty, $ctor:ident) => {
        pub struct $ty($std);

        pub fn $ctor() -> $ty {
            $ty(std::io::$ctor())
        }

        impl WasiFile for $ty {
            fn as_any(&self) -> &dyn Any {
                self
            }
            #[cfg(unix)]
            fn pollable(&self) -> Option<HostHandle<'_>> {
                Some(self.0.as_fd())
            }
            #[cfg(windows)]
            fn pollable(&self) -> Option<HostHandle<'_>> {
                Some(HostHandle::Handle(self.0.as_handle()))
            }
        }
    };
}

wasi_file_write_impl!(Stdout, std::io::Stdout, stdout);
wasi_file_write_impl!(Stderr, std::io::Stderr, stderr);
