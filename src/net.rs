//! Host sockets as guest resources.

use crate::file::WasiFile;
use crate::poll::HostHandle;
use std::any::Any;

#[cfg(unix)]
use std::os::unix::io::AsFd;
#[cfg(windows)]
use std::os::windows::io::AsSocket;

macro_rules! wasi_socket_impl {
    ($ty:ident, $std:ty) => {
        pub struct $ty($std);

        impl $ty {
            pub fn from_std(socket: $std) -> Self {
                $ty(socket)
            }
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
                Some(HostHandle::Socket(self.0.as_socket()))
            }
        }
    };
}

wasi_socket_impl!(TcpListener, std::net::TcpListener);
wasi_socket_impl!(TcpStream, std::net::TcpStream);
