use crate::poll::HostHandle;
use crate::table::Table;
use crate::{Error, Result};
use std::any::Any;
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::io::AsFd;
#[cfg(windows)]
use std::os::windows::io::AsHandle;

/// A resource a guest can name through a file descriptor.
pub trait WasiFile: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// The host handle to wait on for readiness. `None` for resources that
    /// live only inside this process and cannot be polled.
    fn pollable(&self) -> Option<HostHandle<'_>> {
        None
    }

    /// Whether reads from this resource return immediately instead of
    /// blocking. Only consulted for stdin.
    fn is_nonblocking(&self) -> bool {
        false
    }
}

/// What the table holds for each guest file descriptor.
pub struct FileEntry {
    file: Box<dyn WasiFile>,
}

impl FileEntry {
    pub fn new(file: Box<dyn WasiFile>) -> Self {
        FileEntry { file }
    }

    pub fn file(&self) -> &dyn WasiFile {
        &*self.file
    }
}

pub trait TableFileExt {
    fn get_file(&self, fd: u32) -> Result<Arc<FileEntry>>;
}

impl TableFileExt for Table {
    fn get_file(&self, fd: u32) -> Result<Arc<FileEntry>> {
        self.get::<FileEntry>(fd).map_err(|_| Error::Badf)
    }
}

/// A host file opened by the embedder.
pub struct File(std::fs::File);

impl File {
    pub fn from_std(file: std::fs::File) -> Self {
        File(file)
    }
}

impl WasiFile for File {
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
