use memmap::{MmapMut, MmapOptions};
use std::{
    ffi::CString,
    fs::File,
    ops::{Deref, DerefMut},
    os::fd::{AsRawFd, FromRawFd, RawFd},
    process,
    sync::atomic::{AtomicU32, Ordering},
};

use log::{debug, warn};

use crate::error::{allocation_error, Result};

/// An anonymous, zero-filled file mapped read/write into this process.
pub struct SharedMemory {
    file: File,
    data: MmapMut,
}

impl SharedMemory {
    pub fn alloc(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(allocation_error!("Refusing to map an empty shared memory file"));
        }

        let (file, sealable) = match create_memfd() {
            Ok(file) => (file, true),
            Err(err) => {
                warn!("{err}, falling back to shm_open");
                (create_shm_file()?, false)
            }
        };

        file.set_len(size as u64)
            .map_err(|e| allocation_error!("Failed to resize shared memory to {size} bytes: {e}"))?;

        if sealable {
            seal_size(&file);
        }

        let data = unsafe { MmapOptions::new().len(size).map_mut(&file) }
            .map_err(|e| allocation_error!("Failed to map {size} bytes of shared memory: {e}"))?;

        Ok(Self { file, data })
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl Deref for SharedMemory {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for SharedMemory {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

fn create_memfd() -> Result<File> {
    let fd = unsafe {
        libc::memfd_create(
            c"wlframe-shm".as_ptr(),
            libc::MFD_CLOEXEC | libc::MFD_ALLOW_SEALING,
        )
    };

    if fd < 0 {
        return Err(allocation_error!("memfd_create failed: '{}'", errno::errno()));
    }

    Ok(unsafe { File::from_raw_fd(fd) })
}

fn create_shm_file() -> Result<File> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let filename = CString::new(format!(
        "/wlframe-{}-{}",
        process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
    .map_err(|e| allocation_error!("Invalid shm name: {e}"))?;

    let fd = unsafe {
        libc::shm_open(
            filename.as_ptr(),
            libc::O_CREAT | libc::O_EXCL | libc::O_RDWR | libc::O_CLOEXEC,
            0o600,
        )
    };

    if fd < 0 {
        return Err(allocation_error!("Error creating with shm_open '{}'", errno::errno()));
    }

    let shm_file = unsafe { File::from_raw_fd(fd) };

    let res = unsafe { libc::shm_unlink(filename.as_ptr()) };
    if res < 0 {
        return Err(allocation_error!("Error unlinking '{}'", errno::errno()));
    }

    Ok(shm_file)
}

// The server maps the same file, shrinking it under its feet would SIGBUS it.
fn seal_size(file: &File) {
    let res = unsafe {
        libc::fcntl(
            file.as_raw_fd(),
            libc::F_ADD_SEALS,
            libc::F_SEAL_SHRINK | libc::F_SEAL_SEAL,
        )
    };

    if res < 0 {
        debug!("Unable to seal shared memory: '{}'", errno::errno());
    }
}
