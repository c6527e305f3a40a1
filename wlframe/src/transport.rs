use std::{
    env,
    io::{self, Read, Write},
    mem,
    os::{
        fd::{AsRawFd, RawFd},
        unix::net::UnixStream,
    },
    path::PathBuf,
    ptr,
};

use crate::error::{Error, Result};

pub const DEFAULT_DISPLAY: &str = "wayland-0";

/// Byte transport underneath a session. `receive` returns `Ok(0)` once the peer has
/// closed, and `ErrorKind::WouldBlock` when `blocking` is false and nothing is
/// available yet.
pub trait Transport {
    fn send(&mut self, bytes: &[u8], fds: &[RawFd]) -> io::Result<usize>;
    fn receive(&mut self, buffer: &mut [u8], blocking: bool) -> io::Result<usize>;
    fn close(&mut self);
}

pub struct UnixTransport {
    socket: Option<UnixStream>,
}

impl UnixTransport {
    pub fn connect(target: Option<&str>) -> Result<Self> {
        let path = resolve_socket_path(target)?;
        log::debug!("Connecting to socket_path = {}", path.display());

        let socket = UnixStream::connect(&path).map_err(|e| {
            Error::Connection(format!("failed to connect to {}: {e}", path.display()))
        })?;

        Ok(Self {
            socket: Some(socket),
        })
    }

    fn socket(&self) -> io::Result<&UnixStream> {
        self.socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport closed"))
    }

    fn send_with_fds(&self, bytes: &[u8], fds: &[RawFd]) -> io::Result<usize> {
        let socket = self.socket()?;
        let fds_size = mem::size_of_val(fds);

        // u64 words keep the control buffer aligned for cmsghdr
        let space = unsafe { libc::CMSG_SPACE(fds_size as u32) } as usize;
        let mut control = vec![0u64; space.div_ceil(mem::size_of::<u64>())];

        let mut iov = libc::iovec {
            iov_base: bytes.as_ptr() as *mut libc::c_void,
            iov_len: bytes.len(),
        };

        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen = space as _;

        unsafe {
            let cmsg = libc::CMSG_FIRSTHDR(&msg);
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            (*cmsg).cmsg_len = libc::CMSG_LEN(fds_size as u32) as _;
            ptr::copy_nonoverlapping(fds.as_ptr() as *const u8, libc::CMSG_DATA(cmsg), fds_size);
        }

        let sent = loop {
            let res = unsafe { libc::sendmsg(socket.as_raw_fd(), &msg, libc::MSG_NOSIGNAL) };
            if res >= 0 {
                break res as usize;
            }

            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        };

        // the descriptors went out with the first chunk, the rest is plain bytes
        if sent < bytes.len() {
            let mut socket = socket;
            socket.write_all(&bytes[sent..])?;
        }

        Ok(bytes.len())
    }

    fn receive_nonblocking(&self, buffer: &mut [u8]) -> io::Result<usize> {
        let socket = self.socket()?;
        loop {
            let res = unsafe {
                libc::recv(
                    socket.as_raw_fd(),
                    buffer.as_mut_ptr() as *mut libc::c_void,
                    buffer.len(),
                    libc::MSG_DONTWAIT,
                )
            };
            if res >= 0 {
                return Ok(res as usize);
            }

            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl Transport for UnixTransport {
    fn send(&mut self, bytes: &[u8], fds: &[RawFd]) -> io::Result<usize> {
        if !fds.is_empty() {
            return self.send_with_fds(bytes, fds);
        }

        let mut socket = self.socket()?;
        socket.write_all(bytes)?;
        Ok(bytes.len())
    }

    fn receive(&mut self, buffer: &mut [u8], blocking: bool) -> io::Result<usize> {
        if !blocking {
            return self.receive_nonblocking(buffer);
        }

        let mut socket = self.socket()?;
        loop {
            match socket.read(buffer) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            let _ = socket.shutdown(std::net::Shutdown::Both);
        }
    }
}

/// An explicit target wins over `$WAYLAND_DISPLAY`, which wins over `wayland-0`.
/// Relative names live in `$XDG_RUNTIME_DIR`.
pub fn resolve_socket_path(target: Option<&str>) -> Result<PathBuf> {
    let display = match target {
        Some(name) => name.to_string(),
        None => env::var("WAYLAND_DISPLAY").unwrap_or_else(|_| DEFAULT_DISPLAY.to_string()),
    };

    socket_path_for(&display, env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from))
}

fn socket_path_for(display: &str, runtime_dir: Option<PathBuf>) -> Result<PathBuf> {
    let display = PathBuf::from(display);
    if display.is_absolute() {
        return Ok(display);
    }

    let runtime_dir = runtime_dir.ok_or_else(|| {
        Error::Connection("XDG_RUNTIME_DIR is not set and the display name is relative".into())
    })?;

    Ok(runtime_dir.join(display))
}
