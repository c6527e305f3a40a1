pub mod memory;

use log::info;

use crate::{
    error::{allocation_error, Error, Result},
    protocol::{base::*, WlInterface},
    session::WaylandSession,
    surface::Rect,
};
use memory::SharedMemory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ShmFormat {
    Argb8888 = 0,
    Xrgb8888 = 1,
}

impl ShmFormat {
    /// Every compositor must support both, but only advertised formats are used.
    pub const PREFERENCE: [ShmFormat; 2] = [Self::Argb8888, Self::Xrgb8888];

    pub fn from_wire(value: u32) -> Option<Self> {
        Self::PREFERENCE.into_iter().find(|f| *f as u32 == value)
    }

    pub fn bytes_per_pixel(self) -> i32 {
        4
    }

    pub fn select(advertised: &[u32]) -> Result<Self> {
        Self::PREFERENCE
            .into_iter()
            .find(|f| advertised.contains(&(*f as u32)))
            .ok_or(Error::UnsupportedFormat)
    }
}

/// A region of a pool the server knows as a `wl_buffer`.
#[derive(Debug)]
pub struct BufferDescriptor {
    pub offset: i32,
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub format: ShmFormat,
    pub buffer: WlBuffer,
}

impl BufferDescriptor {
    pub fn byte_len(&self) -> usize {
        self.height as usize * self.stride as usize
    }

    pub fn full_damage(&self) -> Rect {
        Rect::sized(self.width, self.height)
    }

    pub fn destroy(self, session: &mut WaylandSession) -> Result<()> {
        self.buffer.destroy()?;
        session.release_object(self.buffer.get_object_id());
        Ok(())
    }
}

pub struct MemoryPool {
    memory: SharedMemory,
    proxy: Option<WlShmPool>,
}

impl MemoryPool {
    pub fn create(session: &mut WaylandSession, shm: &WlShm, len: usize) -> Result<Self> {
        let size = i32::try_from(len)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| allocation_error!("Invalid pool size {len}"))?;

        let memory = SharedMemory::alloc(len)?;
        let proxy: WlShmPool = session.new_object();
        shm.create_pool(&proxy, memory.as_raw_fd(), size)?;

        info!("Created shm pool of {len} bytes");
        Ok(Self {
            memory,
            proxy: Some(proxy),
        })
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Fails without contacting the server when the region does not fit.
    pub fn create_buffer(
        &self,
        session: &mut WaylandSession,
        offset: i32,
        width: i32,
        height: i32,
        stride: i32,
        format: ShmFormat,
    ) -> Result<BufferDescriptor> {
        check_region(self.len(), offset, width, height, stride, format)?;

        let pool = self
            .proxy
            .as_ref()
            .ok_or_else(|| allocation_error!("The pool registration was already destroyed"))?;

        let buffer: WlBuffer = session.new_object();
        pool.create_buffer(&buffer, offset, width, height, stride, format as u32)?;

        Ok(BufferDescriptor {
            offset,
            width,
            height,
            stride,
            format,
            buffer,
        })
    }

    /// Drops the server side pool object. The mapping and every buffer created
    /// from it stay valid.
    pub fn destroy_registration(&mut self, session: &mut WaylandSession) -> Result<()> {
        if let Some(pool) = self.proxy.take() {
            pool.destroy()?;
            session.release_object(pool.get_object_id());
        }
        Ok(())
    }

    pub fn pixels_mut(&mut self, buffer: &BufferDescriptor) -> &mut [u8] {
        let start = buffer.offset as usize;
        &mut self.memory[start..start + buffer.byte_len()]
    }
}

fn check_region(
    pool_len: usize,
    offset: i32,
    width: i32,
    height: i32,
    stride: i32,
    format: ShmFormat,
) -> Result<()> {
    let out_of_bounds = || Error::OutOfBounds {
        offset,
        height,
        stride,
        pool_len,
    };

    if offset < 0 || width <= 0 || height <= 0 {
        return Err(out_of_bounds());
    }

    if (width as i64) * (format.bytes_per_pixel() as i64) > stride as i64 {
        return Err(Error::InvalidStride { width, stride });
    }

    let end = offset as i64 + height as i64 * stride as i64;
    if end > pool_len as i64 {
        return Err(out_of_bounds());
    }

    Ok(())
}
