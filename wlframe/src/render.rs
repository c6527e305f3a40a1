use log::{trace, warn};

use crate::{
    error::Result,
    protocol::{base::*, WlInterface},
    session::WaylandSession,
    shm::{BufferDescriptor, MemoryPool, ShmFormat},
    surface::SurfaceSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No callback outstanding.
    Idle,
    /// Callback requested and committed, waiting for its `done`.
    AwaitingFrame,
}

/// The pixels of one buffer, handed to a [`Painter`].
pub struct Canvas<'a> {
    pub pixels: &'a mut [u8],
    pub width: i32,
    pub height: i32,
    pub stride: i32,
    pub format: ShmFormat,
}

pub trait Painter {
    fn paint(&mut self, canvas: &mut Canvas<'_>);
}

/// White background with a black line bouncing between the top and bottom margins.
pub struct ScanLine {
    margin: i32,
    line: i32,
    speed: i32,
}

impl ScanLine {
    pub fn new(margin: i32) -> Self {
        Self {
            margin,
            line: margin,
            speed: 1,
        }
    }

    pub fn line(&self) -> i32 {
        self.line
    }
}

impl Default for ScanLine {
    fn default() -> Self {
        Self::new(10)
    }
}

const WHITE: [u8; 4] = [0xFF; 4];
// little endian argb: b, g, r, a
const BLACK: [u8; 4] = [0x00, 0x00, 0x00, 0xFF];

impl Painter for ScanLine {
    fn paint(&mut self, canvas: &mut Canvas<'_>) {
        let stride = canvas.stride as usize;
        let row_bytes = canvas.width as usize * 4;

        for row in canvas.pixels.chunks_exact_mut(stride) {
            for pixel in row[..row_bytes].chunks_exact_mut(4) {
                pixel.copy_from_slice(&WHITE);
            }
        }

        let margin = self.margin.clamp(0, canvas.width / 2) as usize;
        if (0..canvas.height).contains(&self.line) {
            let start = self.line as usize * stride;
            let row = &mut canvas.pixels[start..start + row_bytes];
            for pixel in row[margin * 4..row_bytes - margin * 4].chunks_exact_mut(4) {
                pixel.copy_from_slice(&BLACK);
            }
        }

        self.line += self.speed;
        if self.line >= canvas.height - self.margin || self.line <= self.margin {
            self.speed = -self.speed;
        }
    }
}

/// Keeps one buffer on screen, repainting it every time the compositor says a new
/// frame is welcome.
pub struct RenderDriver<P: Painter = ScanLine> {
    painter: P,
    pool: MemoryPool,
    buffer: BufferDescriptor,
    state: FrameState,
    frames: u64,
    released: bool,
}

impl<P: Painter> RenderDriver<P> {
    pub fn new(pool: MemoryPool, buffer: BufferDescriptor, painter: P) -> Self {
        Self {
            painter,
            pool,
            buffer,
            state: FrameState::Idle,
            frames: 0,
            released: true,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }

    pub fn buffer(&self) -> &BufferDescriptor {
        &self.buffer
    }

    /// Whether the server gave the buffer back since the last commit.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// First cycle, run by hand: there is no fired callback to destroy yet.
    pub fn seed(
        &mut self,
        session: &mut WaylandSession,
        surface: &mut SurfaceSession,
    ) -> Result<()> {
        self.redraw(session, surface)
    }

    /// Returns `false` if `callback` is not the outstanding one.
    pub fn on_done(
        &mut self,
        session: &mut WaylandSession,
        surface: &mut SurfaceSession,
        callback: &WlCallback,
        time: u32,
    ) -> Result<bool> {
        if !surface.frame_done(session, callback) {
            warn!("Ignoring done of unexpected callback {}", callback.get_object_id());
            return Ok(false);
        }

        trace!("Frame callback {} done at {time}ms", callback.get_object_id());
        self.state = FrameState::Idle;
        self.redraw(session, surface)?;
        Ok(true)
    }

    pub fn on_release(&mut self, buffer: &WlBuffer) {
        if buffer.get_object_id() == self.buffer.buffer.get_object_id() {
            self.released = true;
        }
    }

    // TODO: wait for wl_buffer.release (or add a second buffer) before painting again,
    // the compositor may still be reading the pixels we overwrite here.
    fn redraw(&mut self, session: &mut WaylandSession, surface: &mut SurfaceSession) -> Result<()> {
        let buffer = &self.buffer;
        let mut canvas = Canvas {
            pixels: self.pool.pixels_mut(buffer),
            width: buffer.width,
            height: buffer.height,
            stride: buffer.stride,
            format: buffer.format,
        };
        self.painter.paint(&mut canvas);

        surface.request_frame(session)?;
        surface.attach_and_commit(&buffer.buffer, buffer.full_damage())?;

        self.released = false;
        self.state = FrameState::AwaitingFrame;
        self.frames += 1;
        Ok(())
    }

    /// Destroys the buffer registration, unmapping the pool.
    pub fn destroy(self, session: &mut WaylandSession) -> Result<()> {
        self.buffer.destroy(session)
    }
}
