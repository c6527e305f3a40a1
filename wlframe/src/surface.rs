use log::{debug, info, warn};

use crate::{
    error::{Error, Result},
    protocol::{base::*, xdg_shell::*, WaylandId, WlInterface},
    session::WaylandSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn sized(width: i32, height: i32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WindowRole {
    pub xdg_surface: XdgSurface,
    pub toplevel: XdgToplevel,
}

/// Where the single frame callback of a surface is in its life.
#[derive(Debug)]
enum FrameSlot {
    Empty,
    /// `wl_surface.frame` sent, not committed yet.
    Requested(WlCallback),
    /// Committed, waiting for `done`.
    Committed(WlCallback),
}

pub struct SurfaceSession {
    surface: WlSurface,
    role: Option<WindowRole>,
    configured: bool,
    attached: Option<WaylandId>,
    frame: FrameSlot,
}

impl SurfaceSession {
    pub fn create_surface(session: &mut WaylandSession, compositor: &WlCompositor) -> Result<Self> {
        let surface: WlSurface = session.new_object();
        compositor.create_surface(&surface)?;

        Ok(Self {
            surface,
            role: None,
            configured: false,
            attached: None,
            frame: FrameSlot::Empty,
        })
    }

    pub fn surface(&self) -> &WlSurface {
        &self.surface
    }

    pub fn role(&self) -> Option<&WindowRole> {
        self.role.as_ref()
    }

    /// Turns the surface into a toplevel window: surface → xdg_surface → xdg_toplevel.
    pub fn create_window_role(
        &mut self,
        session: &mut WaylandSession,
        wm_base: &XdgWmBase,
        title: Option<&str>,
    ) -> Result<&WindowRole> {
        let xdg_surface: XdgSurface = session.new_object();
        wm_base.get_xdg_surface(&xdg_surface, &self.surface)?;

        let toplevel: XdgToplevel = session.new_object();
        xdg_surface.get_toplevel(&toplevel)?;

        if let Some(title) = title {
            toplevel.set_title(title)?;
        }

        Ok(self.role.insert(WindowRole {
            xdg_surface,
            toplevel,
        }))
    }

    pub fn set_app_id(&self, app_id: &str) -> Result<()> {
        if let Some(role) = &self.role {
            role.toplevel.set_app_id(app_id)?;
        }
        Ok(())
    }

    /// A commit without a buffer, which is what makes the compositor send the first
    /// configure.
    pub fn commit_initial(&self) -> Result<()> {
        self.surface.commit()?;
        Ok(())
    }

    pub fn on_configure(&mut self, xdg_surface: &XdgSurface, serial: u32) -> Result<()> {
        let ours = self
            .role
            .as_ref()
            .is_some_and(|r| r.xdg_surface.get_object_id() == xdg_surface.get_object_id());
        if !ours {
            warn!("Configure for foreign xdg_surface {}", xdg_surface.get_object_id());
            return Ok(());
        }

        xdg_surface.ack_configure(serial)?;
        if !self.configured {
            info!("Surface configured (serial {serial})");
        }
        self.configured = true;
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn attached(&self) -> Option<WaylandId> {
        self.attached
    }

    pub fn outstanding_frame(&self) -> Option<&WlCallback> {
        match &self.frame {
            FrameSlot::Empty => None,
            FrameSlot::Requested(callback) | FrameSlot::Committed(callback) => Some(callback),
        }
    }

    /// Asks for the next frame callback, to be committed with the next
    /// [`attach_and_commit`](Self::attach_and_commit).
    pub fn request_frame(&mut self, session: &mut WaylandSession) -> Result<WlCallback> {
        if !matches!(self.frame, FrameSlot::Empty) {
            return Err(Error::FrameOutstanding);
        }

        let callback: WlCallback = session.new_object();
        self.surface.frame(&callback)?;
        self.frame = FrameSlot::Requested(callback.clone());
        Ok(callback)
    }

    /// attach, damage, commit; in this order and nothing in between.
    pub fn attach_and_commit(&mut self, buffer: &WlBuffer, damage: Rect) -> Result<()> {
        if let FrameSlot::Committed(_) = self.frame {
            return Err(Error::FrameOutstanding);
        }

        self.surface.attach(Some(buffer), 0, 0)?;
        self.surface
            .damage(damage.x, damage.y, damage.width, damage.height)?;
        self.surface.commit()?;

        self.attached = Some(buffer.get_object_id());
        self.frame = match std::mem::replace(&mut self.frame, FrameSlot::Empty) {
            FrameSlot::Requested(callback) => FrameSlot::Committed(callback),
            other => other,
        };
        Ok(())
    }

    /// Consumes the fired callback. `false` if it is not the one this surface waits on.
    pub fn frame_done(&mut self, session: &mut WaylandSession, callback: &WlCallback) -> bool {
        let matches = self
            .outstanding_frame()
            .is_some_and(|c| c.get_object_id() == callback.get_object_id());

        if matches {
            self.frame = FrameSlot::Empty;
            session.release_object(callback.get_object_id());
        }
        matches
    }

    /// Forgets the pending callback, if any. `wl_callback` has no destructor request.
    pub fn release_frame(&mut self, session: &mut WaylandSession) {
        if let Some(callback) = self.outstanding_frame() {
            let id = callback.get_object_id();
            debug!("Releasing pending frame callback {id}");
            session.release_object(id);
        }
        self.frame = FrameSlot::Empty;
    }

    /// Destroys the role objects, then the surface.
    pub fn destroy(mut self, session: &mut WaylandSession) -> Result<()> {
        self.release_frame(session);

        if let Some(role) = self.role.take() {
            role.toplevel.destroy()?;
            session.release_object(role.toplevel.get_object_id());
            role.xdg_surface.destroy()?;
            session.release_object(role.xdg_surface.get_object_id());
        }

        self.surface.destroy()?;
        session.release_object(self.surface.get_object_id());
        Ok(())
    }
}

/// Answers the shell's liveness check.
pub fn answer_ping(wm_base: &XdgWmBase, serial: u32) -> Result<()> {
    wm_base.pong(serial)?;
    info!("Pinged by the shell, answered pong {serial}");
    Ok(())
}
