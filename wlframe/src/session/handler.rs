use super::WaylandSession;
use crate::{
    error::Result,
    protocol::{base::*, xdg_shell::*},
    registry::GlobalAdvertisement,
};

/// Receives the events the session does not consume itself. There is one method per
/// event kind and every method defaults to doing nothing, so implementors only
/// override what they react to.
///
/// Handlers run on the dispatching thread and must not block.
#[allow(unused_variables)]
pub trait EventHandler {
    fn global(
        &mut self,
        session: &mut WaylandSession,
        registry: &WlRegistry,
        global: GlobalAdvertisement,
    ) -> Result<()> {
        Ok(())
    }

    fn global_remove(
        &mut self,
        session: &mut WaylandSession,
        registry: &WlRegistry,
        name: u32,
    ) -> Result<()> {
        Ok(())
    }

    fn shm_format(&mut self, session: &mut WaylandSession, shm: &WlShm, format: u32) -> Result<()> {
        Ok(())
    }

    fn frame_done(
        &mut self,
        session: &mut WaylandSession,
        callback: &WlCallback,
        time: u32,
    ) -> Result<()> {
        Ok(())
    }

    fn buffer_release(&mut self, session: &mut WaylandSession, buffer: &WlBuffer) -> Result<()> {
        Ok(())
    }

    fn surface_enter(
        &mut self,
        session: &mut WaylandSession,
        surface: &WlSurface,
        output: u32,
    ) -> Result<()> {
        Ok(())
    }

    fn surface_leave(
        &mut self,
        session: &mut WaylandSession,
        surface: &WlSurface,
        output: u32,
    ) -> Result<()> {
        Ok(())
    }

    fn wm_base_ping(
        &mut self,
        session: &mut WaylandSession,
        wm_base: &XdgWmBase,
        serial: u32,
    ) -> Result<()> {
        Ok(())
    }

    fn xdg_surface_configure(
        &mut self,
        session: &mut WaylandSession,
        xdg_surface: &XdgSurface,
        serial: u32,
    ) -> Result<()> {
        Ok(())
    }

    fn toplevel_configure(
        &mut self,
        session: &mut WaylandSession,
        toplevel: &XdgToplevel,
        width: i32,
        height: i32,
        states: Vec<u32>,
    ) -> Result<()> {
        Ok(())
    }

    fn toplevel_close(
        &mut self,
        session: &mut WaylandSession,
        toplevel: &XdgToplevel,
    ) -> Result<()> {
        Ok(())
    }
}

/// Ignores everything. Used for the greeting roundtrip.
impl EventHandler for () {}
