use log::{debug, info, warn};

use crate::{
    error::Result,
    protocol::{base::*, xdg_shell::*},
    registry::{GlobalAdvertisement, RegistryBinder},
    render::{Painter, RenderDriver, ScanLine},
    session::{EventHandler, WaylandSession},
    shm::{MemoryPool, ShmFormat},
    surface::{answer_ping, SurfaceSession},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    pub title: String,
    pub app_id: Option<String>,
    pub width: i32,
    pub height: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Example client".to_string(),
            app_id: None,
            width: 640,
            height: 480,
        }
    }
}

/// Everything a running window owns, handed to every event handler.
pub struct Window<P: Painter = ScanLine> {
    binder: RegistryBinder,
    surface: Option<SurfaceSession>,
    driver: Option<RenderDriver<P>>,
    running: bool,
    hung_up: bool,
}

impl<P: Painter> Window<P> {
    /// Opens a toplevel, keeps repainting it on every frame callback until the
    /// compositor closes the window or the connection, then tears everything down.
    pub fn run(session: &mut WaylandSession, config: &WindowConfig, painter: P) -> Result<()> {
        let mut window = Self {
            binder: RegistryBinder::new(session)?,
            surface: None,
            driver: None,
            running: true,
            hung_up: false,
        };

        let outcome = match window.start(session, config, painter) {
            Err(err) if err.is_connection_closed() => {
                info!("Display closed the connection before the window was shown");
                window.hung_up = true;
                Ok(())
            }
            started => started.and_then(|_| window.event_loop(session)),
        };

        window.teardown(session);
        outcome
    }

    fn start(
        &mut self,
        session: &mut WaylandSession,
        config: &WindowConfig,
        painter: P,
    ) -> Result<()> {
        // globals, then whatever the bound globals announce (shm formats)
        session.roundtrip(self)?;
        session.roundtrip(self)?;

        let globals = self.binder.globals()?;
        let format = ShmFormat::select(&globals.shm_formats)?;
        debug!("Drawing with {format:?}");

        let mut surface = SurfaceSession::create_surface(session, &globals.compositor)?;
        surface.create_window_role(session, &globals.wm_base, Some(&config.title))?;
        if let Some(app_id) = &config.app_id {
            surface.set_app_id(app_id)?;
        }
        surface.commit_initial()?;
        self.surface = Some(surface);

        while self.running && !self.is_configured() {
            session.dispatch_pending(true, self)?;
        }
        if !self.running {
            return Ok(());
        }

        let stride = config.width * format.bytes_per_pixel();
        let len = stride as usize * config.height as usize;

        let mut pool = MemoryPool::create(session, &globals.shm, len)?;
        let buffer =
            pool.create_buffer(session, 0, config.width, config.height, stride, format)?;
        pool.destroy_registration(session)?;

        let driver = self.driver.insert(RenderDriver::new(pool, buffer, painter));
        if let Some(surface) = self.surface.as_mut() {
            driver.seed(session, surface)?;
        }

        info!("Window shown at {}x{}", config.width, config.height);
        Ok(())
    }

    fn event_loop(&mut self, session: &mut WaylandSession) -> Result<()> {
        while self.running {
            match session.dispatch_pending(true, self) {
                Ok(_) => {}
                Err(err) if err.is_connection_closed() => {
                    info!("Display closed the connection");
                    self.hung_up = true;
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.surface.as_ref().is_some_and(|s| s.is_configured())
    }

    fn teardown(&mut self, session: &mut WaylandSession) {
        if self.hung_up {
            session.disconnect();
            return;
        }

        if let Some(surface) = self.surface.as_mut() {
            surface.release_frame(session);
        }

        if let Some(driver) = self.driver.take() {
            if let Err(err) = driver.destroy(session) {
                warn!("Failed to destroy the buffer: {err}");
            }
        }

        if let Some(surface) = self.surface.take() {
            if let Err(err) = surface.destroy(session) {
                warn!("Failed to destroy the surface: {err}");
            }
        }

        if let Err(err) = self.binder.destroy(session) {
            warn!("Failed to destroy the shell: {err}");
        }

        session.disconnect();
        debug!("Window torn down");
    }
}

impl<P: Painter> EventHandler for Window<P> {
    fn global(
        &mut self,
        session: &mut WaylandSession,
        _: &WlRegistry,
        global: GlobalAdvertisement,
    ) -> Result<()> {
        self.binder.on_global(session, global)
    }

    fn global_remove(&mut self, _: &mut WaylandSession, _: &WlRegistry, name: u32) -> Result<()> {
        self.binder.on_global_remove(name);
        Ok(())
    }

    fn shm_format(&mut self, _: &mut WaylandSession, _: &WlShm, format: u32) -> Result<()> {
        self.binder.on_shm_format(format);
        Ok(())
    }

    fn frame_done(
        &mut self,
        session: &mut WaylandSession,
        callback: &WlCallback,
        time: u32,
    ) -> Result<()> {
        match (self.driver.as_mut(), self.surface.as_mut()) {
            (Some(driver), Some(surface)) => {
                driver.on_done(session, surface, callback, time)?;
            }
            _ => warn!("Frame callback fired before the first frame"),
        }
        Ok(())
    }

    fn buffer_release(&mut self, _: &mut WaylandSession, buffer: &WlBuffer) -> Result<()> {
        if let Some(driver) = self.driver.as_mut() {
            driver.on_release(buffer);
        }
        Ok(())
    }

    fn wm_base_ping(
        &mut self,
        _: &mut WaylandSession,
        wm_base: &XdgWmBase,
        serial: u32,
    ) -> Result<()> {
        answer_ping(wm_base, serial)
    }

    fn xdg_surface_configure(
        &mut self,
        _: &mut WaylandSession,
        xdg_surface: &XdgSurface,
        serial: u32,
    ) -> Result<()> {
        match self.surface.as_mut() {
            Some(surface) => surface.on_configure(xdg_surface, serial),
            None => Ok(()),
        }
    }

    fn toplevel_configure(
        &mut self,
        _: &mut WaylandSession,
        _: &XdgToplevel,
        width: i32,
        height: i32,
        states: Vec<u32>,
    ) -> Result<()> {
        // the buffer keeps its size, a suggestion of 0x0 leaves it to us anyway
        debug!("Toplevel configure {width}x{height}, states {states:?}");
        Ok(())
    }

    fn toplevel_close(&mut self, _: &mut WaylandSession, _: &XdgToplevel) -> Result<()> {
        info!("Window closed by the compositor");
        self.running = false;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::Error,
        protocol::DISPLAY_ID,
        render::Canvas,
        testing::{FakeCompositor, MockTransport, SentMessage, Wire},
    };

    struct Blank;

    impl Painter for Blank {
        fn paint(&mut self, canvas: &mut Canvas<'_>) {
            canvas.pixels.fill(0);
        }
    }

    fn run_against(compositor: FakeCompositor, config: &WindowConfig) -> (Result<()>, Wire) {
        let (transport, wire) = compositor.into_transport();
        let mut session = WaylandSession::with_transport(Box::new(transport));
        let outcome = Window::run(&mut session, config, Blank);
        (outcome, wire)
    }

    fn small() -> WindowConfig {
        WindowConfig {
            width: 32,
            height: 16,
            ..WindowConfig::default()
        }
    }

    fn position(sent: &[SentMessage], pred: impl Fn(&SentMessage) -> bool) -> usize {
        sent.iter().position(pred).unwrap()
    }

    /// The new id carried by the first `opcode` request sent to `object_id`.
    fn created(sent: &[SentMessage], object_id: u32, opcode: u16) -> u32 {
        sent.iter()
            .find(|m| m.object_id == object_id && m.opcode == opcode)
            .map(|m| m.arg_u32(0))
            .unwrap()
    }

    fn bound_id(sent: &[SentMessage], global_name: u32) -> u32 {
        let registry = created(sent, DISPLAY_ID, 1);
        let bind = sent
            .iter()
            .find(|m| m.object_id == registry && m.arg_u32(0) == global_name)
            .unwrap();
        // name, interface (length word + padded string), version, new_id
        let words = bind.payload.len() / 4;
        bind.arg_u32(words - 1)
    }

    #[test]
    fn window_paints_every_frame_until_closed() {
        let mut compositor = FakeCompositor::new(3);
        compositor.close_when_done = true;

        let (outcome, wire) = run_against(compositor, &small());
        outcome.unwrap();

        let sent = wire.sent();
        let compositor_id = bound_id(&sent, 1);
        let shm_id = bound_id(&sent, 3);
        let surface_id = created(&sent, compositor_id, 0);

        // the pool carries the descriptor, sized width * 4 * height
        let create_pool = sent.iter().find(|m| m.object_id == shm_id).unwrap();
        assert_eq!(create_pool.fds, 1);
        assert_eq!(create_pool.arg_u32(1), 32 * 4 * 16);

        let attaches = sent
            .iter()
            .filter(|m| m.object_id == surface_id && m.opcode == 1)
            .count();
        let frames = sent
            .iter()
            .filter(|m| m.object_id == surface_id && m.opcode == 3)
            .count();
        // seed plus one per answered frame
        assert_eq!(attaches, 4);
        assert_eq!(frames, 4);

        assert!(wire.is_closed());
    }

    #[test]
    fn first_buffer_waits_for_the_configure_ack() {
        let (outcome, wire) = run_against(FakeCompositor::new(1), &small());
        outcome.unwrap();

        let sent = wire.sent();
        let wm_base = bound_id(&sent, 2);
        let xdg_surface = created(&sent, wm_base, 2);
        let surface_id = created(&sent, bound_id(&sent, 1), 0);

        let ack = position(&sent, |m| m.object_id == xdg_surface && m.opcode == 4);
        let first_attach = position(&sent, |m| m.object_id == surface_id && m.opcode == 1);
        assert_eq!(sent[ack].arg_u32(0), 77);
        assert!(ack < first_attach);
    }

    #[test]
    fn clean_close_tears_down_in_order() {
        let mut compositor = FakeCompositor::new(1);
        compositor.close_when_done = true;

        let (outcome, wire) = run_against(compositor, &small());
        outcome.unwrap();

        let sent = wire.sent();
        let wm_base = bound_id(&sent, 2);
        let shm_id = bound_id(&sent, 3);
        let surface_id = created(&sent, bound_id(&sent, 1), 0);
        let xdg_surface = created(&sent, wm_base, 2);
        let toplevel = created(&sent, xdg_surface, 1);
        let pool = created(&sent, shm_id, 0);
        let buffer = created(&sent, pool, 0);

        let destroys: Vec<u32> = sent
            .iter()
            .skip_while(|m| !(m.object_id == buffer && m.opcode == 0))
            .map(|m| m.object_id)
            .collect();
        assert_eq!(destroys, vec![buffer, toplevel, xdg_surface, surface_id, wm_base]);
    }

    #[test]
    fn hang_up_ends_the_loop_normally() {
        let (outcome, wire) = run_against(FakeCompositor::new(2), &small());
        outcome.unwrap();

        let sent = wire.sent();
        let surface_id = created(&sent, bound_id(&sent, 1), 0);
        // nothing is sent to a peer that is gone
        assert_eq!(sent.last().map(|m| (m.object_id, m.opcode)), Some((surface_id, 6)));
        assert!(wire.is_closed());
    }

    #[test]
    fn hang_up_before_configure_is_not_an_error() {
        let mut compositor = FakeCompositor::new(0);
        // swallow every commit, so the configure never comes
        let (transport, wire) = MockTransport::new(move |msg| match msg.opcode {
            6 => Vec::new(),
            _ => compositor.respond(msg),
        });
        let mut session = WaylandSession::with_transport(Box::new(transport));

        Window::run(&mut session, &small(), Blank).unwrap();

        let sent = wire.sent();
        let surface_id = created(&sent, bound_id(&sent, 1), 0);
        assert_eq!(sent.last().map(|m| (m.object_id, m.opcode)), Some((surface_id, 6)));
        assert!(wire.is_closed());
    }

    #[test]
    fn oversized_title_is_an_error() {
        let config = WindowConfig {
            title: "a".repeat(5000),
            ..small()
        };
        let (outcome, wire) = run_against(FakeCompositor::new(0), &config);

        assert!(matches!(
            outcome,
            Err(Error::Transport(err)) if err.kind() == std::io::ErrorKind::InvalidInput
        ));
        assert!(wire.is_closed());
    }

    #[test]
    fn ping_is_answered() {
        let mut compositor = FakeCompositor::new(0);
        compositor.ping_serial = Some(5);

        let (outcome, wire) = run_against(compositor, &small());
        outcome.unwrap();

        let sent = wire.sent();
        let wm_base = bound_id(&sent, 2);
        let pong = sent
            .iter()
            .find(|m| m.object_id == wm_base && m.opcode == 3)
            .unwrap();
        assert_eq!(pong.arg_u32(0), 5);
    }

    #[test]
    fn app_id_follows_the_title() {
        let config = WindowConfig {
            app_id: Some("org.example.scanline".to_string()),
            ..small()
        };
        let (outcome, wire) = run_against(FakeCompositor::new(0), &config);
        outcome.unwrap();

        let sent = wire.sent();
        let xdg_surface = created(&sent, bound_id(&sent, 2), 2);
        let toplevel = created(&sent, xdg_surface, 1);
        let title = position(&sent, |m| m.object_id == toplevel && m.opcode == 2);
        let app_id = position(&sent, |m| m.object_id == toplevel && m.opcode == 3);
        assert_eq!(app_id, title + 1);
    }

    #[test]
    fn missing_global_aborts_before_any_surface() {
        let mut compositor = FakeCompositor::new(0);
        compositor.globals.retain(|(_, interface, _)| *interface != "xdg_wm_base");

        let (outcome, wire) = run_against(compositor, &small());

        assert!(matches!(
            outcome,
            Err(Error::MissingGlobal(crate::registry::Capability::Shell))
        ));
        let compositor_id = bound_id(&wire.sent(), 1);
        assert!(wire.sent().iter().all(|m| m.object_id != compositor_id));
        assert!(wire.is_closed());
    }

    #[test]
    fn no_common_format_is_an_error() {
        let mut compositor = FakeCompositor::new(0);
        compositor.formats = vec![0x34325258];

        let (outcome, _) = run_against(compositor, &small());
        assert!(matches!(outcome, Err(Error::UnsupportedFormat)));
    }
}
