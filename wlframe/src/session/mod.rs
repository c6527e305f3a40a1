mod handler;
mod objects;

use std::{cell::RefCell, collections::HashSet, io, os::fd::RawFd, rc::Rc};

use log::{debug, info, trace, warn};

pub use handler::EventHandler;
use objects::{ByteBuffer, ObjectManager};

use crate::{
    error::{error_context, Error, Result},
    protocol::{base::*, xdg_shell::*, *},
    registry::GlobalAdvertisement,
    transport::{Transport, UnixTransport},
    wire_format,
};

/// Shared by every proxy, so requests can be issued from anywhere on the thread.
pub struct ClientStream(RefCell<Box<dyn Transport>>);

impl ClientStream {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self(RefCell::new(transport))
    }

    fn receive(&self, buffer: &mut [u8], blocking: bool) -> io::Result<usize> {
        self.0.borrow_mut().receive(buffer, blocking)
    }

    fn close(&self) {
        self.0.borrow_mut().close()
    }
}

impl WaylandStream for ClientStream {
    fn send(&self, msg: WireMessage<'_>) -> Result<usize> {
        let encoded = wire_format::encode(&msg)?;
        let fds: &[RawFd] = &encoded.fds;
        Ok(self.0.borrow_mut().send(&encoded.bytes, fds)?)
    }
}

pub struct WaylandSession {
    objects: ObjectManager,
    stream: Rc<ClientStream>,
    buffer: ByteBuffer,
    display: WlDisplay,
    pending_syncs: HashSet<WaylandId>,
}

impl WaylandSession {
    /// Connects to `target` (or the default display) and makes sure the other end
    /// answers a `wl_display.sync`.
    pub fn connect(target: Option<&str>) -> Result<Self> {
        let transport = UnixTransport::connect(target)?;
        let mut session = Self::with_transport(Box::new(transport));

        session.roundtrip(&mut ()).map_err(|e| {
            Error::Connection(format!("display did not answer the initial sync: {e}"))
        })?;

        info!("Connected to the display");
        Ok(session)
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        let stream = Rc::new(ClientStream::new(transport));
        Self {
            objects: ObjectManager::new(),
            display: WlDisplay::build(DISPLAY_ID, stream.clone()),
            buffer: ByteBuffer::new(),
            pending_syncs: HashSet::new(),
            stream,
        }
    }

    pub fn display(&self) -> &WlDisplay {
        &self.display
    }

    /// A fresh id, greater than every id handed out before.
    pub fn allocate_id(&mut self) -> WaylandId {
        self.objects.allocate_id()
    }

    pub fn new_object<T: WlInterface>(&mut self) -> T {
        let object_id = self.allocate_id();
        self.objects.insert(object_id, T::INTERFACE);
        T::build(object_id, self.stream.clone())
    }

    /// A proxy for a live object, if it has the expected interface.
    pub fn get_reference<T: WlInterface>(&self, object_id: WaylandId) -> Option<T> {
        match self.objects.get(object_id) {
            Some(entry) if entry.interface == T::INTERFACE && !entry.released => {
                Some(T::build(object_id, self.stream.clone()))
            }
            _ => None,
        }
    }

    pub fn require_reference<T: WlInterface>(&self, object_id: WaylandId) -> Result<T> {
        self.get_reference(object_id).ok_or(Error::NoSuchObject(object_id))
    }

    /// Marks an object as given up on the client side. Events still in flight for it
    /// are dropped; the id itself is only forgotten on `delete_id`.
    pub fn release_object(&mut self, object_id: WaylandId) {
        if !self.objects.release(object_id) {
            debug!("Object {object_id} was already released");
        }
    }

    pub fn is_live(&self, object_id: WaylandId) -> bool {
        self.objects.get(object_id).is_some_and(|e| !e.released)
    }

    pub fn live_count(&self, interface: Interface) -> usize {
        self.objects.live_count(interface)
    }

    pub fn send(
        &self,
        object_id: WaylandId,
        opcode: WlOpcode,
        values: &[WireValue],
    ) -> Result<usize> {
        self.stream.send(WireMessage {
            object_id,
            opcode,
            values,
        })
    }

    /// Routes every complete message to `handler`. With `blocking` set, waits until
    /// at least one message was handled. A peer that hung up is reported as
    /// `Error::ConnectionClosed` once nothing is left to handle.
    pub fn dispatch_pending<H>(&mut self, blocking: bool, handler: &mut H) -> Result<usize>
    where
        H: EventHandler + ?Sized,
    {
        let mut processed = self.dispatch_buffered(handler)?;

        loop {
            let wait = blocking && processed == 0;
            match self.buffer.fill(&self.stream, wait) {
                Ok(0) if processed > 0 => return Ok(processed),
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(_) => processed += self.dispatch_buffered(handler)?,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(processed),
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Blocks until the server has handled every request sent so far.
    pub fn roundtrip<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: EventHandler + ?Sized,
    {
        let callback: WlCallback = self.new_object();
        let sync_id = callback.get_object_id();
        self.display.sync(&callback)?;
        self.pending_syncs.insert(sync_id);

        while self.pending_syncs.contains(&sync_id) {
            self.dispatch_pending(true, handler)?;
        }

        trace!("Roundtrip {sync_id} completed");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.stream.close();
    }

    fn dispatch_buffered<H>(&mut self, handler: &mut H) -> Result<usize>
    where
        H: EventHandler + ?Sized,
    {
        let mut processed = 0;
        while let Some(msg) = self.buffer.next_message()? {
            self.handle_msg(msg, handler)?;
            processed += 1;
        }
        Ok(processed)
    }

    fn handle_msg<H>(&mut self, msg: RawMessage, handler: &mut H) -> Result<()>
    where
        H: EventHandler + ?Sized,
    {
        let object_id = msg.object_id;

        let Some(entry) = self.objects.get(object_id) else {
            warn!("Received event {} for unknown object {object_id}", msg.opcode);
            return Ok(());
        };

        if entry.released {
            trace!("Dropping event {} for released object {object_id}", msg.opcode);
            return Ok(());
        }

        let event = match entry.interface.parse(&msg) {
            Err(WlEventParseError::NoEvent(opcode)) => {
                warn!("Unknown event {opcode} for {object_id} @ {}", entry.interface);
                return Ok(());
            }
            other => error_context!(other, "Of object {object_id} @ {}", entry.interface)?,
        };

        self.route(object_id, event, handler)
    }

    fn route<H>(&mut self, object_id: WaylandId, event: Event, handler: &mut H) -> Result<()>
    where
        H: EventHandler + ?Sized,
    {
        match event {
            Event::WlDisplay(WlDisplayEvent::Error {
                object_id,
                code,
                message,
            }) => Err(Error::Protocol {
                object_id,
                code,
                message,
            }),

            Event::WlDisplay(WlDisplayEvent::DeleteId { id }) => {
                match self.objects.remove(id) {
                    Some(entry) => debug!("Deleting object {id} @ {}", entry.interface),
                    None => debug!("Received delete for a non existent object {id}"),
                }
                Ok(())
            }

            Event::WlCallback(WlCallbackEvent::Done { .. })
                if self.pending_syncs.remove(&object_id) =>
            {
                self.objects.release(object_id);
                Ok(())
            }

            Event::WlCallback(WlCallbackEvent::Done { data }) => {
                let callback: WlCallback = self.proxy(object_id);
                handler.frame_done(self, &callback, data)
            }

            Event::WlRegistry(WlRegistryEvent::Global {
                name,
                interface,
                version,
            }) => {
                let registry: WlRegistry = self.proxy(object_id);
                let global = GlobalAdvertisement {
                    name,
                    interface,
                    version,
                };
                handler.global(self, &registry, global)
            }

            Event::WlRegistry(WlRegistryEvent::GlobalRemove { name }) => {
                let registry: WlRegistry = self.proxy(object_id);
                handler.global_remove(self, &registry, name)
            }

            Event::WlShm(WlShmEvent::Format { format }) => {
                let shm: WlShm = self.proxy(object_id);
                handler.shm_format(self, &shm, format)
            }

            Event::WlBuffer(WlBufferEvent::Release {}) => {
                let buffer: WlBuffer = self.proxy(object_id);
                handler.buffer_release(self, &buffer)
            }

            Event::WlSurface(WlSurfaceEvent::Enter { output }) => {
                let surface: WlSurface = self.proxy(object_id);
                handler.surface_enter(self, &surface, output)
            }

            Event::WlSurface(WlSurfaceEvent::Leave { output }) => {
                let surface: WlSurface = self.proxy(object_id);
                handler.surface_leave(self, &surface, output)
            }

            Event::XdgWmBase(XdgWmBaseEvent::Ping { serial }) => {
                let wm_base: XdgWmBase = self.proxy(object_id);
                handler.wm_base_ping(self, &wm_base, serial)
            }

            Event::XdgSurface(XdgSurfaceEvent::Configure { serial }) => {
                let xdg_surface: XdgSurface = self.proxy(object_id);
                handler.xdg_surface_configure(self, &xdg_surface, serial)
            }

            Event::XdgToplevel(XdgToplevelEvent::Configure {
                width,
                height,
                states,
            }) => {
                let toplevel: XdgToplevel = self.proxy(object_id);
                handler.toplevel_configure(self, &toplevel, width, height, states)
            }

            Event::XdgToplevel(XdgToplevelEvent::Close {}) => {
                let toplevel: XdgToplevel = self.proxy(object_id);
                handler.toplevel_close(self, &toplevel)
            }

            other => {
                debug!("Ignoring {other:?} for object {object_id}");
                Ok(())
            }
        }
    }

    #[inline]
    fn proxy<T: WlInterface>(&self, object_id: WaylandId) -> T {
        T::build(object_id, self.stream.clone())
    }
}

impl Drop for WaylandSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
