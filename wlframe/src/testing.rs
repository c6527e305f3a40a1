//! In-memory transport standing in for a compositor in unit tests.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    io,
    os::fd::RawFd,
    rc::Rc,
};

use crate::{
    protocol::{WaylandId, WireMessage, WireValue, WireValue::*, WlOpcode, DISPLAY_ID},
    transport::Transport,
    wire_format::{
        encode,
        parsing::{parse_str, parse_u32, Cursor},
        WireMsgHeader,
    },
};

/// Encodes an event exactly like the server would put it on the wire.
pub fn event(object_id: WaylandId, opcode: WlOpcode, values: &[WireValue]) -> Vec<u8> {
    encode(&WireMessage {
        object_id,
        opcode,
        values,
    })
    .unwrap()
    .bytes
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub object_id: WaylandId,
    pub opcode: WlOpcode,
    pub payload: Vec<u8>,
    pub fds: usize,
}

impl SentMessage {
    /// The `index`-th 32 bit word of the payload.
    pub fn arg_u32(&self, index: usize) -> u32 {
        let mut cursor = Cursor::new(&self.payload[index * 4..]);
        parse_u32(&mut cursor).unwrap()
    }

    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.payload)
    }
}

type Responder = Box<dyn FnMut(&SentMessage) -> Vec<Vec<u8>>>;

#[derive(Default)]
struct WireState {
    sent: Vec<SentMessage>,
    incoming: VecDeque<u8>,
    closed: bool,
}

/// Test side view of a `MockTransport`.
#[derive(Clone, Default)]
pub struct Wire(Rc<RefCell<WireState>>);

impl Wire {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.0.borrow().sent.clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().sent.clear();
    }

    pub fn push(&self, bytes: Vec<u8>) {
        self.0.borrow_mut().incoming.extend(bytes);
    }

    pub fn is_closed(&self) -> bool {
        self.0.borrow().closed
    }
}

pub struct MockTransport {
    wire: Wire,
    responder: Responder,
}

impl MockTransport {
    pub fn new(responder: impl FnMut(&SentMessage) -> Vec<Vec<u8>> + 'static) -> (Self, Wire) {
        let wire = Wire::default();
        let transport = Self {
            wire: wire.clone(),
            responder: Box::new(responder),
        };
        (transport, wire)
    }

    pub fn silent() -> (Self, Wire) {
        Self::new(|_| Vec::new())
    }
}

impl Transport for MockTransport {
    fn send(&mut self, bytes: &[u8], fds: &[RawFd]) -> io::Result<usize> {
        if self.wire.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock closed"));
        }

        let header = WireMsgHeader::build(bytes);
        assert_eq!(header.length as usize, bytes.len(), "one request per send");

        let msg = SentMessage {
            object_id: header.object_id,
            opcode: header.opcode,
            payload: bytes[WireMsgHeader::WIRE_SIZE..].to_vec(),
            fds: fds.len(),
        };

        let replies = (self.responder)(&msg);
        let mut state = self.wire.0.borrow_mut();
        state.sent.push(msg);
        for reply in replies {
            state.incoming.extend(reply);
        }

        Ok(bytes.len())
    }

    // An empty queue on a blocking read means nothing will ever arrive: report EOF
    // instead of hanging the test.
    fn receive(&mut self, buffer: &mut [u8], blocking: bool) -> io::Result<usize> {
        let mut state = self.wire.0.borrow_mut();
        if state.incoming.is_empty() {
            return if blocking || state.closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }

        let size = buffer.len().min(state.incoming.len());
        for (slot, byte) in buffer.iter_mut().zip(state.incoming.drain(..size)) {
            *slot = byte;
        }
        Ok(size)
    }

    fn close(&mut self) {
        self.wire.0.borrow_mut().closed = true;
    }
}

/// A scripted compositor: answers syncs, advertises globals, configures the first
/// toplevel and fires a bounded number of frame callbacks.
pub struct FakeCompositor {
    pub globals: Vec<(u32, &'static str, u32)>,
    pub formats: Vec<u32>,
    pub frames_to_answer: usize,
    pub frames_answered: usize,
    pub ping_serial: Option<u32>,
    /// Sends `xdg_toplevel.close` along with the last answered frame.
    pub close_when_done: bool,
    bound: HashMap<&'static str, WaylandId>,
    registry: Option<WaylandId>,
    surface: Option<WaylandId>,
    xdg_surface: Option<WaylandId>,
    toplevel: Option<WaylandId>,
    pending_frame: Option<WaylandId>,
    configured: bool,
    time: u32,
}

impl FakeCompositor {
    pub fn new(frames_to_answer: usize) -> Self {
        Self {
            globals: vec![(1, "wl_compositor", 1), (2, "xdg_wm_base", 1), (3, "wl_shm", 1)],
            formats: vec![0, 1],
            frames_to_answer,
            frames_answered: 0,
            ping_serial: None,
            close_when_done: false,
            bound: HashMap::new(),
            registry: None,
            surface: None,
            xdg_surface: None,
            toplevel: None,
            pending_frame: None,
            configured: false,
            time: 0,
        }
    }

    pub fn into_transport(self) -> (MockTransport, Wire) {
        let mut compositor = self;
        MockTransport::new(move |msg| compositor.respond(msg))
    }

    fn bound(&self, interface: &str) -> Option<WaylandId> {
        self.bound.get(interface).copied()
    }

    pub fn respond(&mut self, msg: &SentMessage) -> Vec<Vec<u8>> {
        let target = Some(msg.object_id);
        let mut replies = Vec::new();

        if msg.object_id == DISPLAY_ID {
            match msg.opcode {
                // sync
                0 => {
                    let callback = msg.arg_u32(0);
                    replies.push(event(callback, 0, &[Uint32(self.time)]));
                    replies.push(event(DISPLAY_ID, 1, &[Uint32(callback)]));
                }
                // get_registry
                _ => {
                    let registry = msg.arg_u32(0);
                    self.registry = Some(registry);
                    for (name, interface, version) in &self.globals {
                        replies.push(event(
                            registry,
                            0,
                            &[Uint32(*name), Str(interface.to_string()), Uint32(*version)],
                        ));
                    }
                }
            }
        } else if target == self.registry {
            let mut cursor = msg.cursor();
            let name = parse_u32(&mut cursor).unwrap();
            let _interface = parse_str(&mut cursor).unwrap();
            let _version = parse_u32(&mut cursor).unwrap();
            let new_id = parse_u32(&mut cursor).unwrap();

            let interface = self
                .globals
                .iter()
                .find(|(n, _, _)| *n == name)
                .map(|(_, interface, _)| *interface)
                .unwrap();
            self.bound.insert(interface, new_id);

            if interface == "wl_shm" {
                for format in &self.formats {
                    replies.push(event(new_id, 0, &[Uint32(*format)]));
                }
            }
        } else if target.is_some() && target == self.bound("wl_compositor") && msg.opcode == 0 {
            self.surface = Some(msg.arg_u32(0));
        } else if target.is_some() && target == self.bound("xdg_wm_base") && msg.opcode == 2 {
            self.xdg_surface = Some(msg.arg_u32(0));
        } else if target.is_some() && target == self.xdg_surface && msg.opcode == 1 {
            self.toplevel = Some(msg.arg_u32(0));
        } else if target.is_some() && target == self.surface {
            match msg.opcode {
                // frame
                3 => self.pending_frame = Some(msg.arg_u32(0)),
                // commit
                6 if !self.configured => {
                    self.configured = true;
                    if let Some(serial) = self.ping_serial {
                        let wm_base = self.bound("xdg_wm_base").unwrap();
                        replies.push(event(wm_base, 0, &[Uint32(serial)]));
                    }
                    replies.push(event(
                        self.toplevel.unwrap(),
                        0,
                        &[Int32(0), Int32(0), Array(Vec::new())],
                    ));
                    replies.push(event(self.xdg_surface.unwrap(), 0, &[Uint32(77)]));
                }
                6 if self.frames_answered < self.frames_to_answer => {
                    if let Some(frame) = self.pending_frame.take() {
                        self.frames_answered += 1;
                        self.time += 16;
                        replies.push(event(frame, 0, &[Uint32(self.time)]));
                        replies.push(event(DISPLAY_ID, 1, &[Uint32(frame)]));

                        if self.close_when_done && self.frames_answered == self.frames_to_answer {
                            replies.push(event(self.toplevel.unwrap(), 1, &[]));
                        }
                    }
                }
                _ => {}
            }
        }

        replies
    }
}
