use crate::{error, wire_format::parsing};
use std::{fmt, os::fd::RawFd, rc::Rc};

pub mod base;
mod macros;
pub mod xdg_shell;

#[allow(unused_imports)]
pub use self::WireValue::*;

use self::{base::*, xdg_shell::*};
use macros::{declare_interfaces, declare_routing};

pub type WaylandId = u32;
pub type WlOpcode = u16;

/// `wl_display` is the only object both sides know about before any request.
pub const DISPLAY_ID: WaylandId = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    Uint32(u32),
    Int32(i32),
    Str(String),
    Array(Vec<u8>),
    FileDesc(RawFd),
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uint32(v) => write!(f, "{v}"),
            Int32(v) => write!(f, "{v}"),
            Str(v) => write!(f, "{v:?}"),
            Array(v) => write!(f, "{v:?}"),
            FileDesc(v) => write!(f, "fd {v}"),
        }
    }
}

#[derive(Debug)]
pub struct WireMessage<'a> {
    pub object_id: WaylandId,
    pub opcode: WlOpcode,
    pub values: &'a [WireValue],
}

// Implementations of this trait are expected to use interior mutability
// (https://doc.rust-lang.org/reference/interior-mutability.html)
pub trait WaylandStream {
    fn send(&self, msg: WireMessage<'_>) -> error::Result<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub object_id: WaylandId,
    pub opcode: WlOpcode,
    pub payload: Box<[u8]>,
}

pub trait WlInterface: Sized {
    type Event: fmt::Debug;

    const INTERFACE: Interface;
    const WIRE_NAME: &'static str;

    fn get_object_id(&self) -> WaylandId;

    fn build(object_id: WaylandId, stream: Rc<dyn WaylandStream>) -> Self;

    fn parse_event(
        sender: WaylandId,
        opcode: WlOpcode,
        cursor: &mut parsing::Cursor<'_>,
    ) -> Result<Self::Event, WlEventParseError>;

    fn parse_msg(msg: &RawMessage) -> Result<Self::Event, WlEventParseError> {
        let mut cursor = parsing::Cursor::new(&msg.payload);
        let event = Self::parse_event(msg.object_id, msg.opcode, &mut cursor)?;

        match cursor.remaining() {
            0 => Ok(event),
            extra => Err(WlEventParseError::TrailingBytes {
                extra,
                event: format!("{event:?}"),
            }),
        }
    }
}

#[derive(Clone)]
pub struct WlObjectMetaData {
    object_id: WaylandId,
    stream: Rc<dyn WaylandStream>,
}

impl fmt::Debug for WlObjectMetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WlObjectMetaData")
            .field("object_id", &self.object_id)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WlEventParseError {
    #[error("no event with opcode {0}")]
    NoEvent(WlOpcode),
    #[error(transparent)]
    Parsing(#[from] parsing::Error),
    #[error("found {extra} extra bytes while parsing {event}")]
    TrailingBytes { extra: usize, event: String },
}

declare_routing! {
    WlDisplay,
    WlRegistry,
    WlCallback,
    WlCompositor,
    WlRegion,
    WlSurface,
    WlShm,
    WlShmPool,
    WlBuffer,
    XdgWmBase,
    XdgSurface,
    XdgToplevel,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
