use std::io;

use crate::{
    protocol::{WaylandId, WlEventParseError},
    registry::Capability,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to connect to the display: {0}")]
    Connection(String),

    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    #[error("connection closed by the server")]
    ConnectionClosed,

    #[error("protocol error {code} on object {object_id}: {message:?}")]
    Protocol {
        object_id: WaylandId,
        code: u32,
        message: String,
    },

    #[error("malformed event: {0}")]
    Parse(#[from] WlEventParseError),

    #[error("required global '{0}' was never advertised")]
    MissingGlobal(Capability),

    #[error("shared memory allocation failed: {0}")]
    Allocation(String),

    #[error("buffer at {offset} ({height} rows of {stride} bytes) exceeds a {pool_len} byte pool")]
    OutOfBounds {
        offset: i32,
        height: i32,
        stride: i32,
        pool_len: usize,
    },

    #[error("stride {stride} is too small for {width} pixels")]
    InvalidStride { width: i32, stride: i32 },

    #[error("none of the supported pixel formats were advertised")]
    UnsupportedFormat,

    #[error("a frame callback is still outstanding")]
    FrameOutstanding,

    #[error("no such object {0}")]
    NoSuchObject(WaylandId),

    #[error("{message}: {error}")]
    Context { error: Box<Error>, message: String },
}

impl Error {
    /// Orderly shutdown, possibly wrapped in context.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Context { error, .. } => error.is_connection_closed(),
            _ => false,
        }
    }
}

macro_rules! allocation_error {
    ($($t : tt)*) => { crate::error::Error::Allocation(format!($($t)*)) }
}

macro_rules! error_context {
    ($result : expr, $($t : tt)*) => {
        $result.map_err(|e| crate::error::Error::Context {
            error   : Box::new(e.into()),
            message : format!($($t)*)
        })
    };
}

pub(crate) use allocation_error;
pub(crate) use error_context;
