use std::{collections::HashMap, io};

use log::trace;

use super::ClientStream;
use crate::{
    error::{Error, Result},
    protocol::{Interface, RawMessage, WaylandId, DISPLAY_ID},
    wire_format::{WireMsgHeader, MAX_MESSAGE_SIZE},
};

/// Upper end of the id range reserved for client-created objects.
const MAX_CLIENT_ID: WaylandId = 0xFEFF_FFFF;

#[derive(Debug, Clone, Copy)]
pub(super) struct ObjectEntry {
    pub interface: Interface,
    /// Set once the client gave the object up. The entry stays until the server
    /// acknowledges with `wl_display.delete_id`.
    pub released: bool,
}

pub(super) struct ObjectManager {
    objects: HashMap<WaylandId, ObjectEntry>,
    last_id: WaylandId,
}

impl ObjectManager {
    pub fn new() -> Self {
        let mut objects = HashMap::new();
        objects.insert(
            DISPLAY_ID,
            ObjectEntry {
                interface: Interface::WlDisplay,
                released: false,
            },
        );

        Self {
            objects,
            last_id: DISPLAY_ID,
        }
    }

    // Ids are never handed out twice, even after the server deleted them.
    pub fn allocate_id(&mut self) -> WaylandId {
        assert!(self.last_id < MAX_CLIENT_ID, "client object ids exhausted");
        self.last_id += 1;
        self.last_id
    }

    pub fn insert(&mut self, object_id: WaylandId, interface: Interface) {
        let previous = self.objects.insert(
            object_id,
            ObjectEntry {
                interface,
                released: false,
            },
        );
        assert!(previous.is_none(), "object {object_id} registered twice");
    }

    pub fn get(&self, object_id: WaylandId) -> Option<ObjectEntry> {
        self.objects.get(&object_id).copied()
    }

    /// Returns `false` when the object was unknown or already released.
    pub fn release(&mut self, object_id: WaylandId) -> bool {
        match self.objects.get_mut(&object_id) {
            Some(entry) if !entry.released => {
                entry.released = true;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, object_id: WaylandId) -> Option<ObjectEntry> {
        self.objects.remove(&object_id)
    }

    pub fn live_count(&self, interface: Interface) -> usize {
        self.objects
            .values()
            .filter(|e| e.interface == interface && !e.released)
            .count()
    }
}

/// Incoming bytes not yet turned into messages.
pub(super) struct ByteBuffer {
    data: Box<[u8]>,
    head: usize,
    tail: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self {
            data: vec![0; 2 * MAX_MESSAGE_SIZE].into_boxed_slice(),
            head: 0,
            tail: 0,
        }
    }

    fn cached_bytes(&self) -> usize {
        self.tail - self.head
    }

    fn tail_space(&self) -> usize {
        self.data.len() - self.tail
    }

    /// Reads whatever the transport has. Complete messages are drained before every
    /// fill, so after compaction there is always room for a whole message.
    pub fn fill(&mut self, stream: &ClientStream, blocking: bool) -> io::Result<usize> {
        if self.tail_space() < MAX_MESSAGE_SIZE {
            self.data.copy_within(self.head..self.tail, 0);
            self.tail = self.cached_bytes();
            self.head = 0;
        }

        let size = stream.receive(&mut self.data[self.tail..], blocking)?;
        self.tail += size;
        trace!("Read {size} bytes, {} cached", self.cached_bytes());
        Ok(size)
    }

    pub fn next_message(&mut self) -> Result<Option<RawMessage>> {
        if self.cached_bytes() < WireMsgHeader::WIRE_SIZE {
            return Ok(None);
        }

        let header = WireMsgHeader::build(&self.data[self.head..self.tail]);
        let length = header.length as usize;
        if header.payload_len().is_none() || length > MAX_MESSAGE_SIZE {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("corrupt message header {header:?}"),
            )));
        }

        if self.cached_bytes() < length {
            return Ok(None);
        }

        let payload_start = self.head + WireMsgHeader::WIRE_SIZE;
        let payload = self.data[payload_start..self.head + length].into();
        self.head += length;

        if self.head == self.tail {
            self.head = 0;
            self.tail = 0;
        }

        Ok(Some(RawMessage {
            object_id: header.object_id,
            opcode: header.opcode,
            payload,
        }))
    }
}
