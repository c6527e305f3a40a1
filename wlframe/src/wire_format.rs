use crate::protocol::{WireMessage, WireValue::*};
use std::{io, os::fd::RawFd};

/// Wayland refuses messages bigger than this on both ends.
pub const MAX_MESSAGE_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireMsgHeader {
    pub object_id: u32,
    pub length: u16,
    pub opcode: u16,
}

impl WireMsgHeader {
    pub const WIRE_SIZE: usize = 4 + 2 + 2;

    pub fn build(data: &[u8]) -> Self {
        assert!(data.len() >= Self::WIRE_SIZE);

        let object_id = u32_from_bytes(&data[..4]);
        let len_and_opcode = u32_from_bytes(&data[4..8]);

        Self {
            object_id,
            opcode: (len_and_opcode & 0xFFFF) as u16,
            length: (len_and_opcode >> 16) as u16,
        }
    }

    /// `None` when the advertised length cannot even hold the header.
    pub fn payload_len(&self) -> Option<usize> {
        (self.length as usize).checked_sub(Self::WIRE_SIZE)
    }
}

#[derive(Debug, Default)]
pub struct EncodedMessage {
    pub bytes: Vec<u8>,
    pub fds: Vec<RawFd>,
}

/// Fails with `InvalidInput` when the request would not fit in a single message.
pub fn encode(msg: &WireMessage<'_>) -> io::Result<EncodedMessage> {
    // 128 bytes is more than any request this crate sends.
    let mut encoded = EncodedMessage {
        bytes: Vec::with_capacity(128),
        fds: Vec::new(),
    };
    let buffer = &mut encoded.bytes;

    write_u32(buffer, msg.object_id);
    write_u32(buffer, 0); // filled in the end

    for value in msg.values {
        match value {
            Uint32(value) => write_u32(buffer, *value),
            Int32(value) => write_u32(buffer, *value as u32),
            Str(value) => {
                let bytes = value.as_bytes();
                write_u32(buffer, 1 + bytes.len() as u32); // +1 because of the null terminator
                buffer.extend_from_slice(bytes);
                buffer.push(0);
                pad(buffer);
            }
            Array(value) => {
                write_u32(buffer, value.len() as u32);
                buffer.extend_from_slice(value);
                pad(buffer);
            }
            FileDesc(fd) => encoded.fds.push(*fd),
        }
    }

    let total_size = buffer.len();
    if total_size > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "request {} of object {} is {total_size} bytes, over {MAX_MESSAGE_SIZE}",
                msg.opcode, msg.object_id
            ),
        ));
    }
    debug_assert!(total_size % 4 == 0);

    let size_and_opcode = (total_size as u32) << 16 | msg.opcode as u32;
    buffer[4..8].copy_from_slice(&size_and_opcode.to_ne_bytes());

    Ok(encoded)
}

fn u32_from_bytes(data: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&data[..4]);
    u32::from_ne_bytes(word)
}

#[inline]
fn write_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_ne_bytes())
}

#[inline]
fn pad(buffer: &mut Vec<u8>) {
    buffer.resize(aligned_size(buffer.len()), 0u8);
}

#[inline]
fn aligned_size(base_size: usize) -> usize {
    base_size.div_ceil(4) * 4
}

// parsing helper functions
pub mod parsing {
    use super::{aligned_size, u32_from_bytes};
    use std::str;

    pub type Result<T> = std::result::Result<T, Error>;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("missing {0}")]
        MissingField(&'static str),
        #[error("invalid utf-8 string: {0}")]
        InvalidUtfString(#[from] str::Utf8Error),
        #[error("string is not null terminated")]
        UnterminatedString,
        // array byte size should be a multiple of 32 bits
        #[error("array byte size {0} is not a multiple of 4")]
        InvalidArrayByteSize(u32),
    }

    pub struct Cursor<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl<'a> Cursor<'a> {
        pub fn new(data: &'a [u8]) -> Self {
            Self { data, pos: 0 }
        }

        pub fn remaining(&self) -> usize {
            self.data.len() - self.pos
        }

        fn take(&mut self, size: usize, field: &'static str) -> Result<&'a [u8]> {
            if self.remaining() < size {
                return Err(Error::MissingField(field));
            }
            let bytes = &self.data[self.pos..self.pos + size];
            self.pos += size;
            Ok(bytes)
        }
    }

    /// Types that can appear as event arguments.
    pub trait WireArg: Sized {
        fn parse(cursor: &mut Cursor<'_>) -> Result<Self>;
    }

    impl WireArg for u32 {
        fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
            parse_u32(cursor)
        }
    }

    impl WireArg for i32 {
        fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
            parse_i32(cursor)
        }
    }

    impl WireArg for String {
        fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
            parse_str(cursor)
        }
    }

    impl WireArg for Vec<u32> {
        fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
            parse_u32_array(cursor)
        }
    }

    pub fn parse_u32(cursor: &mut Cursor<'_>) -> Result<u32> {
        Ok(u32_from_bytes(cursor.take(4, "4 bytes for u32/i32 integer")?))
    }

    pub fn parse_i32(cursor: &mut Cursor<'_>) -> Result<i32> {
        Ok(parse_u32(cursor)? as i32)
    }

    pub fn parse_u32_array(cursor: &mut Cursor<'_>) -> Result<Vec<u32>> {
        let size = parse_u32(cursor)?;
        if size % 4 != 0 {
            return Err(Error::InvalidArrayByteSize(size));
        }

        let bytes = cursor.take(size as usize, "array elements")?;
        Ok(bytes.chunks_exact(4).map(u32_from_bytes).collect())
    }

    pub fn parse_str(cursor: &mut Cursor<'_>) -> Result<String> {
        let str_size = parse_u32(cursor)? as usize;

        // a zero size is how the wire says "null string"
        if str_size == 0 {
            return Ok(String::new());
        }

        let padded = cursor.take(aligned_size(str_size), "string data")?;
        let (text, terminator) = padded[..str_size].split_at(str_size - 1);
        if terminator != [0] {
            return Err(Error::UnterminatedString);
        }

        Ok(str::from_utf8(text)?.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::{parsing::*, *};
    use crate::protocol::WireValue;

    #[test]
    fn encodes_header_and_padded_string() {
        let values = [Uint32(7), Str("wl_shm".to_string())];
        let encoded = encode(&WireMessage {
            object_id: 2,
            opcode: 0,
            values: &values,
        })
        .unwrap();

        // header + u32 + (len + "wl_shm\0" padded to 8)
        assert_eq!(encoded.bytes.len(), 8 + 4 + 4 + 8);
        let header = WireMsgHeader::build(&encoded.bytes);
        assert_eq!(header.object_id, 2);
        assert_eq!(header.opcode, 0);
        assert_eq!(header.length as usize, encoded.bytes.len());

        let mut cursor = Cursor::new(&encoded.bytes[8..]);
        assert_eq!(parse_u32(&mut cursor).unwrap(), 7);
        assert_eq!(parse_str(&mut cursor).unwrap(), "wl_shm");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn file_descriptors_travel_out_of_band() {
        let values = [Uint32(4), WireValue::FileDesc(9), Int32(-1)];
        let encoded = encode(&WireMessage {
            object_id: 3,
            opcode: 0,
            values: &values,
        })
        .unwrap();

        assert_eq!(encoded.fds, vec![9]);
        assert_eq!(encoded.bytes.len(), 16);
    }

    #[test]
    fn oversized_request_is_refused() {
        let values = [Str("a".repeat(MAX_MESSAGE_SIZE))];
        let err = encode(&WireMessage {
            object_id: 10,
            opcode: 2,
            values: &values,
        })
        .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn truncated_payload_is_reported() {
        let mut cursor = Cursor::new(&[1, 0]);
        assert!(matches!(
            parse_u32(&mut cursor),
            Err(Error::MissingField(_))
        ));

        let mut bytes = 8u32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(b"abc");
        assert!(parse_str(&mut Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn array_of_words() {
        let mut bytes = 8u32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&1u32.to_ne_bytes());
        bytes.extend_from_slice(&4u32.to_ne_bytes());
        assert_eq!(parse_u32_array(&mut Cursor::new(&bytes)).unwrap(), vec![1, 4]);

        let odd = 3u32.to_ne_bytes();
        assert!(matches!(
            parse_u32_array(&mut Cursor::new(&odd)),
            Err(Error::InvalidArrayByteSize(3))
        ));
    }
}
