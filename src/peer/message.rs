use std::fmt;
use std::io::{self, Read, Write};

/// Message ids used by the peer wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
    Port = 9,
}

/// An upper bound on a single message frame's body (id byte + payload), sized
/// for the largest legitimate message: a 16 KiB `piece` block plus its 8-byte
/// index/offset header, with slack for the id byte.
const MAX_MESSAGE_PAYLOAD_LEN: usize = 16 * 1024 + 9;

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownMessageId(pub u8);

impl TryFrom<u8> for MessageId {
    type Error = UnknownMessageId;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(MessageId::Choke),
            1 => Ok(MessageId::Unchoke),
            2 => Ok(MessageId::Interested),
            3 => Ok(MessageId::NotInterested),
            4 => Ok(MessageId::Have),
            5 => Ok(MessageId::Bitfield),
            6 => Ok(MessageId::Request),
            7 => Ok(MessageId::Piece),
            8 => Ok(MessageId::Cancel),
            9 => Ok(MessageId::Port),
            other => Err(UnknownMessageId(other)),
        }
    }
}

/// A length-prefixed peer wire message. A zero-length frame (no id, no
/// payload) is a keep-alive and is handled separately by the reader, since it
/// has no `MessageId` of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(id: MessageId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let len = 1 + self.payload.len();
        let mut bytes = Vec::with_capacity(4 + len);
        bytes.extend((len as u32).to_be_bytes());
        bytes.push(self.id as u8);
        bytes.extend(&self.payload);
        bytes
    }

    pub fn from_parts(id_byte: u8, payload: &[u8]) -> Result<Message, UnknownMessageId> {
        let id = MessageId::try_from(id_byte)?;
        Ok(Message {
            id,
            payload: payload.to_vec(),
        })
    }

    /// Reads one message frame from a stream, distinguishing a keep-alive
    /// (`Ok(None)`) from an actual message.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Option<Message>> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;

        if len == 0 {
            return Ok(None);
        }
        if len > MAX_MESSAGE_PAYLOAD_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("message frame of {len} bytes exceeds the {MAX_MESSAGE_PAYLOAD_LEN} byte limit"),
            ));
        }

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body)?;

        let id_byte = body[0];
        let payload = &body[1..];
        Message::from_parts(id_byte, payload)
            .map(Some)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}

impl fmt::Display for UnknownMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown message id {}", self.0)
    }
}

impl std::error::Error for UnknownMessageId {}

/// Writes a zero-length keep-alive frame.
pub fn write_keep_alive<W: Write>(writer: &mut W) -> io::Result<()> {
    writer.write_all(&0u32.to_be_bytes())
}

/// The peer's announced piece bitfield, stored MSB-first within each byte:
/// bit 7 of byte 0 is piece 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitfield {
    bitfield: Vec<u8>,
}

impl Bitfield {
    pub fn new(bitfield: Vec<u8>) -> Self {
        Self { bitfield }
    }

    pub fn empty(num_pieces: u32) -> Self {
        Self {
            bitfield: vec![0u8; num_pieces.div_ceil(8) as usize],
        }
    }

    pub fn has_piece(&self, index: u32) -> bool {
        let byte_index = (index / 8) as usize;
        let bit_index = 7 - (index % 8);
        match self.bitfield.get(byte_index) {
            Some(byte) => byte & (1 << bit_index) != 0,
            None => false,
        }
    }

    /// Marks `index` as available, growing the backing bytes if needed.
    pub fn set_piece(&mut self, index: u32) {
        let byte_index = (index / 8) as usize;
        let bit_index = 7 - (index % 8);
        if byte_index >= self.bitfield.len() {
            self.bitfield.resize(byte_index + 1, 0);
        }
        self.bitfield[byte_index] |= 1 << bit_index;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bitfield
    }
}

/// The payload of a `request` or `cancel` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub index: u32,
    pub begin: u32,
    pub length: u32,
}

impl Request {
    pub fn new(index: u32, begin: u32, length: u32) -> Self {
        Self {
            index,
            begin,
            length,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(12);
        bytes.extend(self.index.to_be_bytes());
        bytes.extend(self.begin.to_be_bytes());
        bytes.extend(self.length.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Request> {
        if bytes.len() != 12 {
            return None;
        }
        Some(Request {
            index: u32::from_be_bytes(bytes[0..4].try_into().ok()?),
            begin: u32::from_be_bytes(bytes[4..8].try_into().ok()?),
            length: u32::from_be_bytes(bytes[8..12].try_into().ok()?),
        })
    }
}

/// The payload of a `piece` message: a block's location plus its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceBlock {
    pub index: u32,
    pub begin: u32,
    pub block: Vec<u8>,
}

impl PieceBlock {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.block.len());
        bytes.extend(self.index.to_be_bytes());
        bytes.extend(self.begin.to_be_bytes());
        bytes.extend(&self.block);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<PieceBlock> {
        if bytes.len() < 8 {
            return None;
        }
        Some(PieceBlock {
            index: u32::from_be_bytes(bytes[0..4].try_into().ok()?),
            begin: u32::from_be_bytes(bytes[4..8].try_into().ok()?),
            block: bytes[8..].to_vec(),
        })
    }
}

/// Builds the payload for a `have` message: a single 4-byte big-endian piece index.
pub fn have_payload(index: u32) -> Vec<u8> {
    index.to_be_bytes().to_vec()
}

/// Parses the payload of a `have` message.
pub fn parse_have_payload(payload: &[u8]) -> Option<u32> {
    Some(u32::from_be_bytes(payload.try_into().ok()?))
}
