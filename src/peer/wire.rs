const PSTR: &str = "BitTorrent protocol";
const HANDSHAKE_LEN: usize = 68;

#[derive(Debug)]
pub enum WireError {
    BadHandshakeLength(usize),
    BadProtocolString,
    UnknownMessageId(u8),
    EmptyMessageFrame,
}

/// The 68-byte handshake exchanged before any other peer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    pub fn to_bytes(&self) -> [u8; HANDSHAKE_LEN] {
        let mut bytes = [0u8; HANDSHAKE_LEN];
        bytes[0] = PSTR.len() as u8;
        bytes[1..20].copy_from_slice(PSTR.as_bytes());
        // bytes[20..28] stay zero: reserved.
        bytes[28..48].copy_from_slice(&self.info_hash);
        bytes[48..68].copy_from_slice(&self.peer_id);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != HANDSHAKE_LEN {
            return Err(WireError::BadHandshakeLength(bytes.len()));
        }
        if bytes[0] as usize != PSTR.len() || &bytes[1..20] != PSTR.as_bytes() {
            return Err(WireError::BadProtocolString);
        }
        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&bytes[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&bytes[48..68]);
        Ok(Self { info_hash, peer_id })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
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

impl MessageId {
    fn from_byte(byte: u8) -> Result<Self, WireError> {
        match byte {
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
            other => Err(WireError::UnknownMessageId(other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(id: MessageId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    pub fn interested() -> Self {
        Self::new(MessageId::Interested, Vec::new())
    }

    pub fn unchoke() -> Self {
        Self::new(MessageId::Unchoke, Vec::new())
    }

    pub fn request(index: u32, begin: u32, length: u32) -> Self {
        let mut payload = Vec::with_capacity(12);
        payload.extend(index.to_be_bytes());
        payload.extend(begin.to_be_bytes());
        payload.extend(length.to_be_bytes());
        Self::new(MessageId::Request, payload)
    }

    /// Parses a full frame body (id byte + payload, NOT including the
    /// 4-byte length prefix). `None` denotes a keep-alive (empty frame).
    pub fn from_frame(frame: &[u8]) -> Result<Option<Self>, WireError> {
        if frame.is_empty() {
            return Ok(None);
        }
        let id = MessageId::from_byte(frame[0])?;
        Ok(Some(Self::new(id, frame[1..].to_vec())))
    }

    /// Encodes this message as a full wire frame, length prefix included.
    pub fn to_frame(&self) -> Vec<u8> {
        let len = (self.payload.len() + 1) as u32;
        let mut bytes = Vec::with_capacity(4 + len as usize);
        bytes.extend(len.to_be_bytes());
        bytes.push(self.id as u8);
        bytes.extend(&self.payload);
        bytes
    }

    /// Parses a `request`/`cancel`-shaped payload: (index, begin, length).
    pub fn parse_request_payload(&self) -> Option<(u32, u32, u32)> {
        if self.payload.len() < 12 {
            return None;
        }
        let index = u32::from_be_bytes(self.payload[0..4].try_into().ok()?);
        let begin = u32::from_be_bytes(self.payload[4..8].try_into().ok()?);
        let length = u32::from_be_bytes(self.payload[8..12].try_into().ok()?);
        Some((index, begin, length))
    }

    /// Parses a `piece`-shaped payload: (index, begin, block bytes).
    pub fn parse_piece_payload(&self) -> Option<(u32, u32, &[u8])> {
        if self.payload.len() < 8 {
            return None;
        }
        let index = u32::from_be_bytes(self.payload[0..4].try_into().ok()?);
        let begin = u32::from_be_bytes(self.payload[4..8].try_into().ok()?);
        Some((index, begin, &self.payload[8..]))
    }

    /// Parses a `have`-shaped payload: the piece index.
    pub fn parse_have_payload(&self) -> Option<u32> {
        if self.payload.len() < 4 {
            return None;
        }
        Some(u32::from_be_bytes(self.payload[0..4].try_into().ok()?))
    }
}

/// A peer's packed bitfield: bit `index` lives at byte `index/8`, big-endian
/// within the byte (bit offset `7 - index % 8`).
#[derive(Debug, Clone)]
pub struct Bitfield {
    bytes: Vec<u8>,
}

impl Bitfield {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn empty(total_pieces: u32) -> Self {
        Self {
            bytes: vec![0u8; total_pieces.div_ceil(8) as usize],
        }
    }

    pub fn has_piece(&self, index: u32) -> bool {
        let byte_index = (index / 8) as usize;
        match self.bytes.get(byte_index) {
            Some(byte) => (byte >> (7 - index % 8)) & 1 != 0,
            None => false,
        }
    }

    pub fn set_piece(&mut self, index: u32) {
        let byte_index = (index / 8) as usize;
        if let Some(byte) = self.bytes.get_mut(byte_index) {
            *byte |= 1 << (7 - index % 8);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn expected_len(total_pieces: u32) -> usize {
        total_pieces.div_ceil(8) as usize
    }
}
