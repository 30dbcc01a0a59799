use std::fmt;

const PROTOCOL_NAME: &str = "BitTorrent protocol";
const HANDSHAKE_LEN: usize = 68;

/// The fixed 68-byte handshake exchanged at the start of every peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

#[derive(Debug, PartialEq, Eq)]
pub enum HandshakeError {
    WrongLength(usize),
    UnknownProtocol,
    InfoHashMismatch,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::WrongLength(len) => {
                write!(f, "handshake is {len} bytes, expected {HANDSHAKE_LEN}")
            }
            HandshakeError::UnknownProtocol => write!(f, "handshake names an unknown protocol"),
            HandshakeError::InfoHashMismatch => write!(f, "handshake info_hash does not match"),
        }
    }
}

impl std::error::Error for HandshakeError {}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    pub fn to_bytes(&self) -> [u8; HANDSHAKE_LEN] {
        let mut bytes = [0u8; HANDSHAKE_LEN];
        bytes[0] = PROTOCOL_NAME.len() as u8;
        bytes[1..20].copy_from_slice(PROTOCOL_NAME.as_bytes());
        // bytes[20..28] reserved, left zeroed: no extension bits are advertised.
        bytes[28..48].copy_from_slice(&self.info_hash);
        bytes[48..68].copy_from_slice(&self.peer_id);
        bytes
    }

    /// Parses a raw 68-byte handshake received from a peer.
    pub fn parse(bytes: &[u8]) -> Result<Handshake, HandshakeError> {
        if bytes.len() != HANDSHAKE_LEN {
            return Err(HandshakeError::WrongLength(bytes.len()));
        }
        let pstrlen = bytes[0] as usize;
        if pstrlen != PROTOCOL_NAME.len() || &bytes[1..1 + pstrlen] != PROTOCOL_NAME.as_bytes() {
            return Err(HandshakeError::UnknownProtocol);
        }

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&bytes[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&bytes[48..68]);

        Ok(Handshake { info_hash, peer_id })
    }

    /// Confirms a received handshake advertises the torrent we asked for.
    pub fn verify(&self, expected_info_hash: [u8; 20]) -> Result<(), HandshakeError> {
        if self.info_hash != expected_info_hash {
            return Err(HandshakeError::InfoHashMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let info_hash = [7u8; 20];
        let peer_id = [9u8; 20];
        let handshake = Handshake::new(info_hash, peer_id);

        let bytes = handshake.to_bytes();
        assert_eq!(bytes.len(), HANDSHAKE_LEN);

        let parsed = Handshake::parse(&bytes).unwrap();
        assert_eq!(parsed, handshake);
    }

    #[test]
    fn test_verify_matching_info_hash() {
        let info_hash = [1u8; 20];
        let handshake = Handshake::new(info_hash, [2u8; 20]);
        assert!(handshake.verify(info_hash).is_ok());
    }

    #[test]
    fn test_verify_mismatched_info_hash() {
        let handshake = Handshake::new([1u8; 20], [2u8; 20]);
        assert_eq!(
            handshake.verify([9u8; 20]),
            Err(HandshakeError::InfoHashMismatch)
        );
    }

    #[test]
    fn test_parse_wrong_length_rejected() {
        let bytes = [0u8; 10];
        assert_eq!(
            Handshake::parse(&bytes),
            Err(HandshakeError::WrongLength(10))
        );
    }

    #[test]
    fn test_parse_unknown_protocol_rejected() {
        let mut bytes = Handshake::new([1u8; 20], [2u8; 20]).to_bytes();
        bytes[1] = b'X';
        assert_eq!(Handshake::parse(&bytes), Err(HandshakeError::UnknownProtocol));
    }
}
