use crate::encoder_decoder::bencode::Bencode;

/// The parsed `info` sub-dictionary of a `.torrent` file.
///
/// Only single-file torrents are represented: a `files` list under `info` marks a
/// multi-file torrent, which this client refuses to load rather than silently
/// downloading a truncated result.
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub piece_length: u64,
    pub length: u64,
    pub name: String,
    pub piece_hashes: Vec<[u8; 20]>,
}

/// Possible `Info` parsing errors.
#[derive(Debug, PartialEq, Eq)]
pub enum FromInfoError {
    NotADict,
    MissingPieceLength,
    InvalidPieceLength,
    MissingLength,
    InvalidLength,
    MissingName,
    InvalidName,
    MissingPieces,
    InvalidPiecesLength,
    PieceCountMismatch,
    MultiFileTorrentUnsupported,
}

impl Info {
    /// Builds a new `Info` from the bencoded `info` sub-dict of a `.torrent` file.
    pub fn from(bencode: &Bencode) -> Result<Info, FromInfoError> {
        let dict = bencode.as_dict().ok_or(FromInfoError::NotADict)?;

        if dict.contains_key(b"files".as_slice()) {
            return Err(FromInfoError::MultiFileTorrentUnsupported);
        }

        let piece_length = dict
            .get(b"piece length".as_slice())
            .ok_or(FromInfoError::MissingPieceLength)?
            .as_number()
            .filter(|n| *n > 0)
            .ok_or(FromInfoError::InvalidPieceLength)? as u64;

        let length = dict
            .get(b"length".as_slice())
            .ok_or(FromInfoError::MissingLength)?
            .as_number()
            .filter(|n| *n >= 0)
            .ok_or(FromInfoError::InvalidLength)? as u64;

        let name = dict
            .get(b"name".as_slice())
            .ok_or(FromInfoError::MissingName)?
            .as_string()
            .ok_or(FromInfoError::InvalidName)?;
        let name = String::from_utf8(name.to_vec()).map_err(|_| FromInfoError::InvalidName)?;

        let pieces = dict
            .get(b"pieces".as_slice())
            .ok_or(FromInfoError::MissingPieces)?
            .as_string()
            .ok_or(FromInfoError::InvalidPiecesLength)?;
        if pieces.len() % 20 != 0 {
            return Err(FromInfoError::InvalidPiecesLength);
        }
        let piece_hashes: Vec<[u8; 20]> = pieces
            .chunks_exact(20)
            .map(|chunk| {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();

        let expected_pieces = Self::piece_count(length, piece_length);
        if piece_hashes.len() as u64 != expected_pieces {
            return Err(FromInfoError::PieceCountMismatch);
        }

        Ok(Info {
            piece_length,
            length,
            name,
            piece_hashes,
        })
    }

    /// Number of pieces implied by a file and piece length: `ceil(length / piece_length)`.
    fn piece_count(length: u64, piece_length: u64) -> u64 {
        if length == 0 {
            return 0;
        }
        (length + piece_length - 1) / piece_length
    }

    pub fn total_pieces(&self) -> u32 {
        self.piece_hashes.len() as u32
    }

    /// Byte length of piece `index`; the last piece may be shorter than `piece_length`.
    pub fn piece_length_for(&self, index: u32) -> u64 {
        let last_index = self.total_pieces().saturating_sub(1);
        if index != last_index {
            return self.piece_length;
        }
        let remainder = self.length - (last_index as u64) * self.piece_length;
        if remainder == 0 {
            self.piece_length
        } else {
            remainder
        }
    }
}
