use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::encoder_decoder::bencode::{Bencode, BencodeError};
use crate::torrent_parser::info::{FromInfoError, Info};

/// Torrent files larger than this are refused outright rather than fully buffered.
const MAX_TORRENT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// A fully parsed `.torrent` file: the tracker announce URL plus the `info` dict
/// it wraps, alongside the SHA-1 hash of that dict's exact original byte span.
#[derive(Debug, Clone)]
pub struct Torrent {
    pub announce_url: String,
    pub info: Info,
    pub info_hash: [u8; 20],
}

#[derive(Debug)]
pub enum TorrentError {
    Io(io::Error),
    TooLarge(u64),
    Bencode(BencodeError),
    NotADict,
    MissingAnnounce,
    InvalidAnnounce,
    MissingInfo,
    Info(FromInfoError),
}

impl fmt::Display for TorrentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorrentError::Io(err) => write!(f, "could not read torrent file: {err}"),
            TorrentError::TooLarge(size) => {
                write!(f, "torrent file is {size} bytes, over the {MAX_TORRENT_FILE_SIZE} byte limit")
            }
            TorrentError::Bencode(err) => write!(f, "malformed bencode: {err}"),
            TorrentError::NotADict => write!(f, "torrent file is not a bencoded dict"),
            TorrentError::MissingAnnounce => write!(f, "torrent file is missing 'announce'"),
            TorrentError::InvalidAnnounce => write!(f, "'announce' is not a valid string"),
            TorrentError::MissingInfo => write!(f, "torrent file is missing 'info'"),
            TorrentError::Info(err) => write!(f, "invalid 'info' dict: {err:?}"),
        }
    }
}

impl std::error::Error for TorrentError {}

impl From<io::Error> for TorrentError {
    fn from(err: io::Error) -> Self {
        TorrentError::Io(err)
    }
}

impl From<BencodeError> for TorrentError {
    fn from(err: BencodeError) -> Self {
        TorrentError::Bencode(err)
    }
}

impl From<FromInfoError> for TorrentError {
    fn from(err: FromInfoError) -> Self {
        TorrentError::Info(err)
    }
}

impl Torrent {
    /// Loads and validates a `.torrent` file from disk.
    pub fn from_file(path: &Path) -> Result<Torrent, TorrentError> {
        let size = fs::metadata(path)?.len();
        if size > MAX_TORRENT_FILE_SIZE {
            return Err(TorrentError::TooLarge(size));
        }

        let bytes = fs::read(path)?;
        Torrent::from_bytes(&bytes)
    }

    /// Parses a `.torrent` file already read into memory.
    ///
    /// The info hash is computed over the exact original byte span of the `info`
    /// value rather than by re-encoding it, so the hash matches even if this
    /// crate's canonical encoding would reorder or reformat anything unexpected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Torrent, TorrentError> {
        let top_level = Bencode::decode(bytes)?;
        let dict = top_level.as_dict().ok_or(TorrentError::NotADict)?;

        let announce_url = dict
            .get(b"announce".as_slice())
            .ok_or(TorrentError::MissingAnnounce)?
            .as_string()
            .ok_or(TorrentError::InvalidAnnounce)?;
        let announce_url =
            String::from_utf8(announce_url.to_vec()).map_err(|_| TorrentError::InvalidAnnounce)?;

        let info_bencode = dict.get(b"info".as_slice()).ok_or(TorrentError::MissingInfo)?;
        let info = Info::from(info_bencode)?;

        let info_span = top_level_value_span(bytes, b"info").ok_or(TorrentError::MissingInfo)?;
        let mut hasher = Sha1::new();
        hasher.update(info_span);
        let digest = hasher.finalize();
        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&digest);

        Ok(Torrent {
            announce_url,
            info,
            info_hash,
        })
    }
}

/// Walks the raw bytes of a top-level bencoded dict key-by-key to find the exact
/// byte span of the value bound to `key`, without re-encoding anything.
fn top_level_value_span<'a>(bytes: &'a [u8], key: &[u8]) -> Option<&'a [u8]> {
    if bytes.first() != Some(&b'd') {
        return None;
    }
    let mut pos = 1;
    while pos < bytes.len() && bytes[pos] != b'e' {
        let (key_bencode, key_len) = Bencode::decode_prefix(&bytes[pos..]).ok()?;
        let this_key = key_bencode.as_string()?.to_vec();
        pos += key_len;

        let (_value, value_len) = Bencode::decode_prefix(&bytes[pos..]).ok()?;
        let value_span = &bytes[pos..pos + value_len];
        if this_key == key {
            return Some(value_span);
        }
        pos += value_len;
    }
    None
}
