use std::fmt;

use crate::encoder_decoder::bencode::{Bencode, BencodeError};
use crate::peer::bt_peer::{BtPeer, FromBtPeerError};

/// A parsed tracker announce response, in the compact peer list format.
#[derive(Debug)]
pub struct TrackerResponse {
    pub interval: i64,
    pub peers: Vec<BtPeer>,
}

#[derive(Debug)]
pub enum FromTrackerResponseError {
    DecodeResponseError(BencodeError),
    FailureReason(String),
    InvalidInterval,
    InvalidPeers(FromBtPeerError),
    NotADict,
    PeersNotAString,
}

impl fmt::Display for FromTrackerResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromTrackerResponseError::DecodeResponseError(err) => {
                write!(f, "could not decode tracker response: {err}")
            }
            FromTrackerResponseError::FailureReason(reason) => {
                write!(f, "tracker returned a failure reason: {reason}")
            }
            FromTrackerResponseError::InvalidInterval => write!(f, "'interval' is not a number"),
            FromTrackerResponseError::InvalidPeers(err) => {
                write!(f, "could not decode compact peer list: {err}")
            }
            FromTrackerResponseError::NotADict => write!(f, "tracker response is not a bencoded dict"),
            FromTrackerResponseError::PeersNotAString => {
                write!(f, "'peers' is not a compact byte string")
            }
        }
    }
}

impl std::error::Error for FromTrackerResponseError {}

impl TrackerResponse {
    /// Parses a raw tracker announce response body.
    ///
    /// A `failure reason` key short-circuits parsing with
    /// `FromTrackerResponseError::FailureReason`, matching the tracker protocol's
    /// convention of reporting errors inline rather than via HTTP status.
    pub fn from(response: &[u8]) -> Result<TrackerResponse, FromTrackerResponseError> {
        let decoded = Bencode::decode(response)
            .map_err(FromTrackerResponseError::DecodeResponseError)?;
        let dict = decoded.as_dict().ok_or(FromTrackerResponseError::NotADict)?;

        if let Some(reason) = dict.get(b"failure reason".as_slice()) {
            let reason = reason
                .as_string()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .unwrap_or_else(|| "<unreadable>".to_string());
            return Err(FromTrackerResponseError::FailureReason(reason));
        }

        let interval = dict
            .get(b"interval".as_slice())
            .and_then(|v| v.as_number())
            .ok_or(FromTrackerResponseError::InvalidInterval)?;

        let peers_bytes = dict
            .get(b"peers".as_slice())
            .and_then(|v| v.as_string())
            .ok_or(FromTrackerResponseError::PeersNotAString)?;
        let peers = BtPeer::parse_compact_list(peers_bytes)
            .map_err(FromTrackerResponseError::InvalidPeers)?;

        Ok(TrackerResponse { interval, peers })
    }
}
