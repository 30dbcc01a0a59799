use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::tracker::http::query_params::QueryParams;
use crate::tracker::tracker_response::{FromTrackerResponseError, TrackerResponse};

const CLIENT_ID_PREFIX: &[u8; 8] = b"-BP0001-";
const ANNOUNCE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub enum TrackerClientError {
    Request(reqwest::Error),
    Response(FromTrackerResponseError),
}

impl fmt::Display for TrackerClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerClientError::Request(err) => write!(f, "tracker request failed: {err}"),
            TrackerClientError::Response(err) => write!(f, "tracker response invalid: {err}"),
        }
    }
}

impl std::error::Error for TrackerClientError {}

impl From<reqwest::Error> for TrackerClientError {
    fn from(err: reqwest::Error) -> Self {
        TrackerClientError::Request(err)
    }
}

impl From<FromTrackerResponseError> for TrackerClientError {
    fn from(err: FromTrackerResponseError) -> Self {
        TrackerClientError::Response(err)
    }
}

/// A blocking HTTP client for the tracker announce protocol.
pub struct TrackerClient {
    peer_id: [u8; 20],
    http: reqwest::blocking::Client,
}

impl TrackerClient {
    pub fn new() -> Self {
        Self {
            peer_id: generate_peer_id(),
            http: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(ANNOUNCE_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::blocking::Client::new()),
        }
    }

    pub fn peer_id(&self) -> [u8; 20] {
        self.peer_id
    }

    /// Sends a `started` announce request and parses the compact response.
    pub fn announce(
        &self,
        announce_url: &str,
        info_hash: [u8; 20],
        port: u16,
        left: u64,
    ) -> Result<TrackerResponse, TrackerClientError> {
        let query = QueryParams::new(info_hash, self.peer_id, port, left).build();
        let url = format!("{announce_url}{query}");

        let response = self.http.get(&url).send()?;
        let body = response.bytes()?;
        Ok(TrackerResponse::from(&body)?)
    }
}

impl Default for TrackerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates a fresh random peer id for this run: an 8-byte client
/// identification prefix followed by 12 random alphanumeric bytes.
fn generate_peer_id() -> [u8; 20] {
    let mut peer_id = [0u8; 20];
    peer_id[..8].copy_from_slice(CLIENT_ID_PREFIX);

    let mut rng = rand::thread_rng();
    for byte in peer_id[8..].iter_mut() {
        *byte = rng.sample(rand::distributions::Alphanumeric);
    }
    peer_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_peer_id_has_client_prefix() {
        let peer_id = generate_peer_id();
        assert_eq!(&peer_id[..8], CLIENT_ID_PREFIX);
    }

    #[test]
    fn test_generate_peer_id_is_random_per_call() {
        let a = generate_peer_id();
        let b = generate_peer_id();
        assert_ne!(&a[8..], &b[8..]);
    }
}
