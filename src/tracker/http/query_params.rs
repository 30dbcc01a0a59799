use crate::encoder_decoder::url_encoder;

/// Query parameters for a tracker announce request.
///
/// `info_hash` and `peer_id` are raw 20-byte values, percent-encoded byte-for-byte
/// rather than treated as text, since either may contain bytes outside the
/// printable ASCII range.
#[derive(Debug)]
pub struct QueryParams {
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    port: u16,
    left: u64,
}

impl QueryParams {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20], port: u16, left: u64) -> QueryParams {
        QueryParams {
            info_hash,
            peer_id,
            port,
            left,
        }
    }

    /// Builds the query string portion of the announce URL, including the
    /// leading `?`.
    pub fn build(&self) -> String {
        format!(
            "?info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}&compact=1&event=started",
            url_encoder::encode(&self.info_hash),
            url_encoder::encode(&self.peer_id),
            self.port,
            self.left
        )
    }
}
