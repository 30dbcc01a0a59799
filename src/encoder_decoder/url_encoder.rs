/// Percent-encodes raw bytes for use in a tracker announce query string.
///
/// Every byte is emitted as `%XX`; unlike a text-aware percent-encoder this never leaves
/// alphanumeric bytes bare, which keeps it correct for the 20 arbitrary bytes of an
/// info-hash or peer-id rather than just for human-readable text.
///
/// # Example
///
/// ```rust
/// use bitpull::encoder_decoder::url_encoder::encode;
///
/// let info_hash: [u8; 4] = [0x2c, 0x6b, 0x68, 0x58];
/// assert_eq!(encode(&info_hash), "%2c%6b%68%58");
/// ```
pub fn encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 3);
    for b in bytes {
        encoded.push('%');
        encoded.push_str(&format!("{:02x}", b));
    }
    encoded
}
