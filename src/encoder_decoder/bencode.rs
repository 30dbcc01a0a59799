use std::collections::BTreeMap;
use std::fmt;

/// A decoded bencode value.
///
/// Bencode has four shapes: signed integers, raw byte strings, ordered lists and
/// dictionaries keyed by byte strings. Dictionaries are kept in a `BTreeMap` so that
/// encoding always re-emits keys in ascending byte-wise order, which is what the
/// info-hash and tracker-response contracts rely on.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Bencode {
    BNumber(i64),
    BString(Vec<u8>),
    BList(Vec<Bencode>),
    BDict(BTreeMap<Vec<u8>, Bencode>),
}

/// Reasons a byte slice could not be decoded as bencode.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum BencodeError {
    EmptyInput,
    UnexpectedByte(u8),
    BadInteger,
    IntOutOfRange,
    BadStringLength,
    Truncated,
    UnterminatedContainer,
    NonStringDictKey,
    RecursionLimit,
    TrailingData,
    DuplicateKey,
}

impl fmt::Display for BencodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BencodeError::EmptyInput => write!(f, "empty input"),
            BencodeError::UnexpectedByte(b) => write!(f, "unexpected byte: {:#04x}", b),
            BencodeError::BadInteger => write!(f, "malformed integer"),
            BencodeError::IntOutOfRange => write!(f, "integer out of i64 range"),
            BencodeError::BadStringLength => write!(f, "malformed string length"),
            BencodeError::Truncated => write!(f, "input truncated"),
            BencodeError::UnterminatedContainer => write!(f, "list or dict missing terminator"),
            BencodeError::NonStringDictKey => write!(f, "dict key is not a byte string"),
            BencodeError::RecursionLimit => write!(f, "recursion limit exceeded"),
            BencodeError::TrailingData => write!(f, "trailing data after top-level value"),
            BencodeError::DuplicateKey => write!(f, "dict has a duplicate key"),
        }
    }
}

impl std::error::Error for BencodeError {}

const MAX_DEPTH: usize = 256;

impl Bencode {
    /// Decodes a full bencoded buffer into a single value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bitpull::encoder_decoder::bencode::Bencode;
    ///
    /// let data = b"4:spam";
    /// assert_eq!(Bencode::decode(data).unwrap(), Bencode::BString(b"spam".to_vec()));
    /// ```
    ///
    /// Fails if the buffer is empty, malformed, or has trailing bytes after the value.
    pub fn decode(data: &[u8]) -> Result<Bencode, BencodeError> {
        if data.is_empty() {
            return Err(BencodeError::EmptyInput);
        }
        let (value, consumed) = Self::do_decode(data, 0)?;
        if consumed != data.len() {
            return Err(BencodeError::TrailingData);
        }
        Ok(value)
    }

    /// Like [`decode`](Self::decode) but allows trailing bytes, returning the number consumed.
    /// Used internally where a value is embedded in a larger buffer.
    pub fn decode_prefix(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        if data.is_empty() {
            return Err(BencodeError::EmptyInput);
        }
        Self::do_decode(data, 0)
    }

    fn do_decode(data: &[u8], depth: usize) -> Result<(Bencode, usize), BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::RecursionLimit);
        }
        match *data.first().ok_or(BencodeError::Truncated)? {
            b'i' => Self::decode_number(data),
            b'l' => Self::decode_list(data, depth),
            b'd' => Self::decode_dict(data, depth),
            b'0'..=b'9' => Self::decode_string(data),
            other => Err(BencodeError::UnexpectedByte(other)),
        }
    }

    fn decode_string(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        let colon = data
            .iter()
            .position(|&b| b == b':')
            .ok_or(BencodeError::BadStringLength)?;
        let len_str =
            std::str::from_utf8(&data[0..colon]).map_err(|_| BencodeError::BadStringLength)?;
        let len: i64 = len_str
            .parse()
            .map_err(|_| BencodeError::BadStringLength)?;
        if len < 0 {
            return Err(BencodeError::BadStringLength);
        }
        let start = colon + 1;
        let end = start
            .checked_add(len as usize)
            .ok_or(BencodeError::BadStringLength)?;
        if end > data.len() {
            return Err(BencodeError::Truncated);
        }
        Ok((Bencode::BString(data[start..end].to_vec()), end))
    }

    fn decode_number(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        let end = data
            .iter()
            .position(|&b| b == b'e')
            .ok_or(BencodeError::Truncated)?;
        let digits = &data[1..end];
        if digits.is_empty() {
            return Err(BencodeError::BadInteger);
        }
        let (sign, unsigned) = match digits.first() {
            Some(b'-') => (-1i64, &digits[1..]),
            _ => (1i64, digits),
        };
        if unsigned.is_empty() || (unsigned.len() > 1 && unsigned[0] == b'0') {
            return Err(BencodeError::BadInteger);
        }
        if unsigned == b"0" && sign == -1 {
            return Err(BencodeError::BadInteger);
        }
        let text = std::str::from_utf8(unsigned).map_err(|_| BencodeError::BadInteger)?;
        let magnitude: i64 = text.parse().map_err(|_| BencodeError::IntOutOfRange)?;
        let value = magnitude.checked_mul(sign).ok_or(BencodeError::IntOutOfRange)?;
        Ok((Bencode::BNumber(value), end + 1))
    }

    fn decode_list(data: &[u8], depth: usize) -> Result<(Bencode, usize), BencodeError> {
        let mut i = 1;
        let mut list = Vec::new();
        loop {
            match data.get(i) {
                None => return Err(BencodeError::UnterminatedContainer),
                Some(b'e') => break,
                Some(_) => {
                    let (value, size) = Self::do_decode(&data[i..], depth + 1)?;
                    list.push(value);
                    i += size;
                }
            }
        }
        Ok((Bencode::BList(list), i + 1))
    }

    fn decode_dict(data: &[u8], depth: usize) -> Result<(Bencode, usize), BencodeError> {
        let mut i = 1;
        let mut dict = BTreeMap::new();
        loop {
            match data.get(i) {
                None => return Err(BencodeError::UnterminatedContainer),
                Some(b'e') => break,
                Some(_) => {
                    let (key, key_size) = Self::do_decode(&data[i..], depth + 1)?;
                    i += key_size;
                    let key = match key {
                        Bencode::BString(k) => k,
                        _ => return Err(BencodeError::NonStringDictKey),
                    };
                    let (value, value_size) = Self::do_decode(&data[i..], depth + 1)?;
                    i += value_size;
                    if dict.contains_key(&key) {
                        return Err(BencodeError::DuplicateKey);
                    }
                    dict.insert(key, value);
                }
            }
        }
        Ok((Bencode::BDict(dict), i + 1))
    }

    /// Encodes a value back into its canonical bencode byte representation.
    /// Dict keys are emitted in ascending byte-wise order by construction (`BTreeMap`).
    ///
    /// # Example
    ///
    /// ```rust
    /// use bitpull::encoder_decoder::bencode::Bencode;
    /// use std::collections::BTreeMap;
    ///
    /// let mut dict = BTreeMap::new();
    /// dict.insert(b"zeta".to_vec(), Bencode::BString(b"last".to_vec()));
    /// dict.insert(b"alpha".to_vec(), Bencode::BNumber(10));
    ///
    /// assert_eq!(Bencode::BDict(dict).encode(), b"d5:alphai10e4:zeta4:laste".to_vec());
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Bencode::BNumber(n) => {
                out.push(b'i');
                out.extend(n.to_string().as_bytes());
                out.push(b'e');
            }
            Bencode::BString(s) => {
                out.extend(s.len().to_string().as_bytes());
                out.push(b':');
                out.extend(s);
            }
            Bencode::BList(items) => {
                out.push(b'l');
                for item in items {
                    item.encode_into(out);
                }
                out.push(b'e');
            }
            Bencode::BDict(dict) => {
                out.push(b'd');
                for (k, v) in dict {
                    Bencode::BString(k.clone()).encode_into(out);
                    v.encode_into(out);
                }
                out.push(b'e');
            }
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Bencode>> {
        match self {
            Bencode::BDict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Bencode::BString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Bencode::BNumber(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Bencode]> {
        match self {
            Bencode::BList(l) => Some(l),
            _ => None,
        }
    }
}
