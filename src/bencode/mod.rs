use std::collections::BTreeMap;

/// A decoded bencode value.
///
/// Dictionaries use a `BTreeMap` so iteration order is always ascending
/// lexicographic byte order, which is exactly what `encode` needs to
/// produce byte-faithful output (required for info-hash computation).
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Bencode {
    Int(i64),
    Str(Vec<u8>),
    List(Vec<Bencode>),
    Dict(BTreeMap<Vec<u8>, Bencode>),
}

#[derive(PartialEq, Eq, Debug)]
pub enum BencodeError {
    UnexpectedEof,
    InvalidTag,
    InvalidInteger,
    InvalidStringLength,
    NonStringDictKey,
    TrailingBytes,
}

/// Implemented by values that know how to describe themselves as bencode,
/// so callers don't hand-assemble `Bencode::Dict`s at every call site.
pub trait ToBencode {
    fn to_bencode(&self) -> Bencode;
}

impl ToBencode for Bencode {
    fn to_bencode(&self) -> Bencode {
        self.clone()
    }
}

impl ToBencode for str {
    fn to_bencode(&self) -> Bencode {
        Bencode::Str(self.as_bytes().to_vec())
    }
}

impl ToBencode for String {
    fn to_bencode(&self) -> Bencode {
        Bencode::Str(self.as_bytes().to_vec())
    }
}

impl ToBencode for i64 {
    fn to_bencode(&self) -> Bencode {
        Bencode::Int(*self)
    }
}

impl Bencode {
    /// Decodes a single top-level bencoded value.
    ///
    /// Fails with `TrailingBytes` if anything follows the value.
    pub fn decode(data: &[u8]) -> Result<Bencode, BencodeError> {
        let (value, consumed) = Self::decode_value(data)?;
        if consumed != data.len() {
            return Err(BencodeError::TrailingBytes);
        }
        Ok(value)
    }

    fn decode_value(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        match data.first() {
            Some(b'i') => Self::decode_int(data),
            Some(b'l') => Self::decode_list(data),
            Some(b'd') => Self::decode_dict(data),
            Some(b'0'..=b'9') => Self::decode_str(data),
            Some(_) => Err(BencodeError::InvalidTag),
            None => Err(BencodeError::UnexpectedEof),
        }
    }

    fn decode_int(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        let end = data
            .iter()
            .position(|&b| b == b'e')
            .ok_or(BencodeError::UnexpectedEof)?;
        let digits = &data[1..end];
        Self::validate_integer_digits(digits)?;
        let text = std::str::from_utf8(digits).map_err(|_| BencodeError::InvalidInteger)?;
        let value = text.parse::<i64>().map_err(|_| BencodeError::InvalidInteger)?;
        Ok((Bencode::Int(value), end + 1))
    }

    fn validate_integer_digits(digits: &[u8]) -> Result<(), BencodeError> {
        if digits.is_empty() {
            return Err(BencodeError::InvalidInteger);
        }
        let (sign, rest) = match digits.split_first() {
            Some((b'-', rest)) => (true, rest),
            _ => (false, digits),
        };
        if rest.is_empty() || !rest.iter().all(u8::is_ascii_digit) {
            return Err(BencodeError::InvalidInteger);
        }
        if rest.len() > 1 && rest[0] == b'0' {
            return Err(BencodeError::InvalidInteger);
        }
        if sign && rest == b"0" {
            return Err(BencodeError::InvalidInteger);
        }
        Ok(())
    }

    fn decode_str(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        let colon = data
            .iter()
            .position(|&b| b == b':')
            .ok_or(BencodeError::UnexpectedEof)?;
        let len_digits = &data[0..colon];
        if len_digits.is_empty() || !len_digits.iter().all(u8::is_ascii_digit) {
            return Err(BencodeError::InvalidStringLength);
        }
        let len: usize = std::str::from_utf8(len_digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::InvalidStringLength)?;

        let start = colon + 1;
        let end = start
            .checked_add(len)
            .ok_or(BencodeError::InvalidStringLength)?;
        if end > data.len() {
            return Err(BencodeError::UnexpectedEof);
        }
        Ok((Bencode::Str(data[start..end].to_vec()), end))
    }

    fn decode_list(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        let mut i = 1;
        let mut items = Vec::new();
        loop {
            match data.get(i) {
                Some(b'e') => return Ok((Bencode::List(items), i + 1)),
                Some(_) => {
                    let (value, size) = Self::decode_value(&data[i..])?;
                    items.push(value);
                    i += size;
                }
                None => return Err(BencodeError::UnexpectedEof),
            }
        }
    }

    fn decode_dict(data: &[u8]) -> Result<(Bencode, usize), BencodeError> {
        let mut i = 1;
        let mut entries = BTreeMap::new();
        loop {
            match data.get(i) {
                Some(b'e') => return Ok((Bencode::Dict(entries), i + 1)),
                Some(_) => {
                    let (key, key_size) = Self::decode_value(&data[i..])?;
                    i += key_size;
                    let key = match key {
                        Bencode::Str(key) => key,
                        _ => return Err(BencodeError::NonStringDictKey),
                    };
                    let (value, value_size) = Self::decode_value(&data[i..])?;
                    i += value_size;
                    entries.insert(key, value);
                }
                None => return Err(BencodeError::UnexpectedEof),
            }
        }
    }

    /// Encodes back to bencoded bytes. Dict keys are emitted in ascending
    /// byte order (guaranteed by `BTreeMap`'s iteration order), integers
    /// without padding — so `encode(decode(x)) == x` for any valid `x`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Bencode::Int(n) => {
                out.push(b'i');
                out.extend(n.to_string().as_bytes());
                out.push(b'e');
            }
            Bencode::Str(bytes) => {
                out.extend(bytes.len().to_string().as_bytes());
                out.push(b':');
                out.extend(bytes);
            }
            Bencode::List(items) => {
                out.push(b'l');
                for item in items {
                    item.encode_into(out);
                }
                out.push(b'e');
            }
            Bencode::Dict(entries) => {
                out.push(b'd');
                for (key, value) in entries {
                    Bencode::Str(key.clone()).encode_into(out);
                    value.encode_into(out);
                }
                out.push(b'e');
            }
        }
    }
}

/// Convenience builder for bencode dictionaries.
#[derive(Default)]
pub struct DictBuilder {
    entries: BTreeMap<Vec<u8>, Bencode>,
}

impl DictBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, key: &[u8], value: impl ToBencode) -> Self {
        self.entries.insert(key.to_vec(), value.to_bencode());
        self
    }

    pub fn build(self) -> Bencode {
        Bencode::Dict(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_string() {
        assert_eq!(
            Bencode::decode(b"4:spam").unwrap(),
            Bencode::Str(b"spam".to_vec())
        );
    }

    #[test]
    fn decodes_empty_string() {
        assert_eq!(Bencode::decode(b"0:").unwrap(), Bencode::Str(vec![]));
    }

    #[test]
    fn decodes_positive_and_negative_integers() {
        assert_eq!(Bencode::decode(b"i3e").unwrap(), Bencode::Int(3));
        assert_eq!(Bencode::decode(b"i-3e").unwrap(), Bencode::Int(-3));
    }

    #[test]
    fn rejects_leading_zero_integer() {
        assert_eq!(
            Bencode::decode(b"i03e").unwrap_err(),
            BencodeError::InvalidInteger
        );
    }

    #[test]
    fn rejects_negative_zero() {
        assert_eq!(
            Bencode::decode(b"i-0e").unwrap_err(),
            BencodeError::InvalidInteger
        );
    }

    #[test]
    fn decodes_nested_list() {
        assert_eq!(
            Bencode::decode(b"ll3:fooee").unwrap(),
            Bencode::List(vec![Bencode::List(vec![Bencode::Str(b"foo".to_vec())])])
        );
    }

    #[test]
    fn decodes_dict_sorted_by_key() {
        let data = b"d3:cow3:moo4:spam4:eggse";
        let mut dict = BTreeMap::new();
        dict.insert(b"cow".to_vec(), Bencode::Str(b"moo".to_vec()));
        dict.insert(b"spam".to_vec(), Bencode::Str(b"eggs".to_vec()));
        assert_eq!(Bencode::decode(data).unwrap(), Bencode::Dict(dict));
    }

    #[test]
    fn rejects_trailing_bytes() {
        assert_eq!(
            Bencode::decode(b"i1eextra").unwrap_err(),
            BencodeError::TrailingBytes
        );
    }

    #[test]
    fn rejects_non_string_dict_key() {
        assert_eq!(
            Bencode::decode(b"di1ei2ee").unwrap_err(),
            BencodeError::NonStringDictKey
        );
    }

    #[test]
    fn round_trips_every_value_kind() {
        let samples: Vec<&[u8]> = vec![
            b"4:spam",
            b"i42e",
            b"i-7e",
            b"le",
            b"l4:spam4:eggse",
            b"de",
            b"d3:bar4:spam3:fooi42ee",
        ];
        for sample in samples {
            let decoded = Bencode::decode(sample).unwrap();
            assert_eq!(decoded.encode(), sample);
        }
    }

    #[test]
    fn dict_builder_sorts_keys_on_encode() {
        let value = DictBuilder::new()
            .insert(b"zebra", "z")
            .insert(b"apple", "a")
            .build();
        assert_eq!(value.encode(), b"d5:apple1:a5:zebra1:ze");
    }
}
