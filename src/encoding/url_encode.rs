/// Percent-encodes raw bytes as `%XX%XX...`.
///
/// Trackers accept this unconditionally (it is a strict superset of the
/// minimal encoding that leaves unreserved characters bare), and it is
/// exactly what's needed to put a raw 20-byte info-hash on the wire.
///
/// # Example
///
/// ```rust
/// use bitpull::encoding::url_encode::encode;
///
/// assert_eq!(encode(&[0x2cu8, 0x6b]), "%2c%6b");
/// ```
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for byte in bytes {
        out.push('%');
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_empty_slice_to_empty_string() {
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn encodes_info_hash_bytes() {
        let bytes: [u8; 5] = [0x2c, 0x6b, 0x68, 0x58, 0xd6];
        assert_eq!(encode(&bytes), "%2c%6b%68%58%d6");
    }
}
