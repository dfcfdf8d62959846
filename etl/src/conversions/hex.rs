use std::fmt::Write;

/// Encodes bytes in the `\x`-prefixed lowercase hex form used for bytea text output.
pub fn encode_bytea_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(2 + bytes.len() * 2);
    encoded.push_str("\\x");
    for byte in bytes {
        // Writing into a `String` cannot fail.
        let _ = write!(encoded, "{byte:02x}");
    }

    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_bytea_hex_empty() {
        assert_eq!(encode_bytea_hex(&[]), "\\x");
    }

    #[test]
    fn encode_bytea_hex_multiple_bytes() {
        assert_eq!(encode_bytea_hex(b"Hello"), "\\x48656c6c6f");
    }

    #[test]
    fn encode_bytea_hex_pads_single_digits() {
        assert_eq!(encode_bytea_hex(&[0x00, 0x0f, 0xff]), "\\x000fff");
    }
}
