//! Canonical byte encodings shared by leaf hashing and commitment signing.
//!
//! Amounts are normalised (trailing zeros stripped) and length-prefixed, so
//! `107`, `107.0` and `107.00` always encode to the same bytes.

use rust_decimal::Decimal;

/// Append a length-prefixed byte string.
pub fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Append the canonical encoding of a decimal amount.
pub fn encode_amount(buf: &mut Vec<u8>, amount: Decimal) {
    let text = amount.normalize().to_string();
    encode_bytes(buf, text.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_does_not_change_encoding() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        encode_amount(&mut a, Decimal::new(107, 0));
        encode_amount(&mut b, Decimal::new(10700, 2));
        assert_eq!(a, b);
    }

    #[test]
    fn length_prefix_separates_fields() {
        let mut a = Vec::new();
        encode_bytes(&mut a, b"ab");
        encode_bytes(&mut a, b"c");
        let mut b = Vec::new();
        encode_bytes(&mut b, b"a");
        encode_bytes(&mut b, b"bc");
        assert_ne!(a, b);
    }
}
