//! Unsigned LEB128 varints, as used by CAR section framing and multicodec prefixes

/// Decode an unsigned varint from the front of `data`.
///
/// Returns the value and the number of bytes consumed, or `None` if the input
/// ends mid-varint or the value does not fit in 64 bits.
pub fn decode_uvarint(data: &[u8]) -> Option<(u64, usize)> {
    let mut x: u64 = 0;
    let mut s: u32 = 0;
    for (i, b) in data.iter().copied().enumerate() {
        if i == 10 {
            return None;
        }
        if b < 0x80 {
            if i == 9 && b > 1 {
                return None;
            }
            return Some((x | ((b as u64) << s), i + 1));
        }
        x |= ((b & 0x7F) as u64) << s;
        s += 7;
    }
    None
}

/// Encode an unsigned varint
pub fn encode_uvarint(mut x: u64) -> Vec<u8> {
    let mut out = Vec::new();
    while x >= 0x80 {
        out.push(((x as u8) & 0x7F) | 0x80);
        x >>= 7;
    }
    out.push(x as u8);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte() {
        assert_eq!(decode_uvarint(&[0x00]), Some((0, 1)));
        assert_eq!(decode_uvarint(&[0x7F, 0xFF]), Some((127, 1)));
    }

    #[test]
    fn test_multi_byte() {
        // 0x1200 (p256-pub multicodec)
        assert_eq!(decode_uvarint(&[0x80, 0x24]), Some((0x1200, 2)));
        assert_eq!(encode_uvarint(0x1200), vec![0x80, 0x24]);
        assert_eq!(encode_uvarint(0xE7), vec![0xE7, 0x01]);
        assert_eq!(decode_uvarint(&encode_uvarint(u64::MAX)), Some((u64::MAX, 10)));
    }

    #[test]
    fn test_truncated() {
        assert_eq!(decode_uvarint(&[]), None);
        assert_eq!(decode_uvarint(&[0x80]), None);
        assert_eq!(decode_uvarint(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn test_overlong() {
        assert_eq!(decode_uvarint(&[0xFF; 11]), None);
        let mut too_big = vec![0xFF; 9];
        too_big.push(0x02);
        assert_eq!(decode_uvarint(&too_big), None);
    }
}
