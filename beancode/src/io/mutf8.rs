//! JVM "modified UTF-8" (`DataOutput.writeUTF` convention).
//!
//! Differences from standard UTF-8: U+0000 is encoded as the two-byte
//! sequence `C0 80`, and characters outside the basic multilingual plane are
//! encoded as a UTF-16 surrogate pair with each surrogate encoded as a
//! three-byte group (CESU-8). No group is ever four bytes long.
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid modified UTF-8 at byte {position}")]
pub struct Mutf8Error {
    pub position: usize,
}

#[cold]
const fn malformed(position: usize) -> Mutf8Error {
    Mutf8Error { position }
}

/// Encode `s` as modified UTF-8, appending to `out`.
pub fn encode_into(s: &str, out: &mut Vec<u8>) {
    let mut units = [0u16; 2];
    for c in s.chars() {
        let code = c as u32;
        match code {
            0 => out.extend_from_slice(&[0xC0, 0x80]),
            0x01..=0x7F => out.push(code as u8),
            0x80..=0x7FF => out.extend_from_slice(&[
                0xC0 | (code >> 6) as u8,
                0x80 | (code & 0x3F) as u8,
            ]),
            0x800..=0xFFFF => encode_unit(code as u16, out),
            _ => {
                for &unit in c.encode_utf16(&mut units).iter() {
                    encode_unit(unit, out);
                }
            }
        }
    }
}

/// Encode `s` as modified UTF-8 into a fresh buffer.
pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    encode_into(s, &mut out);
    out
}

fn encode_unit(unit: u16, out: &mut Vec<u8>) {
    out.extend_from_slice(&[
        0xE0 | (unit >> 12) as u8,
        0x80 | ((unit >> 6) & 0x3F) as u8,
        0x80 | (unit & 0x3F) as u8,
    ]);
}

/// Decode modified UTF-8 bytes into a `String`.
///
/// Surrogate pairs must be well formed; an unpaired surrogate is malformed
/// input because it has no Rust `char` representation.
pub fn decode(bytes: &[u8]) -> Result<String, Mutf8Error> {
    let mut out = String::with_capacity(bytes.len());
    let mut pending_high: Option<u16> = None;
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let b = bytes[i];
        let unit = match b {
            0x00..=0x7F => {
                i += 1;
                b as u16
            }
            0xC0..=0xDF => {
                let b2 = continuation(bytes, i + 1)?;
                i += 2;
                (((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16
            }
            0xE0..=0xEF => {
                let b2 = continuation(bytes, i + 1)?;
                let b3 = continuation(bytes, i + 2)?;
                i += 3;
                (((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16
            }
            _ => return Err(malformed(start)),
        };
        match pending_high.take() {
            Some(high) => match unit {
                0xDC00..=0xDFFF => {
                    let code =
                        0x10000 + (((high - 0xD800) as u32) << 10) + (unit - 0xDC00) as u32;
                    match char::from_u32(code) {
                        Some(c) => out.push(c),
                        None => return Err(malformed(start)),
                    }
                }
                _ => return Err(malformed(start)),
            },
            None => match unit {
                0xD800..=0xDBFF => pending_high = Some(unit),
                0xDC00..=0xDFFF => return Err(malformed(start)),
                _ => match char::from_u32(unit as u32) {
                    Some(c) => out.push(c),
                    None => return Err(malformed(start)),
                },
            },
        }
    }
    if pending_high.is_some() {
        return Err(malformed(bytes.len()));
    }
    Ok(out)
}

fn continuation(bytes: &[u8], at: usize) -> Result<u8, Mutf8Error> {
    match bytes.get(at) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(b),
        _ => Err(malformed(at)),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::proptest_config::proptest_cfg, proptest::prelude::*};

    #[test]
    fn ascii_passes_through() {
        assert_eq!(encode("hi"), b"hi");
        assert_eq!(decode(b"hi").unwrap(), "hi");
    }

    #[test]
    fn nul_is_two_bytes() {
        assert_eq!(encode("a\0b"), &[b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&[b'a', 0xC0, 0x80, b'b']).unwrap(), "a\0b");
    }

    #[test]
    fn supplementary_chars_use_surrogate_pairs() {
        // U+1F600 -> D83D DE00 -> two 3-byte groups, never a 4-byte group.
        let bytes = encode("😀");
        assert_eq!(bytes.len(), 6);
        assert_eq!(bytes, &[0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]);
        assert_eq!(decode(&bytes).unwrap(), "😀");
    }

    #[test]
    fn rejects_truncated_group() {
        assert_eq!(decode(&[0xC3]).unwrap_err(), malformed(1));
        assert_eq!(decode(&[0xE2, 0x82]).unwrap_err(), malformed(2));
    }

    #[test]
    fn rejects_four_byte_utf8() {
        // Standard UTF-8 for U+1F600; modified UTF-8 has no 4-byte groups.
        assert!(decode("😀".as_bytes()).is_err());
    }

    #[test]
    fn rejects_unpaired_surrogate() {
        let mut bytes = Vec::new();
        encode_unit(0xD83D, &mut bytes);
        assert_eq!(decode(&bytes).unwrap_err(), malformed(3));
        let mut bytes = Vec::new();
        encode_unit(0xDE00, &mut bytes);
        assert!(decode(&bytes).is_err());
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn roundtrip(s in ".*") {
            prop_assert_eq!(decode(&encode(&s)).unwrap(), s);
        }

        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..=64)) {
            let _ = decode(&bytes);
        }
    }
}
