//! Stream traits consumed by the codec.
//!
//! [`Output`] and [`Input`] expose the primitive operations the wire format
//! is built from: big-endian fixed-width integers and floats, single flag
//! bytes, and length-prefixed modified UTF-8 strings. Both traits are
//! implemented for every [`std::io::Write`] / [`std::io::Read`], so a
//! `Vec<u8>`, a slice, a file or a socket all work directly.
//!
//! All multi-byte values are big-endian; there is no endianness negotiation.
use {
    crate::error::{string_too_long, DecodeError, DecodeResult, EncodeError, EncodeResult},
    std::io,
};

pub mod mutf8;

/// Byte sink with the primitive write operations of the wire format.
///
/// Only [`Output::write_bytes`] is required; every typed writer is derived
/// from it.
pub trait Output {
    /// Write all of `buf` to the sink.
    fn write_bytes(&mut self, buf: &[u8]) -> EncodeResult<()>;

    #[inline]
    fn write_u8(&mut self, v: u8) -> EncodeResult<()> {
        self.write_bytes(&[v])
    }

    #[inline]
    fn write_i8(&mut self, v: i8) -> EncodeResult<()> {
        self.write_u8(v as u8)
    }

    #[inline]
    fn write_bool(&mut self, v: bool) -> EncodeResult<()> {
        self.write_u8(v as u8)
    }

    #[inline]
    fn write_i16(&mut self, v: i16) -> EncodeResult<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    #[inline]
    fn write_u16(&mut self, v: u16) -> EncodeResult<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    #[inline]
    fn write_i32(&mut self, v: i32) -> EncodeResult<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    #[inline]
    fn write_u32(&mut self, v: u32) -> EncodeResult<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    #[inline]
    fn write_i64(&mut self, v: i64) -> EncodeResult<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    #[inline]
    fn write_u64(&mut self, v: u64) -> EncodeResult<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    #[inline]
    fn write_f32(&mut self, v: f32) -> EncodeResult<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    #[inline]
    fn write_f64(&mut self, v: f64) -> EncodeResult<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Write `s` as modified UTF-8 with a 2-byte length prefix.
    ///
    /// Errors if the encoded form exceeds 65535 bytes.
    fn write_utf(&mut self, s: &str) -> EncodeResult<()> {
        let bytes = mutf8::encode(s);
        let len = u16::try_from(bytes.len()).map_err(|_| string_too_long(bytes.len()))?;
        self.write_u16(len)?;
        self.write_bytes(&bytes)
    }
}

impl<W: io::Write + ?Sized> Output for W {
    #[inline]
    fn write_bytes(&mut self, buf: &[u8]) -> EncodeResult<()> {
        self.write_all(buf).map_err(EncodeError::from)
    }
}

/// Byte source with the primitive read operations of the wire format.
///
/// End of input maps to [`DecodeError::Eof`].
pub trait Input {
    /// Fill all of `buf` from the source.
    fn read_bytes(&mut self, buf: &mut [u8]) -> DecodeResult<()>;

    /// Discard exactly `n` bytes.
    fn skip_bytes(&mut self, n: usize) -> DecodeResult<()>;

    #[inline]
    fn read_u8(&mut self) -> DecodeResult<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    #[inline]
    fn read_i8(&mut self) -> DecodeResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    #[inline]
    fn read_bool(&mut self) -> DecodeResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    #[inline]
    fn read_i16(&mut self) -> DecodeResult<i16> {
        let mut buf = [0u8; 2];
        self.read_bytes(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    #[inline]
    fn read_u16(&mut self) -> DecodeResult<u16> {
        let mut buf = [0u8; 2];
        self.read_bytes(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    #[inline]
    fn read_i32(&mut self) -> DecodeResult<i32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    #[inline]
    fn read_u32(&mut self) -> DecodeResult<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    #[inline]
    fn read_i64(&mut self) -> DecodeResult<i64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    #[inline]
    fn read_u64(&mut self) -> DecodeResult<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    #[inline]
    fn read_f32(&mut self) -> DecodeResult<f32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(f32::from_be_bytes(buf))
    }

    #[inline]
    fn read_f64(&mut self) -> DecodeResult<f64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    /// Read a modified UTF-8 string with a 2-byte length prefix.
    fn read_utf(&mut self) -> DecodeResult<String> {
        let len = self.read_u16()? as usize;
        let mut bytes = vec![0u8; len];
        self.read_bytes(&mut bytes)?;
        mutf8::decode(&bytes)
            .map_err(|e| DecodeError::InvalidUtf { position: e.position })
    }
}

impl<R: io::Read + ?Sized> Input for R {
    #[inline]
    fn read_bytes(&mut self, buf: &mut [u8]) -> DecodeResult<()> {
        self.read_exact(buf).map_err(DecodeError::from)
    }

    fn skip_bytes(&mut self, mut n: usize) -> DecodeResult<()> {
        let mut chunk = [0u8; 512];
        while n > 0 {
            let take = n.min(chunk.len());
            self.read_exact(&mut chunk[..take]).map_err(DecodeError::from)?;
            n -= take;
        }
        Ok(())
    }
}

/// [`std::io::Write`] view of a `dyn` [`Output`], for the opaque object
/// fallback which hands the stream to `bincode`.
pub struct IoWriter<'a>(pub &'a mut dyn Output);

impl io::Write for IoWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .write_bytes(buf)
            .map_err(|e| io::Error::other(e.to_string()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// [`std::io::Read`] view of a `dyn` [`Input`], for the opaque object
/// fallback which hands the stream to `bincode`.
pub struct IoReader<'a>(pub &'a mut dyn Input);

impl io::Read for IoReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.read_bytes(buf) {
            Ok(()) => Ok(buf.len()),
            Err(DecodeError::Eof) => Err(io::ErrorKind::UnexpectedEof.into()),
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::proptest_config::proptest_cfg, proptest::prelude::*};

    #[test]
    fn primitives_are_big_endian() {
        let mut out = Vec::new();
        out.write_i32(-1).unwrap();
        out.write_i16(0x0102).unwrap();
        out.write_i64(1).unwrap();
        assert_eq!(
            out,
            [0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x02, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn utf_has_two_byte_length_prefix() {
        let mut out = Vec::new();
        out.write_utf("hi").unwrap();
        assert_eq!(out, [0x00, 0x02, b'h', b'i']);

        let mut input = out.as_slice();
        assert_eq!(input.read_utf().unwrap(), "hi");
    }

    #[test]
    fn oversized_utf_is_rejected() {
        let big = "x".repeat(70_000);
        let mut out = Vec::new();
        assert!(matches!(
            out.write_utf(&big),
            Err(EncodeError::StringTooLong(70_000))
        ));
    }

    #[test]
    fn short_read_is_eof() {
        let mut input: &[u8] = &[0x01];
        assert!(matches!(input.read_i32(), Err(DecodeError::Eof)));
    }

    #[test]
    fn skip_past_end_is_eof() {
        let mut input: &[u8] = &[0u8; 600];
        input.skip_bytes(512).unwrap();
        assert!(matches!(input.skip_bytes(100), Err(DecodeError::Eof)));
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn utf_roundtrip(s in ".*") {
            let mut out = Vec::new();
            if out.write_utf(&s).is_ok() {
                let mut input = out.as_slice();
                prop_assert_eq!(input.read_utf().unwrap(), s);
            }
        }

        #[test]
        fn i64_roundtrip(v in any::<i64>()) {
            let mut out = Vec::new();
            out.write_i64(v).unwrap();
            let mut input = out.as_slice();
            prop_assert_eq!(input.read_i64().unwrap(), v);
        }
    }
}
