//! Endian-aware primitive parsers and writers for CLOG fixed layouts

use nom::bytes::complete::take;
use nom::number::complete as num;
use nom::number::Endianness;
use nom::IResult;

/// Byte order of a CLOG file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteOrder {
    pub big_endian: bool,
}

impl ByteOrder {
    pub const LITTLE: ByteOrder = ByteOrder { big_endian: false };
    pub const BIG: ByteOrder = ByteOrder { big_endian: true };

    fn endianness(&self) -> Endianness {
        if self.big_endian {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    pub fn i32<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], i32> {
        num::i32(self.endianness())(input)
    }

    pub fn i64<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], i64> {
        num::i64(self.endianness())(input)
    }

    pub fn f64<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], f64> {
        num::f64(self.endianness())(input)
    }

    pub fn put_i32(&self, out: &mut Vec<u8>, v: i32) {
        if self.big_endian {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn put_i64(&self, out: &mut Vec<u8>, v: i64) {
        if self.big_endian {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn put_f64(&self, out: &mut Vec<u8>, v: f64) {
        if self.big_endian {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

/// NUL-padded string of exactly `len` bytes
pub fn fixed_str(input: &[u8], len: usize) -> IResult<&[u8], String> {
    let (input, raw) = take(len)(input)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok((input, String::from_utf8_lossy(&raw[..end]).into_owned()))
}

/// Raw byte array of exactly `N` bytes
pub fn fixed_bytes<const N: usize>(input: &[u8]) -> IResult<&[u8], [u8; N]> {
    let (input, raw) = take(N)(input)?;
    let mut out = [0u8; N];
    out.copy_from_slice(raw);
    Ok((input, out))
}

/// Write `s` truncated or NUL-padded to `len` bytes; the last byte is always NUL
pub fn put_fixed_str(out: &mut Vec<u8>, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(len.saturating_sub(1));
    out.extend_from_slice(&bytes[..n]);
    out.resize(out.len() + (len - n), 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_orders_disagree() {
        let mut le = Vec::new();
        let mut be = Vec::new();
        ByteOrder::LITTLE.put_i32(&mut le, 1);
        ByteOrder::BIG.put_i32(&mut be, 1);

        assert_eq!(le, vec![1, 0, 0, 0]);
        assert_eq!(be, vec![0, 0, 0, 1]);
        assert_eq!(ByteOrder::BIG.i32(&be).unwrap().1, 1);
        assert_eq!(ByteOrder::LITTLE.i32(&be).unwrap().1, 1 << 24);
    }

    #[test]
    fn test_fixed_str_truncates_and_pads() {
        let mut out = Vec::new();
        put_fixed_str(&mut out, "MPI_Send", 12);
        assert_eq!(out.len(), 12);
        assert_eq!(fixed_str(&out, 12).unwrap().1, "MPI_Send");

        let mut out = Vec::new();
        put_fixed_str(&mut out, "abcdefgh", 4);
        assert_eq!(out, b"abc\0");
    }

    #[test]
    fn test_short_input_is_an_error() {
        assert!(ByteOrder::LITTLE.f64(&[0u8; 4]).is_err());
        assert!(fixed_bytes::<8>(&[0u8; 7]).is_err());
    }
}
