//! Byte readers used by scorers and parsers.
//!
//! Every reader consumes exactly its width or fails; a short stream surfaces
//! as [`Error::UnexpectedEof`] through the `io::Error` conversion.

use std::io::Read;

use crate::{Error, Result};

/// Read one byte.
#[inline]
pub(crate) fn u8<R: Read>(r: &mut R) -> Result<u8> {
    Ok(bytesa::<1>(r)?[0])
}

/// Fixed-width integer readers, one per (type, byte order) pair directories
/// actually use.
macro_rules! int_readers {
    ($($(#[$doc:meta])* $name:ident => $ty:ty, $from:ident;)*) => {
        $(
            $(#[$doc])*
            #[inline]
            pub(crate) fn $name<R: Read>(r: &mut R) -> Result<$ty> {
                Ok(<$ty>::$from(bytesa(r)?))
            }
        )*
    };
}

int_readers! {
    le_u16 => u16, from_le_bytes;
    le_u32 => u32, from_le_bytes;
    /// PC formats store offsets signed; the validator rejects negatives.
    le_i32 => i32, from_le_bytes;
    le_u64 => u64, from_le_bytes;
    be_u16 => u16, from_be_bytes;
    be_u32 => u32, from_be_bytes;
}

/// `u16` in the byte order given by a BOM.
#[inline]
pub(crate) fn end_u16<R: Read>(r: &mut R, le: bool) -> Result<u16> {
    if le { le_u16(r) } else { be_u16(r) }
}

/// `u32` in the byte order given by a BOM.
#[inline]
pub(crate) fn end_u32<R: Read>(r: &mut R, le: bool) -> Result<u32> {
    if le { le_u32(r) } else { be_u32(r) }
}

#[inline]
pub(crate) fn bytesa<const N: usize>(r: &mut impl Read) -> Result<[u8; N]> {
    let mut b = [0u8; N];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// `len` bytes into a fresh buffer.
pub(crate) fn bytesv<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut b = vec![0u8; len];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Consume a signature, failing with [`Error::BadMagic`] on mismatch.
pub(crate) fn magic<R: Read, const N: usize>(r: &mut R, expected: &[u8; N]) -> Result<()> {
    if bytesa::<N>(r)? != *expected {
        return Err(Error::BadMagic);
    }
    Ok(())
}

/// Name starting at `offset` in a string table.
pub(crate) fn null_string(table: &[u8], offset: usize) -> Result<String> {
    let tail = table.get(offset..).ok_or(Error::InvalidRange)?;
    match tail.split(|&b| b == 0).next() {
        Some(name) if name.len() < tail.len() => Ok(lossy(name)),
        _ => Err(Error::UnterminatedName),
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Decode a fixed-width name field, stopping at the first null byte.
///
/// Unlike [`null_string`] a field that fills its whole width is accepted.
pub(crate) fn fixed_string(field: &[u8]) -> String {
    lossy(field.split(|&b| b == 0).next().unwrap_or_default())
}

/// Read a null-terminated string byte-by-byte from a reader.
///
/// Stops with [`Error::UnterminatedName`] after `max` bytes without a null.
pub(crate) fn read_null_string<R: Read>(r: &mut R, max: usize) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let b = u8(r)?;
        if b == 0 {
            break;
        }
        if bytes.len() == max {
            return Err(Error::UnterminatedName);
        }
        bytes.push(b);
    }
    Ok(lossy(&bytes))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn fixed_string_stops_at_null_or_width() {
        assert_eq!(fixed_string(b"maps/e1m1.bsp\0\0\0"), "maps/e1m1.bsp");
        assert_eq!(fixed_string(b"abcd"), "abcd");
    }

    #[test]
    fn read_null_string_is_bounded() {
        let mut r = Cursor::new(b"abcdef".to_vec());
        assert!(matches!(
            read_null_string(&mut r, 3),
            Err(Error::UnterminatedName)
        ));
        let mut r = Cursor::new(b"ab\0cd".to_vec());
        assert_eq!(read_null_string(&mut r, 16).unwrap(), "ab");
    }

    #[test]
    fn string_table_lookup() {
        let table = b"a.nca\0b.tik\0";
        assert_eq!(null_string(table, 6).unwrap(), "b.tik");
        assert!(matches!(null_string(b"abc", 0), Err(Error::UnterminatedName)));
        assert!(matches!(null_string(table, 40), Err(Error::InvalidRange)));
    }

    #[test]
    fn short_reads_are_eof() {
        let mut r = Cursor::new(vec![1u8, 2]);
        assert!(matches!(le_u32(&mut r), Err(Error::UnexpectedEof)));
    }
}
