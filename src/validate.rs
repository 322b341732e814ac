//! Bounds validation for directory values.
//!
//! Every check exists in two modes:
//!
//! * **soft** (`*_ok`, [`equals`]) - returns `bool` and never fails. Scorers
//!   use these to decide whether a structural predicate earns its weight.
//! * **hard** (`check_*`) - returns the value converted to an unsigned type,
//!   or a structured error. Parsers use these; a directory value outside its
//!   bounds means either a wrong match or corruption, and the parse must stop.
//!
//! Inputs accept any primitive integer. Values are widened to `i128` so
//! negative signed fields and `offset + length` sums never overflow.

use crate::error::Bound;
use crate::{Error, Result};

/// `0 <= value <= container_size`.
pub fn offset_ok(value: impl Into<i128>, container_size: u64) -> bool {
    let v = value.into();
    v >= 0 && v <= container_size as i128
}

/// `value >= 0`, and `value <= bound` when a bound is given.
pub fn length_ok(value: impl Into<i128>, bound: Option<u64>) -> bool {
    let v = value.into();
    v >= 0 && bound.is_none_or(|b| v <= b as i128)
}

/// Offset and length are both valid and `offset + length <= container_size`.
pub fn range_ok(offset: impl Into<i128>, length: impl Into<i128>, container_size: u64) -> bool {
    let (o, l) = (offset.into(), length.into());
    o >= 0 && l >= 0 && o + l <= container_size as i128
}

/// `0 < value <= ceiling`.
pub fn num_files_ok(value: impl Into<i128>, ceiling: u64) -> bool {
    let v = value.into();
    v > 0 && v <= ceiling as i128
}

/// `0 < n <= max_len`.
pub fn filename_length_ok(n: impl Into<i128>, max_len: usize) -> bool {
    let v = n.into();
    v > 0 && v <= max_len as i128
}

/// Non-empty, no control characters, at most `max_len` bytes.
pub fn filename_ok(name: &str, max_len: usize) -> bool {
    filename_length_ok(name.len() as u64, max_len) && !name.chars().any(char::is_control)
}

/// Exact match for fields that restate another value.
pub fn equals(a: impl Into<i128>, b: impl Into<i128>) -> bool {
    a.into() == b.into()
}

/// Hard form of [`offset_ok`].
pub fn check_offset(value: impl Into<i128>, container_size: u64) -> Result<u64> {
    let v = value.into();
    if offset_ok(v, container_size) {
        Ok(v as u64)
    } else {
        Err(Error::out_of_bounds(Bound::Offset, v, container_size))
    }
}

/// Hard form of [`length_ok`].
pub fn check_length(value: impl Into<i128>, bound: Option<u64>) -> Result<u64> {
    let v = value.into();
    if length_ok(v, bound) {
        Ok(v as u64)
    } else {
        Err(Error::out_of_bounds(
            Bound::Length,
            v,
            bound.unwrap_or(u64::MAX),
        ))
    }
}

/// Hard form of [`range_ok`]. Returns `(offset, length)`.
pub fn check_range(
    offset: impl Into<i128>,
    length: impl Into<i128>,
    container_size: u64,
) -> Result<(u64, u64)> {
    let offset = check_offset(offset, container_size)?;
    let length = check_length(length, Some(container_size))?;
    let end = offset as i128 + length as i128;
    if end > container_size as i128 {
        return Err(Error::out_of_bounds(Bound::Range, end, container_size));
    }
    Ok((offset, length))
}

/// Hard form of [`num_files_ok`].
pub fn check_num_files(value: impl Into<i128>, ceiling: u64) -> Result<usize> {
    let v = value.into();
    if num_files_ok(v, ceiling) {
        Ok(v as usize)
    } else {
        Err(Error::out_of_bounds(Bound::FileCount, v, ceiling))
    }
}

/// Hard form of [`filename_length_ok`].
pub fn check_filename_length(n: impl Into<i128>, max_len: usize) -> Result<usize> {
    let v = n.into();
    if filename_length_ok(v, max_len) {
        Ok(v as usize)
    } else {
        Err(Error::out_of_bounds(Bound::NameLength, v, max_len as u64))
    }
}

/// Hard form of [`filename_ok`].
pub fn check_filename(name: &str, max_len: usize) -> Result<()> {
    if filename_ok(name, max_len) {
        Ok(())
    } else {
        Err(Error::InvalidName {
            name: name.to_owned(),
        })
    }
}

/// Hard form of [`equals`].
pub fn check_equals(field: &'static str, expected: u64, found: u64) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::Mismatch {
            field,
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        assert!(offset_ok(0u32, 10));
        assert!(offset_ok(10u32, 10));
        assert!(!offset_ok(11u32, 10));
        assert!(!offset_ok(-1i32, 10));
        assert_eq!(check_offset(7i32, 10).unwrap(), 7);
        assert!(matches!(
            check_offset(-3i32, 10),
            Err(Error::OutOfBounds {
                bound: Bound::Offset,
                value: -3,
                limit: 10
            })
        ));
    }

    #[test]
    fn lengths_and_ranges() {
        assert!(length_ok(5u64, None));
        assert!(!length_ok(-5i64, None));
        assert!(!length_ok(11u64, Some(10)));
        assert!(range_ok(4u32, 6u32, 10));
        assert!(!range_ok(5u32, 6u32, 10));
        assert!(!range_ok(u64::MAX, u64::MAX, 10));
        assert_eq!(check_range(2u32, 3u32, 10).unwrap(), (2, 3));
        assert!(matches!(
            check_range(8u32, 3u32, 10),
            Err(Error::OutOfBounds {
                bound: Bound::Range,
                ..
            })
        ));
    }

    #[test]
    fn file_counts() {
        assert!(!num_files_ok(0u32, 100));
        assert!(num_files_ok(100u32, 100));
        assert!(!num_files_ok(101u32, 100));
        assert!(!num_files_ok(-1i32, 100));
        assert_eq!(check_num_files(3u16, 100).unwrap(), 3);
    }

    #[test]
    fn file_names() {
        assert!(filename_ok("data/a.bin", 64));
        assert!(!filename_ok("", 64));
        assert!(!filename_ok("bad\u{1}name", 64));
        assert!(!filename_ok("abcdef", 5));
        assert!(check_filename("x\ny", 64).is_err());
        assert!(check_filename_length(0u8, 8).is_err());
        assert_eq!(check_filename_length(8u8, 8).unwrap(), 8);
    }

    #[test]
    fn self_consistency() {
        assert!(equals(0x14u16, 0x14u32));
        assert!(!equals(-1i32, u32::MAX));
        assert!(check_equals("total size", 10, 10).is_ok());
        assert!(matches!(
            check_equals("total size", 10, 12),
            Err(Error::Mismatch { found: 12, .. })
        ));
    }
}
