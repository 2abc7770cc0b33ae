//! Percent-decoding and normalization of request paths.
//!
//! Both steps write into caller-owned buffers sized from their input, so the
//! result never aliases the connection buffer. The order is always
//! decode-then-normalize: `%2e%2e` has to become `..` before traversal
//! checks can see it.

use crate::errors::ErrorKind;

/// Decodes `%XX` escapes of `src` into `dst`.
///
/// A `%` without two hexadecimal digits after it is rejected with
/// [`ErrorKind::BadRequestPath`]. `+` is left untouched.
pub fn percent_decode(src: &[u8], dst: &mut Vec<u8>) -> Result<(), ErrorKind> {
    let bound = src.len();
    dst.clear();
    dst.reserve_exact(bound);

    let mut i = 0;
    while i < src.len() {
        let byte = match src[i] {
            b'%' => {
                if i + 2 >= src.len() {
                    return Err(ErrorKind::BadRequestPath);
                }
                let hi = hex_value(src[i + 1]).ok_or(ErrorKind::BadRequestPath)?;
                let lo = hex_value(src[i + 2]).ok_or(ErrorKind::BadRequestPath)?;
                i += 3;
                hi << 4 | lo
            }
            other => {
                i += 1;
                other
            }
        };

        if dst.len() >= bound {
            return Err(ErrorKind::BadRequestPath);
        }
        dst.push(byte);
    }

    Ok(())
}

/// Collapses `src` into a rooted path without `.`, `..` or empty segments.
///
/// A `..` with nothing left to pop would leave the served root and fails
/// with [`ErrorKind::BadRequestPath`], as does any non-empty path that does
/// not start with `/`. An empty path is the root. The output is never longer
/// than the input (at least one byte for the root itself).
pub fn normalize(src: &[u8], dst: &mut Vec<u8>) -> Result<(), ErrorKind> {
    let bound = src.len().max(1);
    dst.clear();
    dst.reserve_exact(bound);
    dst.push(b'/');

    match src.first() {
        None => return Ok(()),
        Some(b'/') => {}
        Some(_) => return Err(ErrorKind::BadRequestPath),
    }

    // Length of `dst` before each pushed segment, separator included.
    let mut marks: Vec<usize> = Vec::new();

    for segment in src.split(|&b| b == b'/') {
        match segment {
            b"" | b"." => {}
            b".." => {
                let mark = marks.pop().ok_or(ErrorKind::BadRequestPath)?;
                dst.truncate(mark);
            }
            _ => {
                let mark = dst.len();
                let separator = usize::from(mark > 1);

                if mark + separator + segment.len() > bound {
                    return Err(ErrorKind::BadRequestPath);
                }
                if separator == 1 {
                    dst.push(b'/');
                }
                dst.extend_from_slice(segment);
                marks.push(mark);
            }
        }
    }

    Ok(())
}

#[inline(always)]
const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
