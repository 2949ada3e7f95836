//! Compact tuple codec.
//!
//! Composite values (`(value, expiry class)`), reverse-index keys
//! (`(group, field)`) and group counters are stored as small tuples of byte
//! strings in a fixed binary layout:
//!
//! ```text
//! ┌─────────┬──────────────┬───────────────────────────────────┐
//! │ version │ count        │ count × ( len u32 BE │ bytes )    │
//! │ u8 = 1  │ u16 BE       │                                   │
//! └─────────┴──────────────┴───────────────────────────────────┘
//! ```
//!
//! A counter is a one-element tuple whose element is the 8-byte big-endian
//! count.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Current encoding version.
pub const CODEC_VERSION: u8 = 1;

const HEADER_SIZE: usize = 3;
const LEN_SIZE: usize = 4;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors produced while encoding or decoding a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum CodecError {
    /// The blob is shorter than its header or element lengths claim.
    #[error("tuple truncated")]
    Truncated,

    /// The blob was written by an unknown encoding version.
    #[error("unsupported tuple version {version}")]
    UnsupportedVersion { version: u8 },

    /// Bytes remain after the last element.
    #[error("{count} trailing bytes after tuple")]
    TrailingBytes { count: usize },

    /// The decoded tuple does not have the expected number of elements.
    #[error("expected {expected} tuple elements, found {found}")]
    Arity { expected: usize, found: usize },

    /// Too many elements to encode.
    #[error("tuple has {count} elements, limit is {}", u16::MAX)]
    TooManyElements { count: usize },

    /// An element is too large to encode.
    #[error("tuple element of {len} bytes exceeds the 4 GiB limit")]
    ElementTooLarge { len: usize },

    /// A counter element is not 8 bytes wide.
    #[error("counter must be 8 bytes, found {len}")]
    CounterWidth { len: usize },
}

/// Encodes `items` as a tuple.
pub fn encode<T: AsRef<[u8]>>(items: &[T]) -> CodecResult<Bytes> {
    let count = u16::try_from(items.len())
        .map_err(|_| CodecError::TooManyElements { count: items.len() })?;
    let body: usize = items.iter().map(|i| LEN_SIZE + i.as_ref().len()).sum();

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body);
    buf.put_u8(CODEC_VERSION);
    buf.put_u16(count);
    for item in items {
        let item = item.as_ref();
        let len =
            u32::try_from(item.len()).map_err(|_| CodecError::ElementTooLarge { len: item.len() })?;
        buf.put_u32(len);
        buf.put_slice(item);
    }
    Ok(buf.freeze())
}

/// Decodes a tuple into its elements.
///
/// The returned elements share the input buffer.
pub fn decode(data: Bytes) -> CodecResult<Vec<Bytes>> {
    let mut buf = data;
    if buf.remaining() < HEADER_SIZE {
        return Err(CodecError::Truncated);
    }
    let version = buf.get_u8();
    if version != CODEC_VERSION {
        return Err(CodecError::UnsupportedVersion { version });
    }
    let count = buf.get_u16() as usize;

    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        if buf.remaining() < LEN_SIZE {
            return Err(CodecError::Truncated);
        }
        let len = buf.get_u32() as usize;
        if buf.remaining() < len {
            return Err(CodecError::Truncated);
        }
        items.push(buf.split_to(len));
    }

    if buf.has_remaining() {
        return Err(CodecError::TrailingBytes {
            count: buf.remaining(),
        });
    }
    Ok(items)
}

/// Encodes a two-element tuple.
pub fn encode_pair(first: &[u8], second: &[u8]) -> CodecResult<Bytes> {
    encode(&[first, second])
}

/// Decodes a tuple that must have exactly two elements.
pub fn decode_pair(data: Bytes) -> CodecResult<(Bytes, Bytes)> {
    let mut items = decode(data)?;
    if items.len() != 2 {
        return Err(CodecError::Arity {
            expected: 2,
            found: items.len(),
        });
    }
    let second = items.pop().unwrap_or_default();
    let first = items.pop().unwrap_or_default();
    Ok((first, second))
}

/// Encodes a counter.
pub fn encode_count(count: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + LEN_SIZE + 8);
    buf.put_u8(CODEC_VERSION);
    buf.put_u16(1);
    buf.put_u32(8);
    buf.put_u64(count);
    buf.freeze()
}

/// Decodes a counter.
pub fn decode_count(data: Bytes) -> CodecResult<u64> {
    let items = decode(data)?;
    let [item] = items.as_slice() else {
        return Err(CodecError::Arity {
            expected: 1,
            found: items.len(),
        });
    };
    let raw: [u8; 8] = item
        .as_ref()
        .try_into()
        .map_err(|_| CodecError::CounterWidth { len: item.len() })?;
    Ok(u64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_layout() {
        let encoded = encode_pair(b"v1", b"").unwrap();
        assert_eq!(
            encoded.as_ref(),
            &[1, 0, 2, 0, 0, 0, 2, b'v', b'1', 0, 0, 0, 0][..]
        );

        let (value, class) = decode_pair(encoded).unwrap();
        assert_eq!(value.as_ref(), b"v1");
        assert!(class.is_empty());
    }

    #[test]
    fn test_binary_elements() {
        let items: [&[u8]; 3] = [b"\x00\x01", b"\xff", b"a \"quoted\" string"];
        let decoded = decode(encode(&items).unwrap()).unwrap();
        assert_eq!(decoded.len(), 3);
        for (got, want) in decoded.iter().zip(items) {
            assert_eq!(got.as_ref(), want);
        }
    }

    #[test]
    fn test_empty_tuple() {
        let encoded = encode::<&[u8]>(&[]).unwrap();
        assert_eq!(encoded.as_ref(), &[1, 0, 0][..]);
        assert!(decode(encoded).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(decode(Bytes::new()), Err(CodecError::Truncated));
        assert_eq!(
            decode(Bytes::from_static(&[2, 0, 0])),
            Err(CodecError::UnsupportedVersion { version: 2 })
        );
        assert_eq!(
            decode(Bytes::from_static(&[1, 0, 1, 0, 0, 0, 5, b'a'])),
            Err(CodecError::Truncated)
        );
        assert_eq!(
            decode(Bytes::from_static(&[1, 0, 0, 9])),
            Err(CodecError::TrailingBytes { count: 1 })
        );
    }

    #[test]
    fn test_decode_pair_checks_arity() {
        let triple = encode(&[&b"a"[..], &b"b"[..], &b"c"[..]]).unwrap();
        assert_eq!(
            decode_pair(triple),
            Err(CodecError::Arity {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_counter() {
        for n in [0, 1, 2, u64::MAX] {
            assert_eq!(decode_count(encode_count(n)).unwrap(), n);
        }

        let short = encode(&[&[1u8, 2, 3][..]]).unwrap();
        assert_eq!(decode_count(short), Err(CodecError::CounterWidth { len: 3 }));

        let pair = encode_pair(b"a", b"b").unwrap();
        assert!(matches!(decode_count(pair), Err(CodecError::Arity { .. })));
    }
}
