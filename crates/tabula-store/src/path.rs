//! Bucket path encoding.
//!
//! All buckets live in one flat, ordered redb table. A bucket is identified
//! by a *prefix* that encodes its path from the root:
//!
//! ```text
//! prefix(root)          = ""
//! prefix(parent/name)   = prefix(parent) 0x02 escape(name) 0x00
//! value key             = prefix(bucket) 0x01 raw-key
//! child bucket marker   = prefix(child)                  (empty value)
//! ```
//!
//! `escape` replaces every `0x00` byte with `0x00 0xFF`, so the `0x00`
//! terminator is unambiguous and escaped names sort exactly like the raw
//! names. Everything stored inside a child bucket starts with the child's
//! marker followed by a tag byte, which gives three useful properties:
//!
//! - the marker is the first key of the child's subtree
//! - the whole subtree is the half-open range `[marker, marker 0x03)`
//! - the next sibling's marker is `>= marker 0xFF`, so children can be
//!   enumerated by seeking past each subtree

/// Tag introducing a value key inside a bucket.
pub(crate) const VALUE_TAG: u8 = 0x01;

/// Tag introducing a child bucket segment.
pub(crate) const BUCKET_TAG: u8 = 0x02;

/// First byte after both tags; bounds a bucket's contents.
const END_TAG: u8 = 0x03;

const TERMINATOR: u8 = 0x00;
const ESCAPE: u8 = 0xFF;

/// Returns the prefix (and marker key) of child `name` under `parent`.
pub(crate) fn child_prefix(parent: &[u8], name: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parent.len() + name.len() + 2);
    key.extend_from_slice(parent);
    key.push(BUCKET_TAG);
    for &b in name {
        key.push(b);
        if b == TERMINATOR {
            key.push(ESCAPE);
        }
    }
    key.push(TERMINATOR);
    key
}

/// Returns the storage key of value `key` inside the bucket at `prefix`.
pub(crate) fn value_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(prefix.len() + key.len() + 1);
    full.extend_from_slice(prefix);
    full.push(VALUE_TAG);
    full.extend_from_slice(key);
    full
}

/// Returns `prefix` followed by a single tag byte.
pub(crate) fn tagged(prefix: &[u8], tag: u8) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1);
    key.extend_from_slice(prefix);
    key.push(tag);
    key
}

/// Half-open range covering the values of the bucket at `prefix`.
pub(crate) fn values_range(prefix: &[u8]) -> (Vec<u8>, Vec<u8>) {
    (tagged(prefix, VALUE_TAG), tagged(prefix, BUCKET_TAG))
}

/// Half-open range covering the child buckets of the bucket at `prefix`.
pub(crate) fn children_range(prefix: &[u8]) -> (Vec<u8>, Vec<u8>) {
    (tagged(prefix, BUCKET_TAG), tagged(prefix, END_TAG))
}

/// Exclusive upper bound of everything stored in the bucket at `prefix`.
///
/// For a child bucket this bounds its whole subtree, marker included.
pub(crate) fn subtree_end(prefix: &[u8]) -> Vec<u8> {
    tagged(prefix, END_TAG)
}

/// Decodes the child name that starts at `encoded` (just after the bucket
/// tag). Returns the raw name and the number of encoded bytes consumed,
/// terminator included.
pub(crate) fn decode_segment(encoded: &[u8]) -> Option<(Vec<u8>, usize)> {
    let mut name = Vec::with_capacity(encoded.len());
    let mut i = 0;
    while i < encoded.len() {
        let b = encoded[i];
        if b == TERMINATOR {
            if encoded.get(i + 1) == Some(&ESCAPE) {
                name.push(TERMINATOR);
                i += 2;
                continue;
            }
            return Some((name, i + 1));
        }
        name.push(b);
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_prefix_escapes_nul() {
        let prefix = child_prefix(b"", b"a\0b");
        assert_eq!(prefix, vec![BUCKET_TAG, b'a', 0x00, 0xFF, b'b', 0x00]);

        let (name, used) = decode_segment(&prefix[1..]).unwrap();
        assert_eq!(name, b"a\0b");
        assert_eq!(used, prefix.len() - 1);
    }

    #[test]
    fn test_child_order_matches_name_order() {
        let mut names: Vec<&[u8]> = vec![
            &b"b"[..],
            &b"a"[..],
            &b"a\0"[..],
            &b"ab"[..],
            &b""[..],
            &b"\0"[..],
            &b"a\xff"[..],
        ];
        let mut encoded: Vec<Vec<u8>> = names.iter().map(|n| child_prefix(b"", n)).collect();
        names.sort();
        encoded.sort();
        let decoded: Vec<Vec<u8>> = encoded
            .iter()
            .map(|e| decode_segment(&e[1..]).unwrap().0)
            .collect();
        let expected: Vec<Vec<u8>> = names.iter().map(|n| n.to_vec()).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_subtree_is_contiguous() {
        let parent = child_prefix(b"", b"t");
        let a = child_prefix(&parent, b"a");
        let a_nul = child_prefix(&parent, b"a\0");
        let b = child_prefix(&parent, b"b");

        let inner_value = value_key(&a, b"zzzz");
        let inner_child = child_prefix(&a, b"\xff\xff");
        let end = subtree_end(&a);

        for key in [&inner_value, &inner_child] {
            assert!(key.as_slice() > a.as_slice());
            assert!(key.as_slice() < end.as_slice());
        }
        assert!(a_nul.as_slice() >= end.as_slice());
        assert!(b.as_slice() >= end.as_slice());
    }

    #[test]
    fn test_values_sort_before_children() {
        let (values_lo, values_hi) = values_range(b"");
        let (children_lo, children_hi) = children_range(b"");
        assert!(values_lo < values_hi);
        assert_eq!(values_hi, children_lo);
        assert!(children_lo < children_hi);
        assert!(value_key(b"", b"\xff\xff") < children_lo);
    }

    #[test]
    fn test_decode_segment_requires_terminator() {
        assert!(decode_segment(b"abc").is_none());
        assert_eq!(decode_segment(b"\0"), Some((Vec::new(), 1)));
    }
}
