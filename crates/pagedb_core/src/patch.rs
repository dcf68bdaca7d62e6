//! Positional content patches.

/// Splices `replacement` into `content` at a byte `offset`, replacing
/// `len` bytes.
///
/// The result is `content[..offset] + replacement + content[offset + len..]`
/// with `offset` and `len` clamped to the content bounds: an offset past
/// the end appends, a length running past the end replaces through the
/// end, and a zero length is a pure insertion. Clamping is silent; patches
/// cannot fail.
///
/// Partial edits funnel into the same commit pipeline as full replacement,
/// so conflict detection is identical for both.
#[must_use]
pub fn apply_patch(content: &[u8], offset: usize, len: usize, replacement: &[u8]) -> Vec<u8> {
    let start = offset.min(content.len());
    let end = start.saturating_add(len).min(content.len());

    let mut result = Vec::with_capacity(content.len() - (end - start) + replacement.len());
    result.extend_from_slice(&content[..start]);
    result.extend_from_slice(replacement);
    result.extend_from_slice(&content[end..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn replaces_mid_content() {
        assert_eq!(apply_patch(b"Hello World", 5, 3, b"XYZ"), b"HelloXYZrld");
    }

    #[test]
    fn offset_past_end_appends() {
        assert_eq!(apply_patch(b"abc", 10, 5, b"xyz"), b"abcxyz");
        assert_eq!(apply_patch(b"", 0, 0, b"xyz"), b"xyz");
    }

    #[test]
    fn zero_len_inserts() {
        assert_eq!(apply_patch(b"abcdef", 3, 0, b"XX"), b"abcXXdef");
    }

    #[test]
    fn len_clamps_to_end() {
        assert_eq!(apply_patch(b"abcdef", 4, 100, b"Z"), b"abcdZ");
    }

    #[test]
    fn empty_replacement_deletes() {
        assert_eq!(apply_patch(b"abcdef", 1, 2, b""), b"adef");
    }

    #[test]
    fn huge_len_does_not_overflow() {
        assert_eq!(apply_patch(b"ab", 1, usize::MAX, b"c"), b"ac");
    }

    proptest! {
        #[test]
        fn preserves_prefix_and_suffix(
            content in proptest::collection::vec(any::<u8>(), 0..64),
            offset in 0usize..80,
            len in 0usize..80,
            replacement in proptest::collection::vec(any::<u8>(), 0..16),
        ) {
            let start = offset.min(content.len());
            let end = start.saturating_add(len).min(content.len());
            let result = apply_patch(&content, offset, len, &replacement);

            prop_assert_eq!(result.len(), content.len() - (end - start) + replacement.len());
            prop_assert_eq!(&result[..start], &content[..start]);
            prop_assert_eq!(&result[start..start + replacement.len()], &replacement[..]);
            prop_assert_eq!(&result[start + replacement.len()..], &content[end..]);
        }
    }
}
