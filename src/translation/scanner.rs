//! Byte-level lookahead for the placeholder rewriter.

/// Where the rewriter currently is in the SQL text.
#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    /// Nesting depth; `/* /* */ */` is one comment.
    BlockComment(u32),
    DollarQuoted(String),
}

/// Whether the two bytes at `idx` are `pair`.
pub(super) fn pair_at(bytes: &[u8], idx: usize, pair: &[u8; 2]) -> bool {
    bytes.get(idx..idx + 2) == Some(&pair[..])
}

/// A `$tag$` opener starting at `start`: the tag and the index of its
/// closing `$`. Positional `$1` is not an opener.
pub(super) fn dollar_tag(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let rest = bytes.get(start + 1..)?;
    let len = rest.iter().position(|&b| b == b'$')?;
    let tag = &rest[..len];
    if !tag.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_') {
        return None;
    }
    let tag = std::str::from_utf8(tag).ok()?.to_owned();
    Some((tag, start + 1 + len))
}

/// Whether the `$` at `idx` closes a body opened with `$tag$`.
pub(super) fn closes_dollar_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    bytes.get(idx + 1..end) == Some(tag.as_bytes()) && bytes.get(end) == Some(&b'$')
}

/// A run of ASCII digits from `start`: the index just past it and the digits.
pub(super) fn digits_at(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let len = bytes
        .get(start..)?
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if len == 0 {
        return None;
    }
    let end = start + len;
    std::str::from_utf8(&bytes[start..end]).ok().map(|d| (end, d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_tags() {
        assert_eq!(dollar_tag(b"$fn$ body", 0), Some(("fn".to_string(), 3)));
        assert_eq!(dollar_tag(b"$$", 0), Some((String::new(), 1)));
        assert_eq!(dollar_tag(b"$1, $2", 0), None);
        assert!(closes_dollar_tag(b"x $fn$", 2, "fn"));
        assert!(!closes_dollar_tag(b"x $fx$", 2, "fn"));
        assert_eq!(digits_at(b"?12)", 1), Some((3, "12")));
        assert_eq!(digits_at(b"?", 1), None);
    }
}
