// Character class matching for Lua patterns
// Handles %a, %c, %d, %g, %l, %p, %s, %u, %w, %x and their uppercase complements
// Also handles [set] matching
// Every test is on a single byte with C-locale (ASCII) semantics.

use crate::lua_vm::lua_error::{MalformedKind, PatternError};

pub const L_ESC: u8 = b'%';

/// Check if byte `c` belongs to the class named by `cl`.
/// Lowercase class letters test membership, uppercase ones the complement.
/// Any other `cl` is a literal and matches itself.
#[inline(always)]
pub fn match_class(c: u8, cl: u8) -> bool {
    let res = match cl.to_ascii_lowercase() {
        b'a' => c.is_ascii_alphabetic(),
        b'c' => c.is_ascii_control(),
        b'd' => c.is_ascii_digit(),
        b'g' => c.is_ascii_graphic(),
        b'l' => c.is_ascii_lowercase(),
        b'p' => c.is_ascii_punctuation(),
        // C isspace: includes \v, unlike u8::is_ascii_whitespace
        b's' => matches!(c, b' ' | b'\t'..=b'\r'),
        b'u' => c.is_ascii_uppercase(),
        b'w' => c.is_ascii_alphanumeric(),
        b'x' => c.is_ascii_hexdigit(),
        _ => return cl == c,
    };
    if cl.is_ascii_uppercase() { !res } else { res }
}

/// Index just past the single item starting at `pat[p]` (a literal, `.`,
/// `%x` or a `[set]`). Repetition suffixes are not consumed.
pub fn class_end(pat: &[u8], p: usize) -> Result<usize, PatternError> {
    let mut p = p;
    let c = pat[p];
    p += 1;
    match c {
        L_ESC => {
            if p >= pat.len() {
                return Err(PatternError::Malformed(MalformedKind::EndsWithPercent));
            }
            Ok(p + 1)
        }
        b'[' => {
            if pat.get(p) == Some(&b'^') {
                p += 1;
            }
            // The first member is taken unconditionally, so "[]]" holds ']'
            loop {
                if p >= pat.len() {
                    return Err(PatternError::Malformed(MalformedKind::MissingBracket));
                }
                let cc = pat[p];
                p += 1;
                if cc == L_ESC && p < pat.len() {
                    // skip escapes (e.g. '%]')
                    p += 1;
                }
                if pat.get(p) == Some(&b']') {
                    break;
                }
            }
            Ok(p + 1)
        }
        _ => Ok(p),
    }
}

/// Match `c` against the set `pat[p..=ec]`, where `pat[p]` is `[` and
/// `pat[ec]` its closing `]`.
fn match_bracket_class(c: u8, pat: &[u8], p: usize, ec: usize) -> bool {
    let mut p = p + 1;
    let mut sig = true;
    if pat[p] == b'^' {
        sig = false;
        p += 1;
    }
    while p < ec {
        if pat[p] == L_ESC {
            p += 1;
            if match_class(c, pat[p]) {
                return sig;
            }
            p += 1;
        } else if p + 2 < ec && pat[p + 1] == b'-' {
            if pat[p] <= c && c <= pat[p + 2] {
                return sig;
            }
            p += 3;
        } else {
            if pat[p] == c {
                return sig;
            }
            p += 1;
        }
    }
    !sig
}

/// Test `c` against the item `pat[p..ep]`; `ep` comes from `class_end`.
#[inline]
pub fn singlematch(c: u8, pat: &[u8], p: usize, ep: usize) -> bool {
    match pat[p] {
        b'.' => true,
        L_ESC => match_class(c, pat[p + 1]),
        b'[' => match_bracket_class(c, pat, p, ep - 1),
        pc => pc == c,
    }
}

/// Test one subject byte against the item starting at `pat[p]`.
/// Returns the match flag and the index just past the item.
pub fn single_match(c: u8, pat: &[u8], p: usize) -> Result<(bool, usize), PatternError> {
    let ep = class_end(pat, p)?;
    Ok((singlematch(c, pat, p, ep), ep))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_matches(c: u8, item: &str) -> bool {
        single_match(c, item.as_bytes(), 0).unwrap().0
    }

    #[test]
    fn test_match_class() {
        assert!(match_class(b'a', b'a'));
        assert!(match_class(b'Z', b'a'));
        assert!(!match_class(b'1', b'a'));
        assert!(match_class(b'5', b'd'));
        assert!(!match_class(b'x', b'd'));
        assert!(match_class(b' ', b's'));
        assert!(match_class(b'\t', b's'));
        assert!(match_class(0x0b, b's'));
        assert!(!match_class(b'a', b's'));
    }

    #[test]
    fn test_complement_classes() {
        assert!(!match_class(b'5', b'D'));
        assert!(match_class(b'a', b'D'));
        assert!(match_class(b'!', b'W'));
        assert!(!match_class(b'!', b'P'));
    }

    #[test]
    fn test_ascii_only_classes() {
        // Bytes above 0x7f belong to no class in the C locale
        for cl in [b'a', b'c', b'd', b'g', b'l', b'p', b's', b'u', b'w', b'x'] {
            assert!(!match_class(0xe9, cl));
        }
        assert!(match_class(0x7f, b'c'));
        assert!(match_class(0x00, b'c'));
        assert!(!match_class(b' ', b'g'));
        assert!(match_class(b'~', b'g'));
    }

    #[test]
    fn test_escaped_literal() {
        assert!(item_matches(b'.', "%."));
        assert!(!item_matches(b'x', "%."));
        assert!(item_matches(b'%', "%%"));
    }

    #[test]
    fn test_singlematch_dot() {
        assert!(item_matches(b'x', "."));
        assert!(item_matches(0, "."));
    }

    #[test]
    fn test_singlematch_set() {
        assert!(item_matches(b'a', "[abc]"));
        assert!(item_matches(b'c', "[abc]"));
        assert!(!item_matches(b'd', "[abc]"));
        assert!(!item_matches(b'a', "[^abc]"));
        assert!(item_matches(b'd', "[^abc]"));
    }

    #[test]
    fn test_singlematch_range() {
        assert!(item_matches(b'm', "[a-z]"));
        assert!(!item_matches(b'M', "[a-z]"));
        // A trailing '-' is a literal member
        assert!(item_matches(b'-', "[a-]"));
    }

    #[test]
    fn test_singlematch_set_with_class() {
        assert!(item_matches(b'5', "[%d_]"));
        assert!(item_matches(b'_', "[%d_]"));
        assert!(!item_matches(b'a', "[%d_]"));
        assert!(item_matches(b']', "[%]]"));
    }

    #[test]
    fn test_set_bracket_first() {
        assert!(item_matches(b']', "[]abc]"));
        assert!(item_matches(b'a', "[]abc]"));
        assert!(!item_matches(b'x', "[]abc]"));
        assert!(!item_matches(b']', "[^]]"));
    }

    #[test]
    fn test_class_end() {
        assert_eq!(class_end(b"a", 0), Ok(1));
        assert_eq!(class_end(b"%d", 0), Ok(2));
        assert_eq!(class_end(b"[abc]", 0), Ok(5));
        assert_eq!(class_end(b"[^a-z%d]x", 0), Ok(8));
        assert_eq!(class_end(b"[]]", 0), Ok(3));
    }

    #[test]
    fn test_class_end_malformed() {
        assert_eq!(
            class_end(b"[abc", 0),
            Err(PatternError::Malformed(MalformedKind::MissingBracket))
        );
        assert_eq!(
            class_end(b"[a%", 0),
            Err(PatternError::Malformed(MalformedKind::MissingBracket))
        );
        assert_eq!(
            class_end(b"%", 0),
            Err(PatternError::Malformed(MalformedKind::EndsWithPercent))
        );
    }
}
