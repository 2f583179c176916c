// Core pattern matching engine: direct interpretation, no AST
//
// - Matcher validates the pattern once; matching never meets a syntax error
// - MatchState holds subject, pattern and a fixed capture array
// - do_match walks the pattern recursively with backtracking, bounded by
//   MatchLimits::max_depth
// - Offsets are byte offsets into the subject, 0-based

use super::class::{L_ESC, class_end, singlematch};
use crate::lua_vm::lua_error::{MalformedKind, PatternError};
use crate::lua_vm::lua_limits::{LUA_MAXCAPTURES, MAXCCALLS_PATTERN};

type MatchResult = Result<Option<usize>, PatternError>;

/// True if the pattern has no special characters and can be matched as plain text.
#[inline]
pub fn is_plain_pattern(pat: &[u8]) -> bool {
    !pat.iter().any(|&c| {
        matches!(
            c,
            b'%' | b'.' | b'[' | b'*' | b'+' | b'-' | b'?' | b'^' | b'$' | b'(' | b')'
        )
    })
}

/// Reject malformed patterns before any matching starts.
fn validate_pattern(pat: &[u8]) -> Result<(), PatternError> {
    let malformed = |kind| Err(PatternError::Malformed(kind));
    let mut i = usize::from(pat.first() == Some(&b'^'));
    let mut open = 0usize;
    while i < pat.len() {
        match pat[i] {
            b'(' => {
                if pat.get(i + 1) == Some(&b')') {
                    i += 2;
                } else {
                    open += 1;
                    i += 1;
                }
                continue;
            }
            b')' => {
                if open == 0 {
                    return malformed(MalformedKind::UnmatchedClose);
                }
                open -= 1;
                i += 1;
                continue;
            }
            // Suffixes are consumed with their item below, so a quantifier
            // seen here has nothing to repeat
            q @ (b'*' | b'+' | b'-' | b'?') => {
                return malformed(MalformedKind::MissingQuantifierItem(q));
            }
            b'$' if i + 1 == pat.len() => {
                i += 1;
                continue;
            }
            L_ESC => match pat.get(i + 1) {
                Some(b'b') => {
                    if i + 3 >= pat.len() {
                        return malformed(MalformedKind::MissingBalanceArgs);
                    }
                    i += 4;
                    continue;
                }
                Some(b'f') => {
                    i += 2;
                    if pat.get(i) != Some(&b'[') {
                        return malformed(MalformedKind::MissingFrontierSet);
                    }
                    i = class_end(pat, i)?;
                    continue;
                }
                Some(d) if d.is_ascii_digit() => {
                    i += 2;
                    continue;
                }
                _ => {}
            },
            _ => {}
        }
        // Single-character item with an optional repetition suffix
        i = class_end(pat, i)?;
        if matches!(pat.get(i), Some(b'*' | b'+' | b'-' | b'?')) {
            i += 1;
        }
    }
    if open > 0 {
        return malformed(MalformedKind::UnclosedCapture);
    }
    Ok(())
}

/// Capture length while matching
#[derive(Debug, Clone, Copy)]
enum CaptureLen {
    Unfinished,
    Position,
    Len(usize),
}

#[derive(Debug, Clone, Copy)]
struct Capture {
    init: usize,
    len: CaptureLen,
}

const EMPTY_CAPTURE: Capture = Capture {
    init: 0,
    len: CaptureLen::Unfinished,
};

struct MatchState<'a> {
    src: &'a [u8],
    pat: &'a [u8],
    level: usize,
    captures: [Capture; LUA_MAXCAPTURES],
    depth: usize,
    max_depth: usize,
}

impl<'a> MatchState<'a> {
    fn new(src: &'a [u8], pat: &'a [u8], limits: MatchLimits) -> Self {
        MatchState {
            src,
            pat,
            level: 0,
            captures: [EMPTY_CAPTURE; LUA_MAXCAPTURES],
            depth: 0,
            max_depth: limits.max_depth,
        }
    }

    fn reset(&mut self) {
        self.level = 0;
        self.depth = 0;
    }

    fn do_match(&mut self, s: usize, p: usize) -> MatchResult {
        if self.depth >= self.max_depth {
            return Err(PatternError::TooComplex);
        }
        self.depth += 1;
        let result = self.match_inner(s, p);
        self.depth -= 1;
        result
    }

    fn match_inner(&mut self, mut s: usize, mut p: usize) -> MatchResult {
        let src = self.src;
        let pat = self.pat;
        loop {
            if p >= pat.len() {
                return Ok(Some(s));
            }
            match pat[p] {
                b'(' => {
                    return if pat.get(p + 1) == Some(&b')') {
                        self.start_capture(s, p + 2, CaptureLen::Position)
                    } else {
                        self.start_capture(s, p + 1, CaptureLen::Unfinished)
                    };
                }
                b')' => return self.end_capture(s, p + 1),
                b'$' if p + 1 == pat.len() => {
                    return Ok((s == src.len()).then_some(s));
                }
                L_ESC => match pat.get(p + 1) {
                    Some(b'b') => match self.match_balance(s, p + 2)? {
                        Some(e) => {
                            s = e;
                            p += 4;
                            continue;
                        }
                        None => return Ok(None),
                    },
                    Some(b'f') => {
                        p += 2;
                        let ep = class_end(pat, p)?;
                        // Both boundaries of the subject read as byte 0
                        let prev = if s == 0 { 0 } else { src[s - 1] };
                        let cur = src.get(s).copied().unwrap_or(0);
                        if !singlematch(prev, pat, p, ep) && singlematch(cur, pat, p, ep) {
                            p = ep;
                            continue;
                        }
                        return Ok(None);
                    }
                    Some(&d) if d.is_ascii_digit() => match self.match_capture(s, d)? {
                        Some(e) => {
                            s = e;
                            p += 2;
                            continue;
                        }
                        None => return Ok(None),
                    },
                    _ => {}
                },
                _ => {}
            }

            let ep = class_end(pat, p)?;
            let matched = s < src.len() && singlematch(src[s], pat, p, ep);
            match pat.get(ep) {
                // Once the item is consumed the unconsumed branch is never retried
                Some(b'?') => {
                    if matched {
                        s += 1;
                    }
                    p = ep + 1;
                }
                Some(b'+') => {
                    return if matched {
                        self.max_expand(s + 1, p, ep)
                    } else {
                        Ok(None)
                    };
                }
                Some(b'*') => return self.max_expand(s, p, ep),
                Some(b'-') => return self.min_expand(s, p, ep),
                _ => {
                    if !matched {
                        return Ok(None);
                    }
                    s += 1;
                    p = ep;
                }
            }
        }
    }

    /// Greedy: take the longest run, then give back one byte at a time.
    fn max_expand(&mut self, s: usize, p: usize, ep: usize) -> MatchResult {
        let mut i = 0usize;
        while s + i < self.src.len() && singlematch(self.src[s + i], self.pat, p, ep) {
            i += 1;
        }
        loop {
            if let Some(e) = self.do_match(s + i, ep + 1)? {
                return Ok(Some(e));
            }
            if i == 0 {
                return Ok(None);
            }
            i -= 1;
        }
    }

    /// Lazy: try the rest first, consume one more byte only on failure.
    fn min_expand(&mut self, mut s: usize, p: usize, ep: usize) -> MatchResult {
        loop {
            if let Some(e) = self.do_match(s, ep + 1)? {
                return Ok(Some(e));
            }
            if s < self.src.len() && singlematch(self.src[s], self.pat, p, ep) {
                s += 1;
            } else {
                return Ok(None);
            }
        }
    }

    fn start_capture(&mut self, s: usize, p: usize, what: CaptureLen) -> MatchResult {
        let level = self.level;
        if level >= LUA_MAXCAPTURES {
            return Err(PatternError::TooManyCaptures);
        }
        self.captures[level] = Capture { init: s, len: what };
        self.level = level + 1;
        let res = self.do_match(s, p)?;
        if res.is_none() {
            // undo capture
            self.level -= 1;
        }
        Ok(res)
    }

    fn end_capture(&mut self, s: usize, p: usize) -> MatchResult {
        let l = self.capture_to_close()?;
        self.captures[l].len = CaptureLen::Len(s - self.captures[l].init);
        let res = self.do_match(s, p)?;
        if res.is_none() {
            self.captures[l].len = CaptureLen::Unfinished;
        }
        Ok(res)
    }

    fn capture_to_close(&self) -> Result<usize, PatternError> {
        (0..self.level)
            .rev()
            .find(|&l| matches!(self.captures[l].len, CaptureLen::Unfinished))
            .ok_or(PatternError::InvalidPatternCapture)
    }

    /// `%bxy` with `pat[p]` = x and `pat[p + 1]` = y.
    fn match_balance(&self, s: usize, p: usize) -> MatchResult {
        if p + 1 >= self.pat.len() {
            return Err(PatternError::Malformed(MalformedKind::MissingBalanceArgs));
        }
        let (open, close) = (self.pat[p], self.pat[p + 1]);
        if self.src.get(s) != Some(&open) {
            return Ok(None);
        }
        let mut depth = 1usize;
        for i in s + 1..self.src.len() {
            let c = self.src[i];
            if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(i + 1));
                }
            } else if c == open {
                depth += 1;
            }
        }
        Ok(None)
    }

    /// Back-reference `%d`: the text of closed capture `d` must repeat at `s`.
    fn match_capture(&self, s: usize, digit: u8) -> MatchResult {
        let n = (digit - b'0') as usize;
        if n == 0 || n > self.level {
            return Err(PatternError::InvalidCaptureIndex(n));
        }
        let cap = self.captures[n - 1];
        let len = match cap.len {
            CaptureLen::Len(len) => len,
            CaptureLen::Unfinished => return Err(PatternError::InvalidCaptureIndex(n)),
            // A position has no text to repeat
            CaptureLen::Position => return Ok(None),
        };
        let rest = &self.src[s..];
        if rest.len() >= len && rest[..len] == self.src[cap.init..cap.init + len] {
            Ok(Some(s + len))
        } else {
            Ok(None)
        }
    }

    fn capture_results(&self) -> Result<CaptureResults, PatternError> {
        let mut results = CaptureResults::new();
        for cap in &self.captures[..self.level] {
            let value = match cap.len {
                CaptureLen::Len(len) => CaptureValue::Substring(cap.init, cap.init + len),
                CaptureLen::Position => CaptureValue::Position(cap.init),
                CaptureLen::Unfinished => return Err(PatternError::UnfinishedCapture),
            };
            results.push(value);
        }
        Ok(results)
    }
}

/// A capture result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureValue {
    /// Byte range `[start, end)` of the subject
    Substring(usize, usize),
    /// Byte offset of a `()` capture
    Position(usize),
}

/// Fixed-size capture list, no heap allocation.
#[derive(Debug, Clone)]
pub struct CaptureResults {
    data: [CaptureValue; LUA_MAXCAPTURES],
    len: usize,
}

impl CaptureResults {
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [CaptureValue::Position(0); LUA_MAXCAPTURES],
            len: 0,
        }
    }

    #[inline]
    fn push(&mut self, value: CaptureValue) {
        self.data[self.len] = value;
        self.len += 1;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, CaptureValue> {
        self.data[..self.len].iter()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&CaptureValue> {
        self.data[..self.len].get(index)
    }
}

impl Default for CaptureResults {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a CaptureResults {
    type Item = &'a CaptureValue;
    type IntoIter = std::slice::Iter<'a, CaptureValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One successful match
#[derive(Debug, Clone)]
pub struct MatchInfo {
    pub start: usize,
    pub end: usize,
    pub captures: CaptureResults,
}

impl MatchInfo {
    /// Capture `index` (0-based). A pattern without captures exposes the
    /// whole match as its capture 0.
    pub fn capture_or_whole(&self, index: usize) -> Result<CaptureValue, PatternError> {
        match self.captures.get(index) {
            Some(value) => Ok(*value),
            None if index == 0 => Ok(CaptureValue::Substring(self.start, self.end)),
            None => Err(PatternError::InvalidCaptureIndex(index + 1)),
        }
    }

    /// Number of values a match reports: its captures, or 1 for the whole match.
    pub fn value_count(&self) -> usize {
        self.captures.len().max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchLimits {
    pub max_depth: usize,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self {
            max_depth: MAXCCALLS_PATTERN,
        }
    }
}

/// Resumable iteration state for gmatch-style scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GMatchCursor {
    /// Next start position
    pub pos: usize,
    /// End of the previous match
    pub last_match: Option<usize>,
}

impl GMatchCursor {
    pub fn new(pos: usize) -> Self {
        Self {
            pos,
            last_match: None,
        }
    }
}

/// A validated pattern, reusable across subjects.
#[derive(Debug, Clone)]
pub struct Matcher<'p> {
    pat: &'p [u8],
    plain: bool,
    anchored: bool,
    limits: MatchLimits,
}

impl<'p> Matcher<'p> {
    pub fn new(pat: &'p [u8]) -> Result<Self, PatternError> {
        let plain = is_plain_pattern(pat);
        if !plain {
            validate_pattern(pat)?;
        }
        Ok(Self {
            pat,
            plain,
            anchored: !plain && pat.first() == Some(&b'^'),
            limits: MatchLimits::default(),
        })
    }

    /// Match `pat` as literal text, specials included.
    pub fn literal(pat: &'p [u8]) -> Self {
        Self {
            pat,
            plain: true,
            anchored: false,
            limits: MatchLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: MatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    pub fn is_plain(&self) -> bool {
        self.plain
    }

    fn body_start(&self) -> usize {
        usize::from(self.anchored)
    }

    fn match_at(&self, ms: &mut MatchState<'_>, s: usize) -> Result<Option<MatchInfo>, PatternError> {
        ms.reset();
        match ms.do_match(s, self.body_start())? {
            Some(end) => Ok(Some(MatchInfo {
                start: s,
                end,
                captures: ms.capture_results()?,
            })),
            None => Ok(None),
        }
    }

    /// Leftmost match starting at or after `init`.
    pub fn find(&self, src: &[u8], init: usize) -> Result<Option<MatchInfo>, PatternError> {
        if init > src.len() {
            return Ok(None);
        }
        if self.plain {
            return Ok(find_bytes(&src[init..], self.pat).map(|pos| MatchInfo {
                start: init + pos,
                end: init + pos + self.pat.len(),
                captures: CaptureResults::new(),
            }));
        }
        let mut ms = MatchState::new(src, self.pat, self.limits);
        let mut s = init;
        loop {
            if let Some(m) = self.match_at(&mut ms, s)? {
                return Ok(Some(m));
            }
            if self.anchored || s >= src.len() {
                return Ok(None);
            }
            s += 1;
        }
    }

    /// Next match for an iteration over `src`. An empty match ending where
    /// the previous match ended is skipped. An anchored pattern yields at
    /// most one match, at the cursor's starting position.
    pub fn gmatch_step(
        &self,
        src: &[u8],
        cursor: &mut GMatchCursor,
    ) -> Result<Option<MatchInfo>, PatternError> {
        let mut ms = MatchState::new(src, self.pat, self.limits);
        let mut s = cursor.pos;
        while s <= src.len() {
            if let Some(m) = self.match_at(&mut ms, s)?
                && Some(m.end) != cursor.last_match
            {
                cursor.pos = if self.anchored { src.len() + 1 } else { m.end };
                cursor.last_match = Some(m.end);
                return Ok(Some(m));
            }
            if self.anchored {
                break;
            }
            s += 1;
        }
        cursor.pos = src.len() + 1;
        Ok(None)
    }

    /// All matches from `init`, at most `max` of them.
    pub fn find_all(
        &self,
        src: &[u8],
        init: usize,
        max: Option<usize>,
    ) -> Result<Vec<MatchInfo>, PatternError> {
        let mut matches = Vec::new();
        let mut cursor = GMatchCursor::new(init);
        while max.is_none_or(|m| matches.len() < m) {
            match self.gmatch_step(src, &mut cursor)? {
                Some(m) => matches.push(m),
                None => break,
            }
        }
        Ok(matches)
    }

    /// Replace up to `max` matches. `repl` returns the replacement bytes, or
    /// `None` to keep the matched text. Returns the new bytes and the number
    /// of matches.
    pub fn gsub<E, F>(&self, src: &[u8], max: Option<usize>, mut repl: F) -> Result<(Vec<u8>, usize), E>
    where
        E: From<PatternError>,
        F: FnMut(&MatchInfo) -> Result<Option<Vec<u8>>, E>,
    {
        let max = max.unwrap_or(usize::MAX);
        let mut out = Vec::with_capacity(src.len());
        let mut ms = MatchState::new(src, self.pat, self.limits);
        let mut s = 0usize;
        let mut last_match = None;
        let mut count = 0usize;
        while count < max {
            match self.match_at(&mut ms, s)? {
                Some(m) if Some(m.end) != last_match => {
                    count += 1;
                    match repl(&m)? {
                        Some(bytes) => out.extend_from_slice(&bytes),
                        None => out.extend_from_slice(&src[m.start..m.end]),
                    }
                    s = m.end;
                    last_match = Some(m.end);
                }
                _ if s < src.len() => {
                    out.push(src[s]);
                    s += 1;
                }
                _ => break,
            }
            if self.anchored {
                break;
            }
        }
        out.extend_from_slice(&src[s..]);
        Ok((out, count))
    }
}

#[inline]
fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Expand a gsub replacement template: `%0` is the whole match, `%1`-`%9`
/// the captures, `%%` a percent sign. Position captures expand to their
/// 1-based position.
pub fn expand_replacement(template: &[u8], src: &[u8], m: &MatchInfo) -> Result<Vec<u8>, PatternError> {
    let mut out = Vec::with_capacity(template.len());
    let mut i = 0;
    while i < template.len() {
        let c = template[i];
        if c != L_ESC {
            // copy the run up to the next '%' at once
            let start = i;
            while i < template.len() && template[i] != L_ESC {
                i += 1;
            }
            out.extend_from_slice(&template[start..i]);
            continue;
        }
        i += 1;
        match template.get(i) {
            Some(&L_ESC) => out.push(L_ESC),
            Some(b'0') => out.extend_from_slice(&src[m.start..m.end]),
            Some(&d) if d.is_ascii_digit() => {
                match m.capture_or_whole((d - b'1') as usize)? {
                    CaptureValue::Substring(start, end) => out.extend_from_slice(&src[start..end]),
                    CaptureValue::Position(pos) => {
                        let mut buffer = itoa::Buffer::new();
                        out.extend_from_slice(buffer.format(pos + 1).as_bytes());
                    }
                }
            }
            _ => return Err(PatternError::InvalidReplacement),
        }
        i += 1;
    }
    Ok(out)
}

/// Find the first match of `pat` in `text` at or after `init`.
pub fn find(text: &[u8], pat: &[u8], init: usize) -> Result<Option<MatchInfo>, PatternError> {
    Matcher::new(pat)?.find(text, init)
}

/// Find successive matches of `pat` in `text`, at most `max` of them.
pub fn find_all_matches(
    text: &[u8],
    pat: &[u8],
    init: usize,
    max: Option<usize>,
) -> Result<Vec<MatchInfo>, PatternError> {
    Matcher::new(pat)?.find_all(text, init, max)
}

/// Replace matches of `pat` in `text` with the expanded `replacement` template.
pub fn gsub(
    text: &[u8],
    pat: &[u8],
    replacement: &[u8],
    max: Option<usize>,
) -> Result<(Vec<u8>, usize), PatternError> {
    let matcher = Matcher::new(pat)?;
    let needs_expansion = replacement.contains(&L_ESC);
    matcher.gsub(text, max, |m| {
        if needs_expansion {
            expand_replacement(replacement, text, m).map(Some)
        } else {
            Ok(Some(replacement.to_vec()))
        }
    })
}
