// Lua pattern matching, byte-oriented, zero-AST design
//
// 1. Patterns are validated once by Matcher::new, then interpreted directly
// 2. Fixed-size capture array (32 slots), no heap allocation while matching
// 3. Each byte is one character; classes follow the C locale
// 4. Recursion-limited to bound pathological patterns

mod class;
mod engine;

pub use class::{match_class, single_match};
pub use engine::{
    CaptureResults, CaptureValue, GMatchCursor, MatchInfo, MatchLimits, Matcher,
    expand_replacement, find, find_all_matches, gsub, is_plain_pattern,
};
