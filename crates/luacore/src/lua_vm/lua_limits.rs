//! Centralized runtime limits and configuration constants.
//!
//! Every magic number that bounds the runtime core lives here so hosts can
//! see (and `SafeOption` can override) the defaults in one place.

// ===== Stack =====

/// Minimum stack slots guaranteed to a native function.
pub const LUA_MINSTACK: usize = 20;

/// Default maximum stack size (number of slots).
pub const LUAI_MAXSTACK: usize = 1_000_000;

/// Default maximum function call nesting depth.
pub const MAX_CALL_DEPTH: usize = 200;

// ===== Closures =====

/// Maximum number of upvalues per closure.
pub const MAXUPVAL: usize = 255;

// ===== Pattern Matching =====

/// Maximum number of captures in a single pattern match.
pub const LUA_MAXCAPTURES: usize = 32;

/// Maximum match recursion depth for pattern matching.
pub const MAXCCALLS_PATTERN: usize = 200;

// ===== String Library =====

/// Maximum string size produced by the string library (1 GB).
pub const MAX_STRING_SIZE: usize = 1 << 30;
