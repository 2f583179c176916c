use std::fmt;

use thiserror::Error;

use crate::lua_vm::lua_limits::{LUA_MAXCAPTURES, MAXUPVAL};
use crate::object_pool::{ClosureId, ProtoId};

/// Lifecycle misuse by the host or the execution engine.
///
/// Every variant is a programming error: a correct host never triggers one,
/// so callers should treat them as bugs rather than as script failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("cannot release {id}: {live} closure(s) still reference it")]
    LivenessViolation { id: ProtoId, live: usize },
    #[error("stale prototype handle {0}")]
    StalePrototype(ProtoId),
    #[error("stale closure handle {0}")]
    StaleClosure(ClosureId),
    #[error("upvalue index {index} out of range (closure has {count})")]
    UpvalueOutOfRange { index: usize, count: usize },
    #[error("upvalue {0} is not bound")]
    UnboundUpvalue(usize),
    #[error("closure requested {requested} upvalues but prototype expects {expected}")]
    UpvalueCountMismatch { requested: usize, expected: usize },
    #[error("too many upvalues ({0}, limit is {max})", max = MAXUPVAL)]
    TooManyUpvalues(usize),
    #[error("upvalue descriptor refers to an enclosing closure but none was given")]
    MissingEnclosingClosure,
}

/// Why a pattern was rejected before matching started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    EndsWithPercent,
    MissingBracket,
    MissingBalanceArgs,
    MissingFrontierSet,
    MissingQuantifierItem(u8),
    UnmatchedClose,
    UnclosedCapture,
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedKind::EndsWithPercent => write!(f, "ends with '%'"),
            MalformedKind::MissingBracket => write!(f, "missing ']'"),
            MalformedKind::MissingBalanceArgs => write!(f, "missing arguments to '%b'"),
            MalformedKind::MissingFrontierSet => write!(f, "missing '[' after '%f'"),
            MalformedKind::MissingQuantifierItem(q) => {
                write!(f, "'{}' has no preceding item", *q as char)
            }
            MalformedKind::UnmatchedClose => write!(f, "unmatched ')'"),
            MalformedKind::UnclosedCapture => write!(f, "unclosed capture"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("malformed pattern ({0})")]
    Malformed(MalformedKind),
    #[error("too many captures (limit is {max})", max = LUA_MAXCAPTURES)]
    TooManyCaptures,
    #[error("invalid pattern capture")]
    InvalidPatternCapture,
    #[error("unfinished capture")]
    UnfinishedCapture,
    #[error("invalid capture index %{0}")]
    InvalidCaptureIndex(usize),
    #[error("pattern too complex")]
    TooComplex,
    #[error("invalid use of '%' in replacement string")]
    InvalidReplacement,
}

impl PatternError {
    /// True for syntax errors detected while validating the pattern.
    pub fn is_malformed(&self) -> bool {
        matches!(self, PatternError::Malformed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LuaError {
    /// Script-visible runtime error (bad argument, failed call, ...)
    #[error("{0}")]
    Runtime(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("stack overflow")]
    StackOverflow,
}

pub type LuaResult<T> = Result<T, LuaError>;
