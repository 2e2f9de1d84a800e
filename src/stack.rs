//! Stack safety for the recursive passes.
//!
//! The parser, resolver and interpreter all recurse once per nesting level of
//! the program, and a Lox call costs several host frames. `stacker` grows the
//! stack on demand so deeply nested input does not overflow the host thread.

/// Minimum stack space to keep available (100KB red zone).
const RED_ZONE: usize = 100 * 1024;

/// Stack space to allocate when growing (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Ensure sufficient stack space is available before executing `f`.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
