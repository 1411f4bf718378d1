//! Stack growth for deeply nested source
//!
//! Parsing and evaluation recurse once per level of nesting in the script.
//! Recursive entry points run through [`ensure_sufficient_stack`], which moves
//! onto a freshly allocated segment when the current one is nearly used up.

/// Space that must remain before recursing further
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated segment
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
