//! Stack growth for the recursive passes.
//!
//! Parsing, resolution and evaluation all recurse once per level of syntactic
//! nesting (and evaluation once more per Lox call).  Each of those recursive
//! entry points runs through [`ensure_sufficient_stack`], which moves onto a
//! freshly allocated stack segment when the current one runs low, so deep
//! programs work on any host thread, not just a large main thread.

/// Grow when less than this much stack is left (100KB).
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated segment (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first switching to a new stack segment if the current one is
/// nearly exhausted.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: usize) -> usize {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn deep_recursion_completes() {
        assert_eq!(depth(200_000), 200_000);
    }
}
