//! Host stack growth for the recursive reader and evaluator.
//!
//! Nesting and recursion are bounded by depth counters
//! ([`crate::DEFAULT_MAX_PARSE_DEPTH`], [`crate::DEFAULT_MAX_EVAL_DEPTH`]), not
//! by the size of the thread's stack. On native targets the stack is extended
//! with `stacker` whenever less than [`RED_ZONE`] remains. WASM manages its own
//! stack and gets a plain call.

/// Grow once less than this much stack is left (128KB)
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment (2MB)
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

/// Run `f`, first making sure at least [`RED_ZONE`] bytes of stack remain.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_result() {
        let result: Result<i64, String> = ensure_sufficient_stack(|| Ok(7));
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_deep_recursion_does_not_overflow() {
        fn count_down(n: u64) -> u64 {
            ensure_sufficient_stack(|| if n == 0 { 0 } else { count_down(n - 1) + 1 })
        }

        assert_eq!(count_down(200_000), 200_000);
    }
}
