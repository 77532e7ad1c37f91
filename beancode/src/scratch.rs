//! Per-thread scratch buffers for length-prefixed fields.
//!
//! A length-dynamic field is encoded into a scratch buffer first so its byte
//! count is known before the payload is written. Buffers live in a
//! per-thread stack: each active dynamic field takes its own buffer, so a
//! nested record that itself contains a length-dynamic field cannot clobber
//! the bytes its parent is still accumulating.
//!
//! A buffer that grew past 1 MiB is shrunk back to 1 KiB the next time it is
//! acquired, bounding idle memory.
use std::cell::RefCell;

const INITIAL_CAPACITY: usize = 1024;
const SHRINK_THRESHOLD: usize = 1 << 20;

thread_local! {
    static POOL: RefCell<Vec<Vec<u8>>> = const { RefCell::new(Vec::new()) };
}

/// Run `f` with an empty scratch buffer from this thread's pool.
pub(crate) fn with_scratch<T>(f: impl FnOnce(&mut Vec<u8>) -> T) -> T {
    let mut buf = POOL
        .with(|pool| pool.borrow_mut().pop())
        .unwrap_or_else(|| Vec::with_capacity(INITIAL_CAPACITY));
    if buf.capacity() > SHRINK_THRESHOLD {
        buf = Vec::with_capacity(INITIAL_CAPACITY);
    }
    buf.clear();
    let result = f(&mut buf);
    POOL.with(|pool| pool.borrow_mut().push(buf));
    result
}

/// Capacities of this thread's pooled buffers, outermost first.
#[cfg(test)]
pub(crate) fn pooled_capacities() -> Vec<usize> {
    POOL.with(|pool| pool.borrow().iter().map(Vec::capacity).collect())
}
