//! Failure policy for caller-supplied closures.
//!
//! Every predicate, key function, comparator, tie-break and consumer handed to
//! the tree is invoked through one of these helpers. A panic inside the
//! closure is caught at the call and replaced by a fixed fallback:
//!
//! | callback    | fallback          |
//! |-------------|-------------------|
//! | predicate   | `false`           |
//! | function    | `None`            |
//! | comparator  | `Ordering::Equal` |
//! | consumer    | skipped           |
//!
//! so a single misbehaving closure cannot abort a whole-tree walk or leave an
//! index half-updated.

use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};

fn guarded<T>(site: &'static str, fallback: T, call: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(value) => value,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            tracing::warn!(site, reason = %reason, "callback panicked, using fallback");
            fallback
        }
    }
}

/// Evaluate a predicate; failure counts as `false`.
pub(crate) fn check<A>(site: &'static str, predicate: impl FnOnce(A) -> bool, arg: A) -> bool {
    guarded(site, false, || predicate(arg))
}

/// Evaluate a two-argument predicate; failure counts as `false`.
pub(crate) fn check2<A, B>(
    site: &'static str,
    predicate: impl FnOnce(A, B) -> bool,
    a: A,
    b: B,
) -> bool {
    guarded(site, false, || predicate(a, b))
}

/// Evaluate a partial function; failure counts as `None`.
///
/// Public so that crates layered on the tree (renderers, exporters) can give
/// their own closures the same treatment.
///
/// ```
/// use ntree_core::callback;
///
/// let label = callback::apply("label", |x: u8| -> Option<String> { panic!("{x}") }, 1);
/// assert_eq!(label, None);
/// ```
pub fn apply<A, R>(
    site: &'static str,
    function: impl FnOnce(A) -> Option<R>,
    arg: A,
) -> Option<R> {
    guarded(site, None, || function(arg))
}

/// Evaluate a comparator; failure counts as `Equal`.
pub(crate) fn compare<A>(
    site: &'static str,
    comparator: impl FnOnce(A, A) -> Ordering,
    a: A,
    b: A,
) -> Ordering {
    guarded(site, Ordering::Equal, || comparator(a, b))
}

/// Run a consumer; failure is logged and skipped.
pub(crate) fn run<A>(site: &'static str, consumer: impl FnOnce(A), arg: A) {
    guarded(site, (), || consumer(arg));
}
