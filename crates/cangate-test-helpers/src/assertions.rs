//! Assertion macros for gatekeeper verdicts.

/// Assert that a [`TxVerdict`](cangate_safety::TxVerdict) accepted the
/// frame.
///
/// ```rust
/// use cangate_test_helpers::assert_accepted;
/// use cangate_safety::TxVerdict;
///
/// assert_accepted!(TxVerdict::Accept);
/// ```
#[macro_export]
macro_rules! assert_accepted {
    ($verdict:expr $(,)?) => {
        let verdict = $verdict;
        if !verdict.is_accepted() {
            panic!("assertion failed: expected Accept, got {:?}", verdict);
        }
    };
    ($verdict:expr, $($arg:tt)+) => {
        let verdict = $verdict;
        if !verdict.is_accepted() {
            panic!(
                "assertion failed: expected Accept, got {:?}: {}",
                verdict,
                format_args!($($arg)+)
            );
        }
    };
}

/// Assert that a verdict rejected the frame for a reason matching a
/// pattern.
///
/// ```rust
/// use cangate_test_helpers::assert_rejected;
/// use cangate_safety::{RejectReason, TxVerdict};
///
/// assert_rejected!(
///     TxVerdict::Reject(RejectReason::NotWhitelisted),
///     RejectReason::NotWhitelisted
/// );
/// ```
#[macro_export]
macro_rules! assert_rejected {
    ($verdict:expr, $pattern:pat $(,)?) => {
        match $verdict {
            $crate::__private::TxVerdict::Reject(reason) => {
                if !matches!(reason, $pattern) {
                    panic!(
                        "assertion failed: rejected for {:?}, expected {}",
                        reason,
                        stringify!($pattern)
                    );
                }
            }
            $crate::__private::TxVerdict::Accept => {
                panic!("assertion failed: accepted, expected {}", stringify!($pattern));
            }
        }
    };
}

/// Assert that an expression lies in an inclusive range.
///
/// ```rust
/// use cangate_test_helpers::assert_in_range;
///
/// assert_in_range!(5, 0, 10);
/// ```
#[macro_export]
macro_rules! assert_in_range {
    ($value:expr, $min:expr, $max:expr $(,)?) => {
        let value = $value;
        let min = $min;
        let max = $max;
        if value < min || value > max {
            panic!(
                "assertion failed: value not in range\n  value: `{:?}`,\n  range: `[{:?}, {:?}]`",
                value, min, max
            );
        }
    };
}
