//! Shared test utilities for cangate.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with good error messages and `#[track_caller]`
//! - [`frames`] - Frame builders that fill in counters and checksums
//! - [`vw`] - Payload builders for the Volkswagen presets
//! - [`scenario`] - A driven engine with its own clock
//! - [`assertions`] - Verdict assertion macros
//! - [`tracking`] - Allocation tracking for RT safety tests
//! - [`prelude`] - Convenience re-exports
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! cangate-test-helpers = { path = "crates/cangate-test-helpers" }
//! ```
//!
//! ```rust,ignore
//! use cangate_test_helpers::prelude::*;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::unwrap_used, clippy::panic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod assertions;
pub mod frames;
pub mod must;
pub mod prelude;
pub mod scenario;
pub mod vw;

#[cfg(feature = "tracking")]
#[cfg_attr(docsrs, doc(cfg(feature = "tracking")))]
pub mod tracking;

#[cfg(all(test, feature = "tracking"))]
#[global_allocator]
static GLOBAL_TEST: tracking::TrackingAllocator = tracking::TrackingAllocator;

pub use must::*;

#[doc(hidden)]
pub mod __private {
    pub use cangate_safety::TxVerdict;
}

#[cfg(feature = "tracking")]
pub use tracking::track;
