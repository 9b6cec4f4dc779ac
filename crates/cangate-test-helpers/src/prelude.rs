//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use cangate_test_helpers::prelude::*;
//! ```

pub use crate::frames::FramePacker;
pub use crate::must::{must, must_some};
pub use crate::scenario::{CAMERA_BUS, Scenario, VEHICLE_BUS};
pub use crate::vw::{self, Buttons, tsk_status};
pub use crate::{assert_accepted, assert_in_range, assert_rejected};

#[cfg(feature = "tracking")]
pub use crate::assert_rt_safe;
#[cfg(feature = "tracking")]
pub use crate::tracking::{AllocationGuard, track};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
