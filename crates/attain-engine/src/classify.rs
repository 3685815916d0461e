//! Threshold classification of attainment percentages.

use attain_core::attainment::{Attainment, AttainmentLevel, ThresholdConfig};

/// Map an attainment value to its discrete level.
///
/// Breakpoints are inclusive lower bounds on the higher band: exactly 80.0
/// classifies as `Excellent` under the default config, 79.999 as `High`.
/// An `Undefined` attainment is `Unknown`, never `VeryLow` — no measurement
/// is not a failing measurement.
pub fn classify(
  attainment: Attainment,
  thresholds: &ThresholdConfig,
) -> AttainmentLevel {
  let value = match attainment {
    Attainment::Measured(v) => v,
    Attainment::Undefined => return AttainmentLevel::Unknown,
  };

  if value >= thresholds.excellent {
    AttainmentLevel::Excellent
  } else if value >= thresholds.high {
    AttainmentLevel::High
  } else if value >= thresholds.medium {
    AttainmentLevel::Medium
  } else if value >= thresholds.low {
    AttainmentLevel::Low
  } else {
    AttainmentLevel::VeryLow
  }
}
