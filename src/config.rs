#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tunables for matching two images end to end.
///
/// The detector threshold is the parameter most worth adjusting. Use
/// [`SurfConfig::new`] to set it and keep the other defaults.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurfConfig {
    /// First octave to search, starting at 1.
    pub octave_start: u32,

    /// Last octave to search, inclusive.
    pub octave_end: u32,

    /// Minimum Hessian determinant of a feature point.
    pub detector_threshold: f64,

    /// Maximum normalized descriptor distance of a matched pair, in `[0, 1]`.
    pub matching_threshold: f64,
}

impl SurfConfig {
    /// Default configuration with a custom detector threshold.
    pub fn new(detector_threshold: f64) -> Self {
        Self {
            detector_threshold,
            ..Default::default()
        }
    }
}

impl Default for SurfConfig {
    fn default() -> Self {
        Self {
            octave_start: 2,
            octave_end: 2,
            detector_threshold: 0.001,
            matching_threshold: 0.015,
        }
    }
}
