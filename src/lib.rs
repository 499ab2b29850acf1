//! # Simple SURF
//!
//! Scale-invariant interest point detection and matching between two rasters,
//! in the spirit of SURF. The pipeline is:
//!
//! ```text
//! raster bands -> luminosity -> integral image -> octave map (Hessian pyramid)
//!              -> feature points (+ descriptors) -> matcher -> matched pairs
//! ```
//!
//! The matcher is deliberately greedy: outer points claim their nearest inner
//! point in scan order and a claimed point is never reconsidered.
//!
//! # Example
//! ```
//! use ndarray::Array2;
//! use simple_surf::{IntegralImage, SimpleSurf};
//!
//! let luminosity = Array2::<f64>::zeros((64, 64));
//! let image = IntegralImage::new(luminosity.view());
//! let mut surf = SimpleSurf::new(1, 1).unwrap();
//! let points = surf.extract_feature_points(&image, 0.001);
//! assert!(points.is_empty());
//! ```

mod config;
mod control_points;
mod descriptors;
mod extraction;
pub mod integral_image;
mod luminosity;
mod matching;
pub mod octave_map;

pub use crate::config::SurfConfig;
pub use crate::control_points::{compute_matching_points, ControlPoint};
pub use crate::descriptors::build_descriptor;
pub use crate::integral_image::IntegralImage;
pub use crate::luminosity::{to_luminosity, ImageBand, RasterBand};
pub use crate::matching::{euclidean_distance, match_feature_points, MatchedPoints};
pub use crate::octave_map::{OctaveLayer, OctaveMap};

use cv_core::nalgebra::Point2;
use cv_core::ImagePoint;
use derive_more::{AsRef, Deref, From, IntoIterator};

/// Number of values in a feature point descriptor.
pub const DESCRIPTOR_SIZE: usize = 64;

/// A gradient-summary descriptor: `(Σdx, Σdy, Σ|dx|, Σ|dy|)` for each of the
/// 16 quadrants around the point, in row-major quadrant order.
pub type Descriptor = [f64; DESCRIPTOR_SIZE];

/// Errors of the luminosity conversion and of the extractor setup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// [`to_luminosity`] was not given exactly a red, green and blue band.
    #[error("raster bands are not specified: expected 3 bands, found {found}")]
    MissingBands { found: usize },
    /// [`to_luminosity`] or [`compute_matching_points`] got a buffer or image
    /// without area.
    #[error("output buffer has no area ({width} x {height})")]
    EmptyBuffer { width: usize, height: usize },
    /// [`to_luminosity`] was asked for a window larger than the red band.
    #[error(
        "red band is {band_width} x {band_height}, smaller than the requested {width} x {height}"
    )]
    ExtentOutOfBounds {
        width: usize,
        height: usize,
        band_width: usize,
        band_height: usize,
    },
    /// [`SimpleSurf::new`] or [`OctaveMap::new`] got a range outside of
    /// `1 <= start <= end`.
    #[error("octave range {start}..={end} is invalid, expected 1 <= start <= end")]
    InvalidOctaveRange { start: u32, end: u32 },
    /// The box filters of `octave` are too large to be indexed, returned by
    /// [`SimpleSurf::new`] and [`OctaveMap::new`].
    #[error("box filters of octave {octave} overflow the pixel index range")]
    OctaveTooLarge { octave: u32 },
}

/// An interest point found in the scale space.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePoint {
    /// Pixel coordinates `(x, y)` at working resolution, `x` being the column.
    pub point: (usize, usize),
    /// Scale of the layer the point was detected in.
    pub scale: f64,
    /// Search radius of the detection layer.
    pub radius: usize,
    /// Sign of the Hessian trace (the Laplacian) at detection time.
    /// `true` for a non-negative trace, i.e. a dark blob on a bright background.
    pub sign: bool,
    descriptor: Descriptor,
}

impl FeaturePoint {
    /// A point with an all-zero descriptor. Use [`build_descriptor`] to fill it.
    pub fn new(point: (usize, usize), scale: f64, radius: usize, sign: bool) -> Self {
        Self::with_descriptor(point, scale, radius, sign, [0.0; DESCRIPTOR_SIZE])
    }

    pub fn with_descriptor(
        point: (usize, usize),
        scale: f64,
        radius: usize,
        sign: bool,
        descriptor: Descriptor,
    ) -> Self {
        Self {
            point,
            scale,
            radius,
            sign,
            descriptor,
        }
    }

    pub fn x(&self) -> usize {
        self.point.0
    }

    pub fn y(&self) -> usize {
        self.point.1
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

impl ImagePoint for FeaturePoint {
    fn image_point(&self) -> Point2<f64> {
        Point2::new(self.point.0 as f64, self.point.1 as f64)
    }
}

/// An append-only, ordered collection of feature points.
///
/// Points keep their extraction order: octave ascending, then interval
/// ascending, then row-major within a layer.
#[derive(Debug, Clone, Default, PartialEq, AsRef, Deref, From, IntoIterator)]
pub struct FeaturePoints(Vec<FeaturePoint>);

impl FeaturePoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: FeaturePoint) {
        self.0.push(point);
    }

    /// Moves all points of `other` to the end of this collection.
    pub fn append(&mut self, other: &mut FeaturePoints) {
        self.0.append(&mut other.0);
    }

    pub fn into_vec(self) -> Vec<FeaturePoint> {
        self.0
    }
}

impl Extend<FeaturePoint> for FeaturePoints {
    fn extend<T: IntoIterator<Item = FeaturePoint>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<FeaturePoint> for FeaturePoints {
    fn from_iter<T: IntoIterator<Item = FeaturePoint>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The feature extractor.
///
/// It owns the octave map it detects on, so the Hessian pyramid computed by the
/// last extraction is kept until the next one (see [`SimpleSurf::octave_map`]).
#[derive(Debug)]
pub struct SimpleSurf {
    octave_start: u32,
    octave_end: u32,
    octave_map: OctaveMap,
}

impl SimpleSurf {
    /// Create an extractor searching the inclusive octave range
    /// `octave_start..=octave_end`.
    ///
    /// Fails unless `1 <= octave_start <= octave_end` and the box filters of
    /// `octave_end` fit in a `usize`.
    pub fn new(octave_start: u32, octave_end: u32) -> Result<Self, Error> {
        Ok(Self {
            octave_start,
            octave_end,
            octave_map: OctaveMap::new(octave_start, octave_end)?,
        })
    }

    /// Create an extractor from the octave range of a [`SurfConfig`].
    pub fn from_config(config: &SurfConfig) -> Result<Self, Error> {
        Self::new(config.octave_start, config.octave_end)
    }

    pub fn octave_start(&self) -> u32 {
        self.octave_start
    }

    pub fn octave_end(&self) -> u32 {
        self.octave_end
    }

    /// The Hessian pyramid computed by the most recent extraction.
    pub fn octave_map(&self) -> &OctaveMap {
        &self.octave_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octave_range_is_validated() {
        assert!(matches!(
            SimpleSurf::new(0, 2),
            Err(Error::InvalidOctaveRange { start: 0, end: 2 })
        ));
        assert!(matches!(
            SimpleSurf::new(3, 2),
            Err(Error::InvalidOctaveRange { start: 3, end: 2 })
        ));
        let surf = SimpleSurf::new(2, 3).unwrap();
        assert_eq!(surf.octave_start(), 2);
        assert_eq!(surf.octave_end(), 3);
    }

    #[test]
    fn octaves_with_overflowing_filters_are_rejected() {
        assert!(matches!(
            SimpleSurf::new(1, 64),
            Err(Error::OctaveTooLarge { .. })
        ));
        assert!(matches!(
            SimpleSurf::new(62, 63),
            Err(Error::OctaveTooLarge { octave: 62 })
        ));
        assert!(matches!(
            SimpleSurf::new(u32::MAX, u32::MAX),
            Err(Error::OctaveTooLarge { octave: u32::MAX })
        ));
        assert_eq!(
            Error::OctaveTooLarge { octave: 70 }.to_string(),
            "box filters of octave 70 overflow the pixel index range"
        );
    }

    #[test]
    fn collections_only_append() {
        let mut first: FeaturePoints = vec![FeaturePoint::new((1, 2), 2.0, 4, true)].into();
        let mut second = FeaturePoints::new();
        second.push(FeaturePoint::new((3, 4), 2.0, 4, false));
        first.append(&mut second);
        assert!(second.is_empty());
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].point, (3, 4));
        assert_eq!(first[1].descriptor().len(), DESCRIPTOR_SIZE);
    }

    #[test]
    fn image_point_uses_pixel_coordinates() {
        let point = FeaturePoint::new((7, 11), 2.0, 4, true);
        assert_eq!(point.image_point(), Point2::new(7.0, 11.0));
    }
}
