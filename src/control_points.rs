use crate::{match_feature_points, Error, FeaturePoints, IntegralImage, SimpleSurf, SurfConfig};
use image::DynamicImage;
use log::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A correspondence between two images, in pixel-center coordinates.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlPoint {
    /// Column in the first image.
    pub pixel: f64,
    /// Row in the first image.
    pub line: f64,
    /// Column in the second image.
    pub x: f64,
    /// Row in the second image.
    pub y: f64,
}

/// Find control points between two overlapping images.
///
/// Both images go through luminosity conversion, feature extraction with the
/// octave range and detector threshold of `config`, and are then matched with
/// its matching threshold.
///
/// # Errors
/// Fails if the octave range of `config` is invalid or an image is empty.
///
/// # Example
/// ```
/// use image::{DynamicImage, GrayImage};
/// use simple_surf::{compute_matching_points, SurfConfig};
///
/// let first = DynamicImage::ImageLuma8(GrayImage::new(64, 64));
/// let second = first.clone();
/// let points = compute_matching_points(&first, &second, &SurfConfig::default()).unwrap();
/// assert!(points.is_empty());
/// ```
pub fn compute_matching_points(
    first: &DynamicImage,
    second: &DynamicImage,
    config: &SurfConfig,
) -> Result<Vec<ControlPoint>, Error> {
    let mut surf = SimpleSurf::from_config(config)?;
    trace!("Gathering feature points of the first image.");
    let first_points = gather_feature_points(&mut surf, first, config)?;
    trace!("Gathering feature points of the second image.");
    let second_points = gather_feature_points(&mut surf, second, config)?;

    let matches = match_feature_points(&first_points, &second_points, config.matching_threshold);
    let control_points: Vec<ControlPoint> = matches
        .iter()
        .map(|pair| ControlPoint {
            pixel: pair.0.x() as f64 + 0.5,
            line: pair.0.y() as f64 + 0.5,
            x: pair.1.x() as f64 + 0.5,
            y: pair.1.y() as f64 + 0.5,
        })
        .collect();
    info!("Found {} control points", control_points.len());
    Ok(control_points)
}

fn gather_feature_points(
    surf: &mut SimpleSurf,
    image: &DynamicImage,
    config: &SurfConfig,
) -> Result<FeaturePoints, Error> {
    let integral = IntegralImage::from_dynamic(image)?;
    Ok(surf.extract_feature_points(&integral, config.detector_threshold))
}
