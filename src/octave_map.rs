use crate::{Error, IntegralImage};
use log::*;
use ndarray::Array2;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Relative weight of the `Dxy` box filter response in the Hessian determinant.
const DXY_WEIGHT: f64 = 0.9;

/// One (octave, interval) layer of the Hessian pyramid.
#[derive(Debug, Clone)]
pub struct OctaveLayer {
    pub octave: u32,
    pub interval: u32,
    /// Side of the box filters.
    pub filter_size: usize,
    /// Half the filter side. Points closer than this to a border have no response.
    pub radius: usize,
    /// Scale assigned to points detected in this layer.
    pub scale: f64,
    pub width: usize,
    pub height: usize,
    /// Approximated Hessian determinant, indexed by `(row, col)`.
    pub det_hessians: Array2<f64>,
    /// Sign of the Hessian trace, `true` if `Dxx + Dyy >= 0`.
    pub signs: Array2<bool>,
}

impl OctaveLayer {
    /// An empty layer for `octave >= 1` and interval `1..=OctaveMap::INTERVALS`.
    ///
    /// Fails with [`Error::OctaveTooLarge`] if the box filter side of the layer
    /// does not fit in a `usize`.
    pub fn new(octave: u32, interval: u32) -> Result<Self, Error> {
        let (scale, filter_size) =
            Self::filter_size(octave, interval).ok_or(Error::OctaveTooLarge { octave })?;
        Ok(Self {
            octave,
            interval,
            filter_size,
            radius: (filter_size - 1) / 2,
            scale: scale as f64,
            width: 0,
            height: 0,
            det_hessians: Array2::zeros((0, 0)),
            signs: Array2::from_elem((0, 0), false),
        })
    }

    /// `(2^octave, 3 * (2^octave * interval + 1))`, if neither overflows.
    fn filter_size(octave: u32, interval: u32) -> Option<(usize, usize)> {
        let scale = 1usize.checked_shl(octave)?;
        let filter_size = scale
            .checked_mul(interval as usize)?
            .checked_add(1)?
            .checked_mul(3)?;
        Some((scale, filter_size))
    }

    /// Evaluate the box-filter Hessian at every pixel the filter fits around.
    /// Pixels closer than `radius` to a border keep a zero response.
    #[allow(clippy::suspicious_operation_groupings)]
    pub fn compute_layer(&mut self, image: &IntegralImage) {
        self.width = image.width();
        self.height = image.height();
        self.det_hessians = Array2::zeros((self.height, self.width));
        self.signs = Array2::from_elem((self.height, self.width), false);

        if self.height < self.filter_size || self.width < self.filter_size {
            trace!(
                "Layer ({}, {}) has no room for a {} px filter.",
                self.octave,
                self.interval,
                self.filter_size
            );
            return;
        }

        let size = self.filter_size as i64;
        let radius = self.radius as i64;
        let lobe = size / 3;
        let long_part = 2 * lobe - 1;
        let normalization = (size * size) as f64;

        for r in self.radius..self.height - self.radius {
            for c in self.radius..self.width - self.radius {
                let (row, col) = (r as i64, c as i64);
                let dxx = image.rectangle_sum(row - lobe + 1, col - radius, size, long_part)
                    - 3.0
                        * image.rectangle_sum(
                            row - lobe + 1,
                            col - (lobe - 1) / 2,
                            lobe,
                            long_part,
                        );
                let dyy = image.rectangle_sum(row - radius, col - lobe + 1, long_part, size)
                    - 3.0
                        * image.rectangle_sum(
                            row - (lobe - 1) / 2,
                            col - lobe + 1,
                            long_part,
                            lobe,
                        );
                let dxy = image.rectangle_sum(row - lobe, col - lobe, lobe, lobe)
                    + image.rectangle_sum(row + 1, col + 1, lobe, lobe)
                    - image.rectangle_sum(row - lobe, col + 1, lobe, lobe)
                    - image.rectangle_sum(row + 1, col - lobe, lobe, lobe);

                let dxx = dxx / normalization;
                let dyy = dyy / normalization;
                let dxy = dxy / normalization;

                self.det_hessians[(r, c)] = dxx * dyy - DXY_WEIGHT * DXY_WEIGHT * dxy * dxy;
                self.signs[(r, c)] = dxx + dyy >= 0.0;
            }
        }
    }
}

/// The Hessian pyramid: [`OctaveMap::INTERVALS`] layers for every octave of an
/// inclusive octave range, all at the working resolution of the image.
#[derive(Debug, Clone)]
pub struct OctaveMap {
    octave_start: u32,
    octave_end: u32,
    layers: Vec<Vec<OctaveLayer>>,
}

impl OctaveMap {
    /// Number of interval layers per octave.
    pub const INTERVALS: usize = 4;

    /// An empty map for the inclusive octave range `octave_start..=octave_end`.
    ///
    /// # Errors
    /// * [`Error::InvalidOctaveRange`] unless `1 <= octave_start <= octave_end`.
    /// * [`Error::OctaveTooLarge`] if the filters of an octave overflow a `usize`.
    pub fn new(octave_start: u32, octave_end: u32) -> Result<Self, Error> {
        if octave_start < 1 || octave_end < octave_start {
            return Err(Error::InvalidOctaveRange {
                start: octave_start,
                end: octave_end,
            });
        }
        let layers = (octave_start..=octave_end)
            .map(|octave| {
                (1..=Self::INTERVALS as u32)
                    .map(|interval| OctaveLayer::new(octave, interval))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            octave_start,
            octave_end,
            layers,
        })
    }

    pub fn octave_start(&self) -> u32 {
        self.octave_start
    }

    pub fn octave_end(&self) -> u32 {
        self.octave_end
    }

    /// Compute every layer of the map from an integral image.
    pub fn compute_map(&mut self, image: &IntegralImage) {
        #[cfg(not(feature = "rayon"))]
        for layer in self.layers.iter_mut().flatten() {
            layer.compute_layer(image);
        }
        #[cfg(feature = "rayon")]
        self.layers
            .par_iter_mut()
            .flat_map(|octave| octave.par_iter_mut())
            .for_each(|layer| layer.compute_layer(image));
        debug!(
            "Computed Hessian layers for octaves {}..={} on a {} x {} image.",
            self.octave_start,
            self.octave_end,
            image.width(),
            image.height()
        );
    }

    /// All interval layers of `octave`, in ascending interval order.
    ///
    /// Panics if `octave` is outside the range of the map.
    pub fn layers(&self, octave: u32) -> &[OctaveLayer] {
        assert!(
            (self.octave_start..=self.octave_end).contains(&octave),
            "octave {} is outside of {}..={}",
            octave,
            self.octave_start,
            self.octave_end
        );
        &self.layers[(octave - self.octave_start) as usize]
    }

    /// The layer for `octave` and `interval` (`1..=INTERVALS`).
    ///
    /// Panics if `octave` is outside the range of the map or `interval` is
    /// outside `1..=INTERVALS`.
    pub fn layer(&self, octave: u32, interval: u32) -> &OctaveLayer {
        assert!(
            (1..=Self::INTERVALS as u32).contains(&interval),
            "interval {} is outside of 1..={}",
            interval,
            Self::INTERVALS
        );
        &self.layers(octave)[interval as usize - 1]
    }

    /// Check that `(row, col)` of `mid` is a local maximum over its 26
    /// neighbours in `bottom`, `mid` and `top`, and that it reaches `threshold`.
    pub fn is_extremum(
        row: usize,
        col: usize,
        bottom: &OctaveLayer,
        mid: &OctaveLayer,
        top: &OctaveLayer,
        threshold: f64,
    ) -> bool {
        // The point needs all neighbours inside the widest filter.
        let radius = top.radius;
        if row <= radius
            || col <= radius
            || row + radius >= top.height
            || col + radius >= top.width
        {
            return false;
        }

        let value = mid.det_hessians[(row, col)];
        if value < threshold {
            return false;
        }

        for r in row - 1..=row + 1 {
            for c in col - 1..=col + 1 {
                if top.det_hessians[(r, c)] >= value || bottom.det_hessians[(r, c)] >= value {
                    return false;
                }
                if (r, c) != (row, col) && mid.det_hessians[(r, c)] >= value {
                    return false;
                }
            }
        }
        true
    }
}
