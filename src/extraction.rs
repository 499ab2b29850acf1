use crate::{build_descriptor, FeaturePoint, FeaturePoints, IntegralImage, OctaveMap, SimpleSurf};
use log::*;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

impl SimpleSurf {
    /// Detect feature points on an integral image and describe them.
    ///
    /// The octave map owned by the extractor is recomputed from `image`. Every
    /// consecutive (bottom, mid, top) triplet of interval layers is then scanned
    /// for local maxima of the Hessian determinant reaching `threshold`.
    ///
    /// Points are emitted octave by octave, then triplet by triplet, then in
    /// row-major order. The same physical point may be reported by several
    /// octaves; no deduplication is done. An image too small for the filters
    /// gives an empty collection.
    ///
    /// # Arguments
    /// * `image` - The integral image of the luminosity.
    /// * `threshold` - Minimum Hessian determinant of a feature point.
    pub fn extract_feature_points(
        &mut self,
        image: &IntegralImage,
        threshold: f64,
    ) -> FeaturePoints {
        trace!("Computing the octave map.");
        self.octave_map.compute_map(image);
        trace!("Searching for scale space extrema.");

        let triplets: Vec<(u32, usize)> = (self.octave_start..=self.octave_end)
            .flat_map(|octave| (0..OctaveMap::INTERVALS - 2).map(move |k| (octave, k)))
            .collect();

        #[cfg(not(feature = "rayon"))]
        let per_triplet: Vec<Vec<FeaturePoint>> = triplets
            .iter()
            .map(|&(octave, k)| self.scan_triplet(image, octave, k, threshold))
            .collect();
        #[cfg(feature = "rayon")]
        let per_triplet: Vec<Vec<FeaturePoint>> = triplets
            .par_iter()
            .map(|&(octave, k)| self.scan_triplet(image, octave, k, threshold))
            .collect();

        let points: FeaturePoints = per_triplet.into_iter().flatten().collect();
        info!("Extracted {} feature points", points.len());
        points
    }

    /// Scan the mid layer of the `k`-th interval triplet of `octave`.
    fn scan_triplet(
        &self,
        image: &IntegralImage,
        octave: u32,
        k: usize,
        threshold: f64,
    ) -> Vec<FeaturePoint> {
        let layers = self.octave_map.layers(octave);
        let (bottom, mid, top) = (&layers[k], &layers[k + 1], &layers[k + 2]);
        let mut points = vec![];
        for row in 0..mid.height {
            for col in 0..mid.width {
                if OctaveMap::is_extremum(row, col, bottom, mid, top, threshold) {
                    let mut point = FeaturePoint::new(
                        (col, row),
                        mid.scale,
                        mid.radius,
                        mid.signs[(row, col)],
                    );
                    build_descriptor(&mut point, image);
                    points.push(point);
                }
            }
        }
        debug!(
            "Octave {}, intervals {}..={}: {} extrema.",
            octave,
            bottom.interval,
            top.interval,
            points.len()
        );
        points
    }
}
