use crate::{FeaturePoint, IntegralImage, DESCRIPTOR_SIZE};

/// Side of the descriptor window, in units of the point scale.
const WINDOW_SCALE: f64 = 20.0;
/// Quadrants along each side of the descriptor window.
const QUADRANTS: i64 = 4;
/// Haar samples along each side of a quadrant.
const SAMPLES: i64 = 5;

/// Computes the descriptor of `point` from the Haar wavelet responses around it
/// and stores it in the point.
///
/// The window of side `20 * scale` centred on the point is split into a 4x4
/// grid of quadrants. Each quadrant is sampled on a regular 5x5 grid with Haar
/// wavelets of side `2 * scale`, and contributes `Σdx, Σdy, Σ|dx|, Σ|dy|` to
/// the descriptor. The descriptor is not normalized.
///
/// Windows reaching past the image borders see zeros there.
pub fn build_descriptor(point: &mut FeaturePoint, image: &IntegralImage) {
    debug_assert!(point.scale > 0.0, "feature point scale must be positive");
    let haar_size = (2.0 * point.scale) as i64;
    let window_side = (WINDOW_SCALE * point.scale) as i64;
    let quadrant_step = window_side / QUADRANTS;
    let sample_step = quadrant_step / SAMPLES;

    let top = point.y() as i64 - window_side / 2;
    let left = point.x() as i64 - window_side / 2;

    let mut descriptor = [0f64; DESCRIPTOR_SIZE];
    let mut quadrant_values = descriptor.chunks_exact_mut(4);
    for qr in 0..QUADRANTS {
        for qc in 0..QUADRANTS {
            let quadrant_top = top + qr * quadrant_step;
            let quadrant_left = left + qc * quadrant_step;

            let mut dx = 0f64;
            let mut dy = 0f64;
            let mut abs_dx = 0f64;
            let mut abs_dy = 0f64;
            for sr in 0..SAMPLES {
                for sc in 0..SAMPLES {
                    // Approximate center of the sub-quadrant.
                    let center_row = quadrant_top + sr * sample_step + sample_step / 2;
                    let center_col = quadrant_left + sc * sample_step + sample_step / 2;
                    let row = center_row - haar_size / 2;
                    let col = center_col - haar_size / 2;

                    let sample_dx = image.haar_wavelet_x(row, col, haar_size);
                    let sample_dy = image.haar_wavelet_y(row, col, haar_size);
                    dx += sample_dx;
                    dy += sample_dy;
                    abs_dx += sample_dx.abs();
                    abs_dy += sample_dy.abs();
                }
            }

            if let Some(values) = quadrant_values.next() {
                values.copy_from_slice(&[dx, dy, abs_dx, abs_dy]);
            }
        }
    }
    point.descriptor = descriptor;
}
