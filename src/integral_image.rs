use crate::luminosity::{to_luminosity, ImageBand};
use crate::Error;
use image::{DynamicImage, GenericImageView};
use log::*;
use ndarray::{Array2, ArrayView2};

/// A summed-area table over a luminosity image.
///
/// The table carries one row and one column of zero padding, so that the
/// entry at `(r, c)` is the sum of every pixel strictly above and to the left
/// of it. Rectangle queries are clipped to the image, which means any part of
/// a window that falls outside the image contributes zero.
#[derive(Debug, Clone)]
pub struct IntegralImage {
    table: Array2<f64>,
    width: usize,
    height: usize,
}

impl IntegralImage {
    /// Build the table from a `height x width` luminosity array.
    pub fn new(luminosity: ArrayView2<f64>) -> Self {
        let (height, width) = luminosity.dim();
        let mut table = Array2::zeros((height + 1, width + 1));
        for r in 0..height {
            let mut row_sum = 0.0;
            for c in 0..width {
                row_sum += luminosity[(r, c)];
                table[(r + 1, c + 1)] = table[(r, c + 1)] + row_sum;
            }
        }
        Self {
            table,
            width,
            height,
        }
    }

    /// Build the table from an image, going through the luminosity conversion
    /// of its red, green and blue channels at full size.
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self, Error> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let bands = ImageBand::rgb(image);
        let [red, green, blue] = &bands;
        let luminosity = to_luminosity(&[red, green, blue], width, height, width, height)?;
        debug!("Built luminosity buffer of {} x {}", width, height);
        Ok(Self::new(luminosity.view()))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sum of the window with top-left corner `(row, col)` spanning `width`
    /// columns and `height` rows.
    pub fn rectangle_sum(&self, row: i64, col: i64, width: i64, height: i64) -> f64 {
        let top = row.clamp(0, self.height as i64) as usize;
        let left = col.clamp(0, self.width as i64) as usize;
        let bottom = (row + height).clamp(0, self.height as i64) as usize;
        let right = (col + width).clamp(0, self.width as i64) as usize;
        if bottom <= top || right <= left {
            return 0.0;
        }
        let sum = self.table[(bottom, right)] - self.table[(top, right)]
            - self.table[(bottom, left)]
            + self.table[(top, left)];
        sum.max(0.0)
    }

    /// Horizontal Haar wavelet response of the `size x size` window with
    /// top-left corner `(row, col)`: right half minus left half.
    pub fn haar_wavelet_x(&self, row: i64, col: i64, size: i64) -> f64 {
        let half = size / 2;
        self.rectangle_sum(row, col + half, half, size) - self.rectangle_sum(row, col, half, size)
    }

    /// Vertical Haar wavelet response of the `size x size` window with
    /// top-left corner `(row, col)`: bottom half minus top half.
    pub fn haar_wavelet_y(&self, row: i64, col: i64, size: i64) -> f64 {
        let half = size / 2;
        self.rectangle_sum(row + half, col, size, half) - self.rectangle_sum(row, col, size, half)
    }
}

#[cfg(test)]
mod tests {
    use super::IntegralImage;
    use ndarray::Array2;

    fn ramp(width: usize, height: usize) -> IntegralImage {
        let image = Array2::from_shape_fn((height, width), |(_, c)| c as f64);
        IntegralImage::new(image.view())
    }

    #[test]
    fn rectangle_sum_of_ones() {
        let image = Array2::from_elem((6, 8), 1.0);
        let integral = IntegralImage::new(image.view());
        assert_eq!(integral.width(), 8);
        assert_eq!(integral.height(), 6);
        assert_eq!(integral.rectangle_sum(0, 0, 8, 6), 48.0);
        assert_eq!(integral.rectangle_sum(1, 2, 3, 2), 6.0);
        assert_eq!(integral.rectangle_sum(5, 7, 1, 1), 1.0);
    }

    #[test]
    fn out_of_range_pixels_contribute_zero() {
        let image = Array2::from_elem((4, 4), 1.0);
        let integral = IntegralImage::new(image.view());
        // Only the 2 x 2 top-left corner overlaps the image.
        assert_eq!(integral.rectangle_sum(-2, -2, 4, 4), 4.0);
        // Only the 1 x 1 bottom-right corner overlaps the image.
        assert_eq!(integral.rectangle_sum(3, 3, 10, 10), 1.0);
        assert_eq!(integral.rectangle_sum(10, 10, 3, 3), 0.0);
        assert_eq!(integral.rectangle_sum(-5, 0, 3, 3), 0.0);
        assert_eq!(integral.rectangle_sum(0, 0, 0, 3), 0.0);
    }

    #[test]
    fn haar_responses_follow_the_gradient() {
        let integral = ramp(16, 16);
        // Each row of the right half is larger by 2 per pixel than the left half.
        assert_eq!(integral.haar_wavelet_x(4, 4, 4), 16.0);
        assert_eq!(integral.haar_wavelet_y(4, 4, 4), 0.0);

        let image = Array2::from_shape_fn((16, 16), |(r, _)| r as f64);
        let integral = IntegralImage::new(image.view());
        assert_eq!(integral.haar_wavelet_x(4, 4, 4), 0.0);
        assert_eq!(integral.haar_wavelet_y(4, 4, 4), 16.0);
    }

    #[test]
    fn empty_image() {
        let image = Array2::<f64>::zeros((0, 0));
        let integral = IntegralImage::new(image.view());
        assert_eq!(integral.rectangle_sum(0, 0, 4, 4), 0.0);
        assert_eq!(integral.haar_wavelet_x(0, 0, 4), 0.0);
    }
}
