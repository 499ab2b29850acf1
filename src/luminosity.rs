use crate::Error;
use image::{DynamicImage, GrayImage, Luma};
use log::*;
use ndarray::{azip, Array2};

/// Weights of the red, green and blue bands in the luminosity.
const RED_WEIGHT: f64 = 0.21;
const GREEN_WEIGHT: f64 = 0.72;
const BLUE_WEIGHT: f64 = 0.07;

/// Samples are expected in the 8-bit range.
const MAX_VALUE: f64 = 255.0;

/// A single band of a raster that can be read into memory.
pub trait RasterBand {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Read the window `[0, x_size) x [0, y_size)` into a `buf_height x buf_width`
    /// array with nearest neighbour resampling.
    ///
    /// Samples that fall outside of the band read as zero.
    fn read(&self, x_size: usize, y_size: usize, buf_width: usize, buf_height: usize)
        -> Array2<f64>;
}

/// One 8-bit channel of an image, usable as a [`RasterBand`].
#[derive(Debug, Clone)]
pub struct ImageBand(pub GrayImage);

impl ImageBand {
    /// Split an image into its red, green and blue bands.
    ///
    /// Grayscale images give three identical bands.
    pub fn rgb(image: &DynamicImage) -> [ImageBand; 3] {
        let rgb = image.to_rgb8();
        let channel = |c: usize| {
            ImageBand(GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                Luma([rgb[(x, y)][c]])
            }))
        };
        [channel(0), channel(1), channel(2)]
    }
}

impl RasterBand for ImageBand {
    fn width(&self) -> usize {
        self.0.width() as usize
    }

    fn height(&self) -> usize {
        self.0.height() as usize
    }

    fn read(
        &self,
        x_size: usize,
        y_size: usize,
        buf_width: usize,
        buf_height: usize,
    ) -> Array2<f64> {
        let x_ratio = x_size as f64 / buf_width as f64;
        let y_ratio = y_size as f64 / buf_height as f64;
        Array2::from_shape_fn((buf_height, buf_width), |(r, c)| {
            let x = ((c as f64 + 0.5) * x_ratio) as usize;
            let y = ((r as f64 + 0.5) * y_ratio) as usize;
            if x < self.width() && y < self.height() {
                f64::from(self.0[(x as u32, y as u32)][0])
            } else {
                0.0
            }
        })
    }
}

/// Convert three bands into a luminosity buffer of `buf_height x buf_width`
/// with values `(0.21 R + 0.72 G + 0.07 B) / 255`.
///
/// `bands` must hold the red, green and blue band in that order. The requested
/// `x_size x y_size` window is only checked against the red band; the green and
/// blue bands read as zero wherever they are smaller.
///
/// # Errors
/// * [`Error::MissingBands`] unless exactly three bands are given.
/// * [`Error::EmptyBuffer`] if the buffer has no area.
/// * [`Error::ExtentOutOfBounds`] if the window exceeds the red band.
pub fn to_luminosity<B: RasterBand>(
    bands: &[&B],
    x_size: usize,
    y_size: usize,
    buf_width: usize,
    buf_height: usize,
) -> Result<Array2<f64>, Error> {
    let (red, green, blue) = match *bands {
        [red, green, blue] => (red, green, blue),
        _ => return Err(Error::MissingBands { found: bands.len() }),
    };
    if x_size > red.width() || y_size > red.height() {
        return Err(Error::ExtentOutOfBounds {
            width: x_size,
            height: y_size,
            band_width: red.width(),
            band_height: red.height(),
        });
    }
    if buf_width == 0 || buf_height == 0 {
        return Err(Error::EmptyBuffer {
            width: buf_width,
            height: buf_height,
        });
    }

    let red = red.read(x_size, y_size, buf_width, buf_height);
    let green = green.read(x_size, y_size, buf_width, buf_height);
    let blue = blue.read(x_size, y_size, buf_width, buf_height);
    let mut luminosity = Array2::zeros((buf_height, buf_width));
    azip!((
        out in &mut luminosity,
        &r in &red,
        &g in &green,
        &b in &blue,
    ) {
        *out = (r * RED_WEIGHT + g * GREEN_WEIGHT + b * BLUE_WEIGHT) / MAX_VALUE;
    });
    trace!(
        "Converted a {} x {} window to a {} x {} luminosity buffer.",
        x_size,
        y_size,
        buf_width,
        buf_height
    );
    Ok(luminosity)
}
