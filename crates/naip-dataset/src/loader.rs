//! Raster loading.
//!
//! Decodes a tile from disk into a channels-last `(H, W, C)` array of raw
//! sensor values. No value scaling happens here.

use std::path::Path;

use image::{DynamicImage, ImageReader};
use naip_core::{Error, Result};
use ndarray::Array3;
use tracing::trace;

/// Raw pixel values of a decoded image, one entry per sample
fn raw_samples(image: &DynamicImage) -> Option<Vec<f32>> {
    fn widen<T: Copy + Into<f32>>(raw: &[T]) -> Vec<f32> {
        raw.iter().map(|&v| v.into()).collect()
    }

    let samples = match image {
        DynamicImage::ImageLuma8(buf) => widen(buf.as_raw()),
        DynamicImage::ImageLumaA8(buf) => widen(buf.as_raw()),
        DynamicImage::ImageRgb8(buf) => widen(buf.as_raw()),
        DynamicImage::ImageRgba8(buf) => widen(buf.as_raw()),
        DynamicImage::ImageLuma16(buf) => widen(buf.as_raw()),
        DynamicImage::ImageLumaA16(buf) => widen(buf.as_raw()),
        DynamicImage::ImageRgb16(buf) => widen(buf.as_raw()),
        DynamicImage::ImageRgba16(buf) => widen(buf.as_raw()),
        DynamicImage::ImageRgb32F(buf) => buf.as_raw().clone(),
        DynamicImage::ImageRgba32F(buf) => buf.as_raw().clone(),
        _ => return None,
    };
    Some(samples)
}

/// Converts a decoded image into a channels-last array without rescaling.
pub fn decode_raster(image: &DynamicImage) -> Result<Array3<f32>> {
    let channels = image.color().channel_count() as usize;
    let (width, height) = (image.width() as usize, image.height() as usize);

    let samples = raw_samples(image).ok_or_else(|| {
        Error::InvalidShape(format!("unsupported pixel layout {:?}", image.color()))
    })?;

    Ok(Array3::from_shape_vec((height, width, channels), samples)?)
}

/// Reads and decodes the raster at `path`.
pub fn load_raster(path: &Path) -> Result<Array3<f32>> {
    if !path.exists() {
        return Err(Error::image(path, "file not found"));
    }

    let image = ImageReader::open(path)
        .map_err(|e| Error::image(path, e))?
        .with_guessed_format()
        .map_err(|e| Error::image(path, e))?
        .decode()
        .map_err(|e| Error::image(path, e))?;

    let raster = decode_raster(&image).map_err(|e| Error::image(path, e))?;
    trace!("Loaded raster {} with shape {:?}", path.display(), raster.dim());
    Ok(raster)
}

/// Loads a raster and checks it carries at least `min_channels` channels.
pub fn load_raster_with_channels(path: &Path, min_channels: usize) -> Result<Array3<f32>> {
    let raster = load_raster(path)?;
    let channels = raster.dim().2;
    if channels < min_channels {
        return Err(Error::image(
            path,
            format!("raster has {channels} channel(s), at least {min_channels} required"),
        ));
    }
    Ok(raster)
}
