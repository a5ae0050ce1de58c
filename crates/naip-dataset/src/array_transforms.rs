//! Pure array transforms used to assemble tiles.
//!
//! Every function accepts 2D `(H, W)` or 3D channels-last `(H, W, C)` arrays
//! and returns an array of the same dimensionality. Spatial operations act on
//! axes 0 and 1 only; the channel axis is never resampled.

use ndarray::{Array, Array3, ArrayView, ArrayView3, ArrayViewD, Axis, Dimension, Slice};
use naip_core::{Error, Result};

/// Spatial `(height, width)` of a 2D or 3D array.
fn spatial_dims(array: &ArrayViewD<'_, f32>) -> Result<(usize, usize)> {
    match array.ndim() {
        2 | 3 => Ok((array.shape()[0], array.shape()[1])),
        n => Err(Error::InvalidShape(format!(
            "expected a 2D (H, W) or 3D (H, W, C) array, got {n} dimension(s)"
        ))),
    }
}

/// Runs `op` on a channels-last view, lifting 2D input to a single channel.
fn with_channels<D, F>(array: ArrayView<'_, f32, D>, op: F) -> Result<Array<f32, D>>
where
    D: Dimension,
    F: FnOnce(ArrayView3<'_, f32>) -> Array3<f32>,
{
    let view = array.into_dyn();
    spatial_dims(&view)?;

    let out = if view.ndim() == 2 {
        let lifted = view.insert_axis(Axis(2)).into_dimensionality()?;
        op(lifted).index_axis_move(Axis(2), 0).into_dyn()
    } else {
        op(view.into_dimensionality()?).into_dyn()
    };

    Ok(out.into_dimensionality()?)
}

/// Source sample positions for one output axis: `(lower, upper, weight)`.
///
/// Half-pixel centres, edge-clamped, the same convention as bilinear image
/// resampling in common imaging libraries.
fn sample_positions(in_len: usize, out_len: usize) -> Vec<(usize, usize, f32)> {
    let scale = in_len as f64 / out_len as f64;
    (0..out_len)
        .map(|i| {
            let src = ((i as f64 + 0.5) * scale - 0.5).clamp(0.0, (in_len - 1) as f64);
            let lower = src.floor() as usize;
            let upper = (lower + 1).min(in_len - 1);
            (lower, upper, (src - lower as f64) as f32)
        })
        .collect()
}

fn bilinear(input: ArrayView3<'_, f32>, out_h: usize, out_w: usize) -> Array3<f32> {
    let (in_h, in_w, channels) = input.dim();
    let rows = sample_positions(in_h, out_h);
    let cols = sample_positions(in_w, out_w);

    Array3::from_shape_fn((out_h, out_w, channels), |(y, x, c)| {
        let (y0, y1, wy) = rows[y];
        let (x0, x1, wx) = cols[x];
        let top = input[[y0, x0, c]] * (1.0 - wx) + input[[y0, x1, c]] * wx;
        let bottom = input[[y1, x0, c]] * (1.0 - wx) + input[[y1, x1, c]] * wx;
        top * (1.0 - wy) + bottom * wy
    })
}

/// Resamples the spatial dimensions to `size × size` with bilinear
/// interpolation. Channel count is preserved.
pub fn resize_as_image<D: Dimension>(array: ArrayView<'_, f32, D>, size: usize) -> Result<Array<f32, D>> {
    let (h, w) = spatial_dims(&array.view().into_dyn())?;
    if size == 0 {
        return Err(Error::InvalidArgument("resize target must be positive".to_string()));
    }
    if h == 0 || w == 0 {
        return Err(Error::InvalidShape(format!("cannot resize an empty {h}x{w} array")));
    }

    with_channels(array, |view| bilinear(view, size, size))
}

/// Integer nearest-neighbour magnification of both spatial axes.
pub fn upscale<D: Dimension>(array: ArrayView<'_, f32, D>, factor: usize) -> Result<Array<f32, D>> {
    if factor < 1 {
        return Err(Error::InvalidArgument(format!(
            "upscale factor must be >= 1, got {factor}"
        )));
    }

    with_channels(array, |view| {
        let (h, w, c) = view.dim();
        Array3::from_shape_fn((h * factor, w * factor, c), |(y, x, ch)| {
            view[[y / factor, x / factor, ch]]
        })
    })
}

/// Top-left corner of a `crop_size` window centred in an `h × w` array.
/// Callers guarantee `crop_size <= h` and `crop_size <= w`.
fn center_crop_origin(h: usize, w: usize, crop_size: usize) -> (usize, usize) {
    ((h - crop_size) / 2, (w - crop_size) / 2)
}

/// Extracts a `crop_size × crop_size` window centred on the spatial midpoint.
pub fn center_crop<D: Dimension>(array: ArrayView<'_, f32, D>, crop_size: usize) -> Result<Array<f32, D>> {
    let (h, w) = spatial_dims(&array.view().into_dyn())?;
    if crop_size == 0 || crop_size > h || crop_size > w {
        return Err(Error::InvalidArgument(format!(
            "crop size {crop_size} does not fit a {h}x{w} array"
        )));
    }

    let (top, left) = center_crop_origin(h, w, crop_size);
    let cropped = array.slice_each_axis(|axis| match axis.axis.index() {
        0 => Slice::from(top..top + crop_size),
        1 => Slice::from(left..left + crop_size),
        _ => Slice::from(..),
    });

    Ok(cropped.to_owned())
}

fn check_range(min_val: f32, max_val: f32) -> Result<()> {
    if min_val < max_val {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "value range requires min < max, got [{min_val}, {max_val}]"
        )))
    }
}

/// Linearly maps `[min_val, max_val]` onto `[0, 1]`, clamping values outside
/// the input range.
pub fn scale_values<D: Dimension>(
    array: ArrayView<'_, f32, D>,
    min_val: f32,
    max_val: f32,
) -> Result<Array<f32, D>> {
    check_range(min_val, max_val)?;
    let span = max_val - min_val;
    Ok(array.mapv(|v| ((v - min_val) / span).clamp(0.0, 1.0)))
}

/// Inverse of [`scale_values`] for values already in `[0, 1]`.
pub fn unscale_values<D: Dimension>(
    array: ArrayView<'_, f32, D>,
    min_val: f32,
    max_val: f32,
) -> Result<Array<f32, D>> {
    check_range(min_val, max_val)?;
    let span = max_val - min_val;
    Ok(array.mapv(|v| min_val + v * span))
}
