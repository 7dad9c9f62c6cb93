//! Built-in generators.
//!
//! Both operate on an 8-bit RGB [`Raster`] stored in the record field
//! [`IMAGE_FIELD`]; decoding files into rasters is the data source's job.

mod color_histogram;
mod tiny_image;

pub use color_histogram::ColorHistogram;
pub use tiny_image::{Colorspace, TinyImage};

use crate::error::Result;
use crate::record::Record;
use crate::value::Raster;

/// Record field holding the decoded input image.
pub const IMAGE_FIELD: &str = "image";

/// Fetches the input raster and checks it is a non-empty 3-channel image.
pub(crate) fn require_rgb(record: &Record) -> Result<&Raster> {
    let raster = record.require_raster(IMAGE_FIELD)?;
    if raster.channels != 3 {
        return Err(record.failure(format!(
            "expected a 3-channel image, got {} channels",
            raster.channels
        )));
    }
    if raster.width == 0 || raster.height == 0 {
        return Err(record.failure("image has zero area"));
    }
    Ok(raster)
}

/// Area-average resampling of an RGB raster to `width` x `height`.
///
/// Each output pixel is the coverage-weighted mean of the source pixels under its
/// footprint, scaled to `[0, 1]`. Writes `width * height * 3` values into `out`.
pub(crate) fn area_resample(src: &Raster, width: usize, height: usize, out: &mut Vec<f32>) {
    out.clear();
    out.reserve(width * height * 3);

    let sx = src.width as f32 / width as f32;
    let sy = src.height as f32 / height as f32;

    for ty in 0..height {
        let y0 = ty as f32 * sy;
        let y1 = y0 + sy;
        let rows = (y0.floor() as usize)..(y1.ceil() as usize).min(src.height);

        for tx in 0..width {
            let x0 = tx as f32 * sx;
            let x1 = x0 + sx;
            let cols = (x0.floor() as usize)..(x1.ceil() as usize).min(src.width);

            let mut acc = [0f32; 3];
            let mut total = 0f32;
            for y in rows.clone() {
                let wy = y1.min((y + 1) as f32) - y0.max(y as f32);
                if wy <= 0.0 {
                    continue;
                }
                for x in cols.clone() {
                    let wx = x1.min((x + 1) as f32) - x0.max(x as f32);
                    if wx <= 0.0 {
                        continue;
                    }
                    let w = wx * wy;
                    for (a, p) in acc.iter_mut().zip(src.pixel(x, y).unwrap_or_default()) {
                        *a += f32::from(*p) * w;
                    }
                    total += w;
                }
            }

            let norm = if total > 0.0 { 1.0 / (total * 255.0) } else { 0.0 };
            out.extend(acc.iter().map(|v| v * norm));
        }
    }
}
