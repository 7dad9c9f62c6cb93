//! Thumbnail descriptor: the image downscaled to a few pixels per side.
//!
//! Distances between thumbnails in L*a*b* space roughly follow perceived color
//! differences, which makes this a cheap global scene descriptor.

use crate::config::Configuration;
use crate::error::{FeatError, Result};
use crate::generator::{Generator, OutputSpec};
use crate::record::Record;
use crate::value::{Value, ValueKind};

use super::{area_resample, require_rgb};

const MAX_SIDE: usize = 1024;

/// Output colorspace of [`TinyImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colorspace {
    /// CIE L*a*b* (D65), L in `[0, 100]`.
    Lab,
    /// sRGB in `[0, 1]`.
    Rgb,
    /// Luma in `[0, 1]`, one value per pixel.
    Grey,
}

impl Colorspace {
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "lab" => Some(Self::Lab),
            "rgb" => Some(Self::Rgb),
            "grey" => Some(Self::Grey),
            _ => None,
        }
    }

    fn channels(&self) -> usize {
        match self {
            Self::Grey => 1,
            Self::Lab | Self::Rgb => 3,
        }
    }
}

/// Downscaled image in a configurable colorspace.
///
/// Parameters: `params.width` (16), `params.height` (16), `params.colorspace`
/// (`lab` | `rgb` | `grey`, default `lab`). Output: `features`, `f32s`.
#[derive(Debug, Clone)]
pub struct TinyImage {
    parameters: Configuration,
    outputs: Vec<OutputSpec>,
    width: usize,
    height: usize,
    colorspace: Colorspace,
    scratch: Vec<f32>,
}

impl TinyImage {
    /// Registry name.
    pub const NAME: &'static str = "tiny_image";
    /// Output field.
    pub const OUTPUT: &'static str = "features";

    /// Configured width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Configured height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Configured colorspace.
    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }
}

impl Default for TinyImage {
    fn default() -> Self {
        Self {
            parameters: Configuration::new(),
            outputs: vec![OutputSpec::new(Self::OUTPUT, ValueKind::F32s)],
            width: 16,
            height: 16,
            colorspace: Colorspace::Lab,
            scratch: Vec::new(),
        }
    }
}

fn side(config: &mut Configuration, path: &str) -> Result<usize> {
    let value = config.get_or(path, 16usize)?;
    if value == 0 || value > MAX_SIDE {
        return Err(FeatError::config(format!(
            "{path} must be in 1..={MAX_SIDE}, got {value}"
        )));
    }
    Ok(value)
}

impl Generator for TinyImage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, mut config: Configuration) -> Result<()> {
        self.width = side(&mut config, "params.width")?;
        self.height = side(&mut config, "params.height")?;

        let tag: String = config.get_or("params.colorspace", "lab".to_owned())?;
        self.colorspace = Colorspace::parse(&tag).ok_or_else(|| {
            FeatError::config(format!(
                "params.colorspace must be one of lab, rgb, grey; got {tag:?}"
            ))
        })?;

        self.parameters = config;
        Ok(())
    }

    fn parameters(&self) -> &Configuration {
        &self.parameters
    }

    fn outputs(&self) -> &[OutputSpec] {
        &self.outputs
    }

    fn compute(&mut self, record: &mut Record) -> Result<()> {
        let raster = require_rgb(record)?;
        area_resample(raster, self.width, self.height, &mut self.scratch);

        let mut features = Vec::with_capacity(self.width * self.height * self.colorspace.channels());
        for px in self.scratch.chunks_exact(3) {
            let (r, g, b) = (px[0], px[1], px[2]);
            match self.colorspace {
                Colorspace::Rgb => features.extend_from_slice(px),
                Colorspace::Grey => features.push(0.299 * r + 0.587 * g + 0.114 * b),
                Colorspace::Lab => features.extend_from_slice(&srgb_to_lab(r, g, b)),
            }
        }

        record.insert(Self::OUTPUT, Value::F32s(features));
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}

// --- COLOR CONVERSION ---

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// sRGB in `[0, 1]` to CIE L*a*b* with a D65 white point.
fn srgb_to_lab(r: f32, g: f32, b: f32) -> [f32; 3] {
    const WHITE: [f32; 3] = [0.950_47, 1.0, 1.088_83];

    let (r, g, b) = (srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));
    let x = 0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b;
    let y = 0.212_672_9 * r + 0.715_152_2 * g + 0.072_175 * b;
    let z = 0.019_333_9 * r + 0.119_192 * g + 0.950_304_1 * b;

    let fx = lab_f(x / WHITE[0]);
    let fy = lab_f(y / WHITE[1]);
    let fz = lab_f(z / WHITE[2]);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_and_black_hit_lab_extremes() {
        let white = srgb_to_lab(1.0, 1.0, 1.0);
        assert!((white[0] - 100.0).abs() < 0.01);
        assert!(white[1].abs() < 0.01 && white[2].abs() < 0.01);

        let black = srgb_to_lab(0.0, 0.0, 0.0);
        assert!(black[0].abs() < 0.01);
    }

    #[test]
    fn pure_red_has_positive_a() {
        let red = srgb_to_lab(1.0, 0.0, 0.0);
        assert!((red[0] - 53.24).abs() < 0.1);
        assert!(red[1] > 75.0);
    }
}
