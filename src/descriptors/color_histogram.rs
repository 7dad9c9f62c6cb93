//! Joint RGB histogram and mean color.

use crate::config::Configuration;
use crate::error::{FeatError, Result};
use crate::generator::{Generator, OutputSpec};
use crate::record::Record;
use crate::value::{Value, ValueKind};

use super::require_rgb;

/// Normalized `bins^3` RGB histogram plus the mean color.
///
/// Parameters: `params.bins` (8, range 1..=64).
/// Outputs: `histogram` (`f32s`, sums to 1) and `mean_color` (`f32s`, 3 values in `[0, 1]`).
#[derive(Debug, Clone)]
pub struct ColorHistogram {
    parameters: Configuration,
    outputs: Vec<OutputSpec>,
    bins: usize,
    counts: Vec<u32>,
}

impl ColorHistogram {
    /// Registry name.
    pub const NAME: &'static str = "color_histogram";
    /// Histogram output field.
    pub const HISTOGRAM: &'static str = "histogram";
    /// Mean color output field.
    pub const MEAN_COLOR: &'static str = "mean_color";

    /// Configured bins per channel.
    pub fn bins(&self) -> usize {
        self.bins
    }
}

impl Default for ColorHistogram {
    fn default() -> Self {
        Self {
            parameters: Configuration::new(),
            outputs: vec![
                OutputSpec::new(Self::HISTOGRAM, ValueKind::F32s),
                OutputSpec::new(Self::MEAN_COLOR, ValueKind::F32s),
            ],
            bins: 8,
            counts: Vec::new(),
        }
    }
}

impl Generator for ColorHistogram {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, mut config: Configuration) -> Result<()> {
        let bins = config.get_or("params.bins", 8usize)?;
        if !(1..=64).contains(&bins) {
            return Err(FeatError::config(format!(
                "params.bins must be in 1..=64, got {bins}"
            )));
        }
        self.bins = bins;
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
        let bins = self.bins;

        self.counts.clear();
        self.counts.resize(bins * bins * bins, 0);
        let mut sums = [0u64; 3];

        for px in raster.data.chunks_exact(3) {
            let bin = |v: u8| usize::from(v) * bins / 256;
            let slot = (bin(px[0]) * bins + bin(px[1])) * bins + bin(px[2]);
            self.counts[slot] += 1;
            for (sum, v) in sums.iter_mut().zip(px) {
                *sum += u64::from(*v);
            }
        }

        let pixels = (raster.width * raster.height) as f64;
        let histogram = self
            .counts
            .iter()
            .map(|c| (f64::from(*c) / pixels) as f32)
            .collect();
        let mean_color = sums
            .iter()
            .map(|s| (*s as f64 / pixels / 255.0) as f32)
            .collect();

        record.insert(Self::HISTOGRAM, Value::F32s(histogram));
        record.insert(Self::MEAN_COLOR, Value::F32s(mean_color));
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Generator> {
        Box::new(self.clone())
    }
}
