use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::OverflowPolicy;
use crate::error::ShapeError;
use crate::eval::LossWeights;
use crate::fit::FitParams;
use crate::frame::DecodeParams;
use crate::sample::SampleCounts;
use crate::spline::SplineParams;

/// All pipeline parameters in one struct.
/// Loadable from JSON (missing fields take their defaults) and
/// adjustable from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // -- Bitmap stage --
    /// Threshold method for converting masks to binary.
    pub threshold: ThresholdMethod,

    // -- Contour stage --
    /// Polygon simplification tolerance as a fraction of the contour perimeter.
    /// 0 = keep every contour point.
    pub epsilon_ratio: f64,

    // -- Curve fitting --
    pub fit: FitParams,

    // -- Encoding --
    /// Fixed number of rows in every segment table.
    pub max_segments: usize,
    /// What to do when a shape needs more than `max_segments` segments.
    pub overflow: OverflowPolicy,

    // -- Context points --
    pub sampling: SampleCounts,

    // -- Spline resampling --
    pub spline: SplineParams,

    // -- Prediction decoding and evaluation --
    pub decode: DecodeParams,
    pub loss: LossWeights,
}

/// Threshold method for converting a grayscale mask to binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Pixels brighter than this value (0-255) are foreground.
    Fixed(u8),
    /// Otsu's method (automatic).
    Otsu,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdMethod::Fixed(127),
            epsilon_ratio: 0.01,
            fit: FitParams::default(),
            max_segments: 30,
            overflow: OverflowPolicy::Truncate,
            sampling: SampleCounts::default(),
            spline: SplineParams::default(),
            decode: DecodeParams::default(),
            loss: LossWeights::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ShapeError> {
        let text = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.max_segments == 0 {
            return Err(ShapeError::Config("max_segments must be positive".into()));
        }
        if !(self.epsilon_ratio >= 0.0) {
            return Err(ShapeError::Config(format!(
                "epsilon_ratio must be non-negative, got {}",
                self.epsilon_ratio
            )));
        }
        if self.fit.threshold_complex < 1.0 {
            return Err(ShapeError::Config(format!(
                "threshold_complex is an arc/chord ratio and must be >= 1, got {}",
                self.fit.threshold_complex
            )));
        }
        if self.sampling.boundary > self.sampling.total {
            return Err(ShapeError::Config(format!(
                "boundary count {} exceeds total count {}",
                self.sampling.boundary, self.sampling.total
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "max_segments": 12, "threshold": "otsu" }"#).unwrap();
        assert_eq!(config.max_segments, 12);
        assert_eq!(config.threshold, ThresholdMethod::Otsu);
        assert_eq!(config.epsilon_ratio, 0.01);
        assert_eq!(config.fit.threshold_dev, 0.5);
    }

    #[test]
    fn fixed_threshold_parses() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "threshold": { "fixed": 200 } }"#).unwrap();
        assert_eq!(config.threshold, ThresholdMethod::Fixed(200));
    }

    #[test]
    fn validate_rejects_oversized_boundary() {
        let mut config = PipelineConfig::default();
        config.sampling.boundary = config.sampling.total + 1;
        assert!(config.validate().is_err());
    }
}
