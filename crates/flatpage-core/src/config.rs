// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{FlatpageError, Result};

/// Which corner-location strategy the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// Pixel-level edge/contour pipeline, no external service.
    #[default]
    Classical,
    /// External vision model returning corners directly.
    Oracle,
}

/// Edge-map tuning for the classical locator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Hysteresis low threshold on Sobel magnitude.
    pub canny_low: f32,
    /// Hysteresis high threshold on Sobel magnitude.
    pub canny_high: f32,
    /// 3x3 max-filter passes applied to the edge map.
    pub dilate_iterations: u32,
    /// Components with fewer boundary pixels are discarded as noise.
    pub min_contour_points: usize,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_iterations: 2,
            min_contour_points: 30,
        }
    }
}

impl EdgeConfig {
    /// Threshold ordering and the dilation range. Shared by pipeline
    /// validation and classical locator initialisation.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.canny_low >= 0.0 && self.canny_low <= self.canny_high) {
            return Err(format!(
                "canny thresholds must satisfy 0 <= low <= high (got {} / {})",
                self.canny_low, self.canny_high
            ));
        }
        if self.dilate_iterations > u32::from(u8::MAX) {
            return Err(format!(
                "dilate_iterations must be at most {}, got {}",
                u8::MAX,
                self.dilate_iterations
            ));
        }
        Ok(())
    }
}

/// Quadrilateral acceptance rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    /// Minimum quad area as a fraction of the image area.
    pub min_area_ratio: f64,
    /// Douglas-Peucker epsilon as a fraction of the hull perimeter.
    pub epsilon_ratio: f64,
    /// Cross products at or below this magnitude are treated as collinear.
    pub convexity_tolerance: f64,
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            min_area_ratio: 0.10,
            epsilon_ratio: 0.02,
            convexity_tolerance: 1.0,
        }
    }
}

impl AcceptanceConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.min_area_ratio > 0.0 && self.min_area_ratio < 1.0) {
            return Err(format!(
                "min_area_ratio must be in (0, 1), got {}",
                self.min_area_ratio
            ));
        }
        if !(self.epsilon_ratio > 0.0) {
            return Err(format!(
                "epsilon_ratio must be positive, got {}",
                self.epsilon_ratio
            ));
        }
        Ok(())
    }
}

/// Vision oracle endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    /// Upper bound on one oracle round trip. Expiry counts as "not found".
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llava".into(),
            timeout_secs: 60,
        }
    }
}

/// Post-rectification enhancement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    pub enabled: bool,
    /// Contrast factor; 1.0 is a no-op.
    pub contrast: f32,
    pub sharpen: bool,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            contrast: 1.2,
            sharpen: true,
        }
    }
}

/// Complete pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub locator: LocatorStrategy,
    pub edges: EdgeConfig,
    pub acceptance: AcceptanceConfig,
    /// Floor for each rectified output dimension.
    pub min_output_dimension: u32,
    /// Longest side after decoding; larger inputs are downscaled. 0 disables.
    pub max_input_dimension: u32,
    pub oracle: OracleConfig,
    pub enhance: EnhanceConfig,
}

impl PipelineConfig {
    /// Load settings from a JSON file. Missing fields take their defaults.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!(locator = ?config.locator, "Pipeline configuration loaded");
        Ok(config)
    }

    /// Write settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), raw)?;
        Ok(())
    }

    /// Reject settings that would make a stage meaningless.
    pub fn validate(&self) -> Result<()> {
        self.edges.validate().map_err(FlatpageError::Config)?;
        self.acceptance.validate().map_err(FlatpageError::Config)?;
        if self.min_output_dimension == 0 {
            return Err(FlatpageError::Config(
                "min_output_dimension must be at least 1".into(),
            ));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(FlatpageError::Config("oracle timeout must be non-zero".into()));
        }
        if !(self.enhance.contrast > 0.0) {
            return Err(FlatpageError::Config(format!(
                "contrast factor must be positive, got {}",
                self.enhance.contrast
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            locator: LocatorStrategy::default(),
            edges: EdgeConfig::default(),
            acceptance: AcceptanceConfig::default(),
            min_output_dimension: 200,
            max_input_dimension: 2000,
            oracle: OracleConfig::default(),
            enhance: EnhanceConfig::default(),
        }
    }
}
