// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document pipeline — locate the page, rectify it, or pass the image through
// unchanged when no usable page is found.

use std::sync::Arc;

use flatpage_core::error::{FlatpageError, Result};
use flatpage_core::{LocatorStrategy, PipelineConfig, Quadrilateral, RasterBuffer};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::locate::{ClassicalEdgeLocator, CornerLocator, CornerOracle, OracleCornerLocator};
use crate::rectify::Rectifier;

/// What the pipeline did with one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The page was found and warped upright.
    Rectified { quad: Quadrilateral },
    /// The input is returned untouched.
    PassThrough { reason: String },
}

/// Result of one pipeline run. `image` is either the rectified page or the
/// original input.
#[derive(Debug)]
pub struct PipelineOutput {
    pub image: RasterBuffer,
    pub outcome: Outcome,
}

impl PipelineOutput {
    /// Chosen output size, for downstream re-encoding.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_rectified(&self) -> bool {
        matches!(self.outcome, Outcome::Rectified { .. })
    }
}

/// One locator strategy followed by the rectifier. There is no retry and no
/// fallback to a second strategy.
pub struct DocumentPipeline {
    locator: Box<dyn CornerLocator>,
    rectifier: Rectifier,
}

impl DocumentPipeline {
    pub fn new(locator: Box<dyn CornerLocator>, rectifier: Rectifier) -> Self {
        Self { locator, rectifier }
    }

    /// Build the pipeline selected by `config.locator`.
    ///
    /// The oracle strategy needs a transport; without one this fails with
    /// [`FlatpageError::OracleUnavailable`].
    pub fn from_config(
        config: &PipelineConfig,
        oracle: Option<Arc<dyn CornerOracle>>,
    ) -> Result<Self> {
        let locator: Box<dyn CornerLocator> = match config.locator {
            LocatorStrategy::Classical => Box::new(ClassicalEdgeLocator::from_config(config)),
            LocatorStrategy::Oracle => {
                let oracle = oracle.ok_or(FlatpageError::OracleUnavailable)?;
                Box::new(OracleCornerLocator::new(oracle))
            }
        };
        Ok(Self::new(
            locator,
            Rectifier::new(config.min_output_dimension),
        ))
    }

    pub fn locator_name(&self) -> &'static str {
        self.locator.name()
    }

    /// Prepare the locator. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        self.locator.initialize()
    }

    /// Locate the page and check the corners lie inside the image.
    #[instrument(skip_all, fields(locator = self.locator.name()))]
    pub fn detect(&self, image: &RasterBuffer) -> Option<Quadrilateral> {
        let quad = self.locator.locate(image)?;
        if !quad.within_bounds(image.width(), image.height()) {
            warn!(corners = ?quad.corners(), "Located corners fall outside the image");
            return None;
        }
        Some(quad)
    }

    /// Rectify one image, or hand it back unchanged.
    #[instrument(skip_all, fields(
        locator = self.locator.name(),
        width = image.width(),
        height = image.height()
    ))]
    pub fn process(&self, image: RasterBuffer) -> PipelineOutput {
        let Some(quad) = self.detect(&image) else {
            info!("No document found; passing image through");
            return PipelineOutput {
                image,
                outcome: Outcome::PassThrough {
                    reason: "no document found".into(),
                },
            };
        };

        match self.rectifier.rectify(&image, &quad) {
            Ok(rectified) => {
                info!(
                    out_w = rectified.width(),
                    out_h = rectified.height(),
                    "Document rectified"
                );
                PipelineOutput {
                    image: rectified,
                    outcome: Outcome::Rectified { quad },
                }
            }
            Err(err) => {
                warn!(error = %err, "Rectification refused; passing image through");
                PipelineOutput {
                    image,
                    outcome: Outcome::PassThrough {
                        reason: err.to_string(),
                    },
                }
            }
        }
    }

    /// Process images one at a time, handing each output to `sink` before
    /// the next input is pulled.
    ///
    /// Stops at the first input or sink error. Returns how many images were
    /// processed.
    pub fn process_batch<I, F>(&self, inputs: I, mut sink: F) -> Result<usize>
    where
        I: IntoIterator<Item = Result<RasterBuffer>>,
        F: FnMut(usize, PipelineOutput) -> Result<()>,
    {
        let mut count = 0;
        for (index, input) in inputs.into_iter().enumerate() {
            let output = self.process(input?);
            debug!(index, rectified = output.is_rectified(), "Batch item done");
            sink(index, output)?;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatpage_core::Point;
    use image::{GrayImage, Luma};
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point as PixelPoint;

    /// Light page rotated by `degrees` about the image centre on a dark
    /// background.
    fn rotated_page(
        width: u32,
        height: u32,
        page_w: f64,
        page_h: f64,
        degrees: f64,
    ) -> RasterBuffer {
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        let (sin, cos) = degrees.to_radians().sin_cos();
        let poly: Vec<PixelPoint<i32>> = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .iter()
            .map(|&(sx, sy)| {
                let (dx, dy) = (sx * page_w / 2.0, sy * page_h / 2.0);
                PixelPoint::new(
                    (cx + dx * cos - dy * sin).round() as i32,
                    (cy + dx * sin + dy * cos).round() as i32,
                )
            })
            .collect();

        let mut img = GrayImage::from_pixel(width, height, Luma([35u8]));
        draw_polygon_mut(&mut img, &poly, Luma([225u8]));
        RasterBuffer::new(width, height, 1, img.into_raw()).expect("raster")
    }

    struct FixedOracle(&'static str);

    impl CornerOracle for FixedOracle {
        fn ask(&self, _prompt: &str, _image_png: &[u8]) -> Result<String> {
            Ok(self.0.into())
        }
    }

    fn oracle_config() -> PipelineConfig {
        PipelineConfig {
            locator: LocatorStrategy::Oracle,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn blank_image_passes_through_unchanged() {
        let pipeline = DocumentPipeline::from_config(&PipelineConfig::default(), None)
            .expect("classical pipeline");
        let image = RasterBuffer::filled(320, 240, 3, 180).expect("raster");
        let output = pipeline.process(image.clone());

        assert!(!output.is_rectified());
        assert_eq!(output.image, image);
        assert_eq!(output.dimensions(), (320, 240));
    }

    #[test]
    fn rotated_a4_page_keeps_its_aspect_ratio() {
        let image = rotated_page(3000, 4000, 1800.0, 1800.0 * 1.4142, 12.0);
        let pipeline = DocumentPipeline::from_config(&PipelineConfig::default(), None)
            .expect("classical pipeline");
        pipeline.initialize().expect("initialize");

        let output = pipeline.process(image);
        assert!(output.is_rectified(), "{:?}", output.outcome);

        let (w, h) = output.dimensions();
        let ratio = w as f64 / h as f64;
        let expected = 1.0 / 1.4142;
        assert!(
            (ratio - expected).abs() / expected < 0.05,
            "aspect {ratio} for {w}x{h}"
        );
    }

    #[test]
    fn oracle_strategy_requires_a_transport() {
        assert!(matches!(
            DocumentPipeline::from_config(&oracle_config(), None),
            Err(FlatpageError::OracleUnavailable)
        ));
    }

    #[test]
    fn out_of_bounds_oracle_answer_passes_through() {
        let oracle: Arc<dyn CornerOracle> = Arc::new(FixedOracle(
            r#"{"corners": [[-5, 0], [300, 0], [300, 200], [0, 200]]}"#,
        ));
        let pipeline = DocumentPipeline::from_config(&oracle_config(), Some(oracle))
            .expect("oracle pipeline");
        assert_eq!(pipeline.locator_name(), "oracle");

        let image = RasterBuffer::filled(320, 240, 1, 90).expect("raster");
        let output = pipeline.process(image.clone());
        assert!(!output.is_rectified());
        assert_eq!(output.image, image);
    }

    #[test]
    fn oracle_answer_is_rectified() {
        let oracle: Arc<dyn CornerOracle> = Arc::new(FixedOracle(
            r#"{"top_left": [20, 10], "top_right": [300, 15],
                "bottom_right": [310, 230], "bottom_left": [10, 225]}"#,
        ));
        let pipeline = DocumentPipeline::from_config(&oracle_config(), Some(oracle))
            .expect("oracle pipeline");
        let image = RasterBuffer::filled(320, 240, 3, 90).expect("raster");
        let output = pipeline.process(image);

        let Outcome::Rectified { quad } = &output.outcome else {
            panic!("expected rectification, got {:?}", output.outcome);
        };
        assert_eq!(quad.top_left, Point::new(20.0, 10.0));
        assert_eq!(output.image.channels(), 3);
    }

    #[test]
    fn degenerate_quad_passes_through_with_reason() {
        struct Collapsed;
        impl CornerLocator for Collapsed {
            fn name(&self) -> &'static str {
                "collapsed"
            }
            fn locate(&self, _image: &RasterBuffer) -> Option<Quadrilateral> {
                let p = Point::new(10.0, 10.0);
                Some(Quadrilateral::new([p, p, p, p]))
            }
        }

        let pipeline = DocumentPipeline::new(Box::new(Collapsed), Rectifier::default());
        let image = RasterBuffer::filled(64, 64, 1, 5).expect("raster");
        let output = pipeline.process(image.clone());
        assert_eq!(output.image, image);
        assert!(matches!(output.outcome, Outcome::PassThrough { ref reason } if reason.contains("degenerate")));
    }

    #[test]
    fn batch_is_processed_in_order() {
        let pipeline = DocumentPipeline::from_config(&PipelineConfig::default(), None)
            .expect("classical pipeline");
        let inputs = (1..=3u8).map(|v| RasterBuffer::filled(40, 30, 1, v * 10));

        let mut seen = Vec::new();
        let count = pipeline
            .process_batch(inputs, |index, output| {
                seen.push((index, output.image.pixel(0, 0)[0]));
                Ok(())
            })
            .expect("batch");
        assert_eq!(count, 3);
        assert_eq!(seen, vec![(0, 10), (1, 20), (2, 30)]);
    }

    #[test]
    fn batch_stops_at_sink_error() {
        let pipeline = DocumentPipeline::from_config(&PipelineConfig::default(), None)
            .expect("classical pipeline");
        let inputs = (0..5).map(|_| RasterBuffer::filled(20, 20, 1, 0));
        let result = pipeline.process_batch(inputs, |index, _| {
            if index == 1 {
                Err(FlatpageError::Config("disk full".into()))
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
    }
}
