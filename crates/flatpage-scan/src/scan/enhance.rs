// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement — contrast boosting and sharpening applied to a rectified
// page before it is re-encoded.

use flatpage_core::RasterBuffer;
use flatpage_core::config::EnhanceConfig;
use flatpage_core::error::Result;
use image::DynamicImage;
use imageproc::filter::sharpen3x3;
use tracing::{debug, info, instrument};

use crate::raster::codec;

/// Chainable enhancement operations over one page image.
///
/// Channel layout is preserved: a gray page stays gray and alpha is never
/// touched.
pub struct ScanEnhancer {
    /// The working image (kept as `DynamicImage` for the imageproc filters).
    image: DynamicImage,
}

impl ScanEnhancer {
    // -- Construction ---------------------------------------------------------

    pub fn from_raster(raster: &RasterBuffer) -> Result<Self> {
        Ok(Self {
            image: codec::to_dynamic(raster)?,
        })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_raster(self) -> Result<RasterBuffer> {
        codec::from_dynamic(self.image)
    }

    // -- Operations -----------------------------------------------------------

    /// Scale each colour channel away from mid-gray by `factor`.
    ///
    /// `factor > 1.0` increases contrast, `< 1.0` flattens it.
    #[instrument(skip(self))]
    pub fn adjust_contrast(mut self, factor: f32) -> Self {
        let adjust = |channel: &mut u8| {
            let val = factor * (*channel as f32 - 128.0) + 128.0;
            *channel = val.clamp(0.0, 255.0) as u8;
        };

        match &mut self.image {
            DynamicImage::ImageLuma8(img) => img.pixels_mut().for_each(|p| adjust(&mut p.0[0])),
            DynamicImage::ImageRgb8(img) => {
                img.pixels_mut().for_each(|p| p.0.iter_mut().for_each(adjust))
            }
            DynamicImage::ImageRgba8(img) => {
                img.pixels_mut().for_each(|p| p.0[..3].iter_mut().for_each(adjust))
            }
            other => {
                let mut rgba = other.to_rgba8();
                rgba.pixels_mut().for_each(|p| p.0[..3].iter_mut().for_each(adjust));
                *other = DynamicImage::ImageRgba8(rgba);
            }
        }
        debug!(factor, "Contrast adjusted");
        self
    }

    /// Sharpen text edges: a 3x3 sharpen kernel on gray pages, an unsharp
    /// mask on colour pages.
    #[instrument(skip(self))]
    pub fn sharpen(self) -> Self {
        let image = match self.image {
            DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(sharpen3x3(&gray)),
            other => other.unsharpen(1.0, 2),
        };
        debug!("Sharpened");
        Self { image }
    }

    /// Run the configured steps in order: contrast, then sharpen.
    #[instrument(skip_all, fields(enabled = config.enabled))]
    pub fn apply(self, config: &EnhanceConfig) -> Self {
        if !config.enabled {
            return self;
        }
        info!(contrast = config.contrast, sharpen = config.sharpen, "Enhancing page");

        let mut enhanced = self;
        if config.contrast != 1.0 {
            enhanced = enhanced.adjust_contrast(config.contrast);
        }
        if config.sharpen {
            enhanced = enhanced.sharpen();
        }
        enhanced
    }
}

// -- Tests --------------------------------------------------------------------
