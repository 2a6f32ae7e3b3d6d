// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner location — strategies that find the four corners of a document page
// in a raster image.
//
// The classical locator works from pixels alone. The oracle locator asks an
// external vision service; its HTTP transport is only available when the
// `ollama` feature is enabled:
//
// ```toml
// flatpage-scan = { path = "crates/flatpage-scan", features = ["ollama"] }
// ```

pub mod classical;
pub mod contours;
pub mod edges;
pub mod oracle;

#[cfg(feature = "ollama")]
pub mod ollama;

use flatpage_core::error::Result;
use flatpage_core::{Quadrilateral, RasterBuffer};

pub use classical::ClassicalEdgeLocator;
pub use oracle::{CornerOracle, OracleCornerLocator};

#[cfg(feature = "ollama")]
pub use ollama::OllamaCornerOracle;

/// A strategy for finding the document quadrilateral in an image.
///
/// `locate` never fails: anything that prevents a confident answer is
/// reported as `None` and the caller passes the image through unchanged.
pub trait CornerLocator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// One-time readiness check. Safe to call repeatedly; only the first call
    /// does any work.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Corners in canonical order, or `None` when no document is found.
    fn locate(&self, image: &RasterBuffer) -> Option<Quadrilateral>;
}
