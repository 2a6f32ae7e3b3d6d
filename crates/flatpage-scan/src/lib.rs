// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatpage-scan — Document corner detection and perspective rectification.
//
// Provides two corner locators (a classical edge/contour pipeline and an
// external vision oracle), the homography solver, the inverse-mapped
// bilinear rectifier, and the pipeline that ties them together with a
// pass-through fallback. Codec and enhancement helpers sit at the edges.

pub mod geometry;
pub mod locate;
pub mod raster;
pub mod rectify;
pub mod scan;

// Re-export the primary types so callers can use `flatpage_scan::DocumentPipeline` etc.
pub use geometry::{Homography, compute_homography, estimate_output_dimensions};
pub use locate::{ClassicalEdgeLocator, CornerLocator, CornerOracle, OracleCornerLocator};
pub use rectify::Rectifier;
pub use scan::{DocumentPipeline, Outcome, PipelineOutput, ScanEnhancer};

#[cfg(feature = "ollama")]
pub use locate::OllamaCornerOracle;
