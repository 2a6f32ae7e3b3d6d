// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for flatpage.

use thiserror::Error;

/// Top-level error type for all flatpage operations.
///
/// A document that cannot be located is not an error: locators report it as
/// `None` and the pipeline passes the image through.
#[derive(Debug, Error)]
pub enum FlatpageError {
    // -- Raster / codec errors --
    #[error("invalid raster buffer: {0}")]
    InvalidRaster(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Geometry --
    #[error("degenerate homography: {reason}")]
    DegenerateHomography { reason: String },

    #[error("quadrilateral corners fall outside the {width}x{height} image")]
    QuadOutOfBounds { width: u32, height: u32 },

    // -- Vision oracle --
    #[error("corner oracle request failed: {0}")]
    Oracle(String),

    #[error("corner oracle timed out after {0}s")]
    OracleTimeout(u64),

    #[error("corner oracle is not available in this build")]
    OracleUnavailable,

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FlatpageError>;
