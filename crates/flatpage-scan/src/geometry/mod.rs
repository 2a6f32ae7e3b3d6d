// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry engine — homography estimation, output sizing, and the polygon
// algorithms used by corner location.

pub mod homography;
pub mod polygon;

pub use homography::{Homography, compute_homography, estimate_output_dimensions};
