// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectification — inverse-mapped bilinear warp of a located
// document quadrilateral onto an upright rectangle.

use flatpage_core::error::{FlatpageError, Result};
use flatpage_core::{Point, Quadrilateral, RasterBuffer};
use tracing::{debug, info, instrument};

use crate::geometry::homography::{DIVISOR_EPSILON, compute_homography, estimate_output_dimensions};

/// Fill value for destination pixels with no valid source sample.
pub const BACKGROUND: u8 = 255;

/// Source coordinates this close to a lattice line are snapped onto it, so an
/// exact-fit warp does not lose its last row and column to rounding noise.
const LATTICE_SNAP: f64 = 1e-6;

/// Warps a located quadrilateral to an upright rectangle.
#[derive(Debug, Clone)]
pub struct Rectifier {
    min_output_dimension: u32,
}

impl Rectifier {
    pub fn new(min_output_dimension: u32) -> Self {
        Self {
            min_output_dimension: min_output_dimension.max(1),
        }
    }

    /// Produce a new buffer holding the rectified document.
    ///
    /// The homography maps the output rectangle onto `quad` so every output
    /// pixel samples exactly one source position. Pixels whose source falls
    /// outside the image, or whose divisor vanishes, keep the white
    /// background. Fails with [`FlatpageError::QuadOutOfBounds`] when a corner
    /// lies outside `[0, width] x [0, height]`, and with
    /// [`FlatpageError::DegenerateHomography`] when the quadrilateral cannot
    /// define a projective map.
    #[instrument(skip_all, fields(
        src_w = image.width(),
        src_h = image.height(),
        channels = image.channels()
    ))]
    pub fn rectify(&self, image: &RasterBuffer, quad: &Quadrilateral) -> Result<RasterBuffer> {
        check_quad(image, quad)?;
        let (out_w, out_h) = estimate_output_dimensions(quad, self.min_output_dimension);
        let (fw, fh) = (out_w as f64, out_h as f64);
        let rect = [
            Point::new(0.0, 0.0),
            Point::new(fw, 0.0),
            Point::new(fw, fh),
            Point::new(0.0, fh),
        ];
        let corners = quad.corners();

        let homography = compute_homography(&rect, &corners);
        homography.validate(&rect, &corners)?;
        debug!(out_w, out_h, matrix = ?homography.matrix(), "Output homography ready");

        let channels = image.channels() as usize;
        let (src_w, src_h) = (image.width() as i64, image.height() as i64);
        let src = image.pixels();
        let src_stride = src_w as usize * channels;

        let mut out = RasterBuffer::filled(out_w, out_h, image.channels(), BACKGROUND)?;
        let out_stride = out_w as usize * channels;
        let dst = out.pixels_mut();
        let mut background = 0usize;

        for dy in 0..out_h {
            for dx in 0..out_w {
                let (hx, hy, w) = homography.apply_homogeneous(Point::new(dx as f64, dy as f64));
                if w.abs() < DIVISOR_EPSILON {
                    background += 1;
                    continue;
                }
                let sx = snap(hx / w);
                let sy = snap(hy / w);
                if !(sx.is_finite() && sy.is_finite()) {
                    background += 1;
                    continue;
                }

                let (x0, y0) = (sx.floor(), sy.floor());
                let (fx, fy) = (sx - x0, sy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let x1 = if fx > 0.0 { x0 + 1 } else { x0 };
                let y1 = if fy > 0.0 { y0 + 1 } else { y0 };
                if x0 < 0 || y0 < 0 || x1 >= src_w || y1 >= src_h {
                    background += 1;
                    continue;
                }

                let at = |x: i64, y: i64| y as usize * src_stride + x as usize * channels;
                let (p00, p10, p01, p11) = (at(x0, y0), at(x1, y0), at(x0, y1), at(x1, y1));
                let weights = [
                    (1.0 - fx) * (1.0 - fy),
                    fx * (1.0 - fy),
                    (1.0 - fx) * fy,
                    fx * fy,
                ];

                let o = dy as usize * out_stride + dx as usize * channels;
                for c in 0..channels {
                    let v = weights[0] * src[p00 + c] as f64
                        + weights[1] * src[p10 + c] as f64
                        + weights[2] * src[p01 + c] as f64
                        + weights[3] * src[p11 + c] as f64;
                    dst[o + c] = v.round().clamp(0.0, 255.0) as u8;
                }
            }
        }

        info!(out_w, out_h, background, "Perspective rectification applied");
        Ok(out)
    }
}

impl Default for Rectifier {
    fn default() -> Self {
        Self::new(200)
    }
}

fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < LATTICE_SNAP { r } else { v }
}

/// Reject a quadrilateral outside the image or with no interior before any
/// solving.
fn check_quad(image: &RasterBuffer, quad: &Quadrilateral) -> Result<()> {
    let corners = quad.corners();
    if corners.iter().any(|p| !p.is_finite()) {
        return Err(FlatpageError::DegenerateHomography {
            reason: "non-finite corner".into(),
        });
    }
    if !quad.within_bounds(image.width(), image.height()) {
        return Err(FlatpageError::QuadOutOfBounds {
            width: image.width(),
            height: image.height(),
        });
    }
    if quad.area() < 1.0 {
        return Err(FlatpageError::DegenerateHomography {
            reason: format!("corners {corners:?} enclose no area"),
        });
    }
    Ok(())
}
