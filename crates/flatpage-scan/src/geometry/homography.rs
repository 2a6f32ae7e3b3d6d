// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Four-point homography estimation (direct linear transform) and output size
// estimation for rectified documents.

use flatpage_core::error::{FlatpageError, Result};
use flatpage_core::{Point, Quadrilateral};
use tracing::debug;

/// Pivots smaller than this are treated as zero during elimination.
pub const PIVOT_EPSILON: f64 = 1e-10;

/// Perspective divisors smaller than this make a projection undefined.
pub const DIVISOR_EPSILON: f64 = 1e-10;

/// Tolerance used by [`Homography::validate`] when reprojecting corners.
const REPROJECTION_TOLERANCE: f64 = 1e-6;

/// A projective map `[x', y', w]^T = H [x, y, 1]^T` with `H[2][2] = 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: [[f64; 3]; 3],
    /// Columns of the 8x8 system whose pivot fell below `PIVOT_EPSILON`.
    /// Bit `i` set means unknown `h_i` was left at zero.
    skipped_pivots: u8,
    /// Smallest absolute pivot met during elimination.
    min_pivot: f64,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            skipped_pivots: 0,
            min_pivot: 1.0,
        }
    }

    pub fn matrix(&self) -> &[[f64; 3]; 3] {
        &self.matrix
    }

    /// True when the solve had to skip at least one near-zero pivot, i.e. the
    /// system was singular and some parameters are arbitrary zeros.
    pub fn has_near_zero_pivot(&self) -> bool {
        self.skipped_pivots != 0
    }

    /// Indices of the parameters `h0..h7` that were left at zero.
    pub fn skipped_parameters(&self) -> Vec<usize> {
        (0..8).filter(|i| self.skipped_pivots & (1 << i) != 0).collect()
    }

    pub fn min_pivot(&self) -> f64 {
        self.min_pivot
    }

    /// Homogeneous image of `p` as `(x', y', w)`.
    pub fn apply_homogeneous(&self, p: Point) -> (f64, f64, f64) {
        let m = &self.matrix;
        (
            m[0][0] * p.x + m[0][1] * p.y + m[0][2],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2],
            m[2][0] * p.x + m[2][1] * p.y + m[2][2],
        )
    }

    /// Project `p`, or `None` when the divisor vanishes.
    pub fn project(&self, p: Point) -> Option<Point> {
        let (x, y, w) = self.apply_homogeneous(p);
        if w.abs() < DIVISOR_EPSILON {
            return None;
        }
        Some(Point::new(x / w, y / w))
    }

    /// Check that this homography really maps `src` onto `dst`.
    ///
    /// Fails if the solve skipped a pivot, if any entry is non-finite, if a
    /// corner's divisor is near zero, or if a corner reprojects further than
    /// `1e-6` (scaled by the coordinate magnitude) from its target.
    pub fn validate(&self, src: &[Point; 4], dst: &[Point; 4]) -> Result<()> {
        if self.has_near_zero_pivot() {
            return Err(FlatpageError::DegenerateHomography {
                reason: format!(
                    "near-zero pivot for parameters {:?} (min pivot {:e})",
                    self.skipped_parameters(),
                    self.min_pivot
                ),
            });
        }
        if self.matrix.iter().flatten().any(|v| !v.is_finite()) {
            return Err(FlatpageError::DegenerateHomography {
                reason: "matrix has non-finite entries".into(),
            });
        }
        for (s, d) in src.iter().zip(dst) {
            let Some(mapped) = self.project(*s) else {
                return Err(FlatpageError::DegenerateHomography {
                    reason: format!("perspective divisor vanishes at ({}, {})", s.x, s.y),
                });
            };
            let scale = 1.0 + d.x.abs().max(d.y.abs());
            if mapped.distance(d) > REPROJECTION_TOLERANCE * scale {
                return Err(FlatpageError::DegenerateHomography {
                    reason: format!(
                        "({}, {}) maps to ({}, {}) instead of ({}, {})",
                        s.x, s.y, mapped.x, mapped.y, d.x, d.y
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Solve for the homography taking each `src[i]` to `dst[i]`.
///
/// Builds the 8x8 system from the four correspondences
/// (`h0 x + h1 y + h2 = x'(h6 x + h7 y + 1)` and likewise for `y'`) and solves
/// it by Gaussian elimination with partial pivoting. Never fails: a singular
/// column is skipped and its unknown stays zero, which is recorded on the
/// result so [`Homography::validate`] can reject it.
pub fn compute_homography(src: &[Point; 4], dst: &[Point; 4]) -> Homography {
    let mut a = [[0.0f64; 8]; 8];
    let mut b = [0.0f64; 8];

    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);
        a[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y];
        b[2 * i] = u;
        a[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y];
        b[2 * i + 1] = v;
    }

    let solution = solve_linear_system(a, b);
    let h = solution.values;
    if solution.skipped != 0 {
        debug!(
            skipped = solution.skipped,
            min_pivot = solution.min_pivot,
            "Homography system is singular"
        );
    }

    Homography {
        matrix: [[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]],
        skipped_pivots: solution.skipped,
        min_pivot: solution.min_pivot,
    }
}

/// Output of [`solve_linear_system`].
#[derive(Debug, Clone, Copy)]
struct Solution {
    values: [f64; 8],
    skipped: u8,
    min_pivot: f64,
}

/// Gaussian elimination with partial pivoting on an 8x8 system.
fn solve_linear_system(mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> Solution {
    const N: usize = 8;
    let mut skipped = 0u8;
    let mut min_pivot = f64::INFINITY;

    for col in 0..N {
        // Swap the row with the largest entry in this column into place.
        let mut pivot_row = col;
        for row in col + 1..N {
            if a[row][col].abs() > a[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot = a[col][col];
        min_pivot = min_pivot.min(pivot.abs());
        if pivot.abs() < PIVOT_EPSILON {
            skipped |= 1 << col;
            continue;
        }

        for row in col + 1..N {
            let factor = a[row][col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..N {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut values = [0.0f64; N];
    for row in (0..N).rev() {
        if skipped & (1 << row) != 0 {
            continue;
        }
        let mut acc = b[row];
        for k in row + 1..N {
            acc -= a[row][k] * values[k];
        }
        values[row] = acc / a[row][row];
    }

    Solution {
        values,
        skipped,
        min_pivot,
    }
}

/// Rectified output size for `quad`: the longer of each pair of opposite
/// edges, rounded, each at least `min_dimension`.
pub fn estimate_output_dimensions(quad: &Quadrilateral, min_dimension: u32) -> (u32, u32) {
    let top = quad.top_left.distance(&quad.top_right);
    let bottom = quad.bottom_left.distance(&quad.bottom_right);
    let left = quad.top_left.distance(&quad.bottom_left);
    let right = quad.top_right.distance(&quad.bottom_right);

    let width = (top.max(bottom).round() as u32).max(min_dimension);
    let height = (left.max(right).round() as u32).max(min_dimension);
    (width, height)
}
