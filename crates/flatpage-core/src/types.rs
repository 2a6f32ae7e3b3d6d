// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: subpixel points, document quadrilaterals, and the raw
// raster buffer handed between pipeline stages.

use serde::{Deserialize, Serialize};

use crate::error::{FlatpageError, Result};

/// A subpixel image coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Z component of `(b - a) x (c - a)`. Positive for a counter-clockwise turn
/// in a y-up frame (clockwise on screen, where y grows downwards).
pub fn cross(a: &Point, b: &Point, c: &Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Unsigned polygon area by the shoelace formula. Vertices must be in order
/// (either winding).
pub fn polygon_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        twice += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    twice.abs() / 2.0
}

/// Four document corners in canonical order
/// `[top_left, top_right, bottom_right, bottom_left]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Quadrilateral {
    /// Build from corners that are already in canonical order.
    pub fn new(corners: [Point; 4]) -> Self {
        let [top_left, top_right, bottom_right, bottom_left] = corners;
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Label four unordered corners.
    ///
    /// Top-left minimises `x + y`, bottom-right maximises it; top-right
    /// maximises `x - y`, bottom-left minimises it. When ties make two labels
    /// land on the same point (a page rotated by 45 degrees), the corners are
    /// instead walked clockwise around their centroid starting from the
    /// smallest `x + y`.
    pub fn from_unordered(points: [Point; 4]) -> Self {
        let pick = |key: fn(&Point) -> f64, want_max: bool| -> usize {
            let mut best = 0;
            for i in 1..4 {
                let better = if want_max {
                    key(&points[i]) > key(&points[best])
                } else {
                    key(&points[i]) < key(&points[best])
                };
                if better {
                    best = i;
                }
            }
            best
        };
        let sum = |p: &Point| p.x + p.y;
        let diff = |p: &Point| p.x - p.y;

        let labels = [
            pick(sum, false),
            pick(diff, true),
            pick(sum, true),
            pick(diff, false),
        ];
        let distinct = (0..4).all(|i| (i + 1..4).all(|j| labels[i] != labels[j]));
        if distinct {
            return Self::new(labels.map(|i| points[i]));
        }
        Self::new(clockwise_from_top_left(points))
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Shoelace area.
    pub fn area(&self) -> f64 {
        polygon_area(&self.corners())
    }

    /// True when every turn has the same sign. Cross products whose magnitude
    /// is at most `tolerance` count as collinear noise and are ignored.
    pub fn is_convex(&self, tolerance: f64) -> bool {
        let c = self.corners();
        let mut sign = 0i8;
        for i in 0..4 {
            let turn = cross(&c[i], &c[(i + 1) % 4], &c[(i + 2) % 4]);
            if turn.abs() <= tolerance {
                continue;
            }
            let s = if turn > 0.0 { 1 } else { -1 };
            if sign == 0 {
                sign = s;
            } else if sign != s {
                return false;
            }
        }
        sign != 0
    }

    /// Every corner is finite and inside `[0, width] x [0, height]`.
    pub fn within_bounds(&self, width: u32, height: u32) -> bool {
        let (w, h) = (width as f64, height as f64);
        self.corners()
            .iter()
            .all(|p| p.is_finite() && (0.0..=w).contains(&p.x) && (0.0..=h).contains(&p.y))
    }
}

/// Sort by angle around the centroid (clockwise on screen, since y grows
/// downwards), then rotate so the smallest `x + y` comes first. Ties go to the
/// earlier point in angular order.
fn clockwise_from_top_left(points: [Point; 4]) -> [Point; 4] {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let mut ordered = points;
    ordered.sort_by(|a, b| {
        let angle = |p: &Point| (p.y - cy).atan2(p.x - cx);
        angle(a).total_cmp(&angle(b))
    });

    let mut start = 0;
    for i in 1..4 {
        if ordered[i].x + ordered[i].y < ordered[start].x + ordered[start].y {
            start = i;
        }
    }
    ordered.rotate_left(start);
    ordered
}

/// A decoded raster: `width * height * channels` bytes, row-major,
/// channel-interleaved. Channel count is 1 (gray), 3 (RGB) or 4 (RGBA).
#[derive(Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

impl RasterBuffer {
    /// Wrap raw pixels, checking the channel count and buffer length.
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Result<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(FlatpageError::InvalidRaster(format!(
                "unsupported channel count {channels}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(FlatpageError::InvalidRaster(format!(
                "empty raster {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(FlatpageError::InvalidRaster(format!(
                "expected {expected} bytes for {width}x{height}x{channels}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// A raster with every byte set to `value`.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> Result<Self> {
        let len = width as usize * height as usize * channels as usize;
        Self::new(width, height, channels, vec![value; len])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel count (`width * height`).
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Channel values of the pixel at `(x, y)`. Panics when out of bounds,
    /// like slice indexing.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.pixels[start..start + c]
    }
}

impl std::fmt::Debug for RasterBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
