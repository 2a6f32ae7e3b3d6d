// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge map construction — fixed-point grayscale, 5-tap Gaussian blur, Canny
// edge detection with hysteresis, and 3x3 dilation.

use std::collections::VecDeque;

use flatpage_core::RasterBuffer;
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology;

/// Binomial approximation of a Gaussian; weights sum to 16.
const BLUR_KERNEL: [u32; 5] = [1, 4, 6, 4, 1];

/// tan(pi/8) and tan(3pi/8): gradient direction bin boundaries.
const TAN_22_5: f32 = 0.414_213_57;
const TAN_67_5: f32 = 2.414_213_6;

/// Value written for edge pixels in a binary edge map.
pub const EDGE: u8 = 255;

/// Luma from `(R*77 + G*150 + B*29) >> 8`. Single-channel input is copied;
/// alpha is ignored.
pub fn grayscale(image: &RasterBuffer) -> GrayImage {
    let (width, height) = image.dimensions();
    let channels = image.channels() as usize;
    let mut gray = GrayImage::new(width, height);

    for (out, px) in gray.iter_mut().zip(image.pixels().chunks_exact(channels)) {
        *out = if channels == 1 {
            px[0]
        } else {
            ((px[0] as u32 * 77 + px[1] as u32 * 150 + px[2] as u32 * 29) >> 8) as u8
        };
    }
    gray
}

/// Separable `[1, 4, 6, 4, 1] / 16` blur, horizontal then vertical, with
/// samples past the border clamped to the nearest edge pixel.
pub fn gaussian_blur_5(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    let (w, h) = (width as usize, height as usize);
    let src = gray.as_raw();

    let mut horizontal = vec![0u8; src.len()];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0u32;
            for (k, weight) in BLUR_KERNEL.iter().enumerate() {
                let sx = (x + k).saturating_sub(2).min(w - 1);
                acc += weight * row[sx] as u32;
            }
            horizontal[y * w + x] = ((acc + 8) >> 4) as u8;
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (k, weight) in BLUR_KERNEL.iter().enumerate() {
                let sy = (y + k).saturating_sub(2).min(h - 1);
                acc += weight * horizontal[sy * w + x] as u32;
            }
            out[(x as u32, y as u32)].0[0] = ((acc + 8) >> 4) as u8;
        }
    }
    out
}

/// Quantised gradient direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Gradient along x; compare left/right.
    Deg0,
    /// Gradient towards bottom-right (image y grows downwards).
    Deg45,
    /// Gradient along y; compare up/down.
    Deg90,
    /// Gradient towards bottom-left.
    Deg135,
}

impl Direction {
    fn quantize(gx: f32, gy: f32) -> Self {
        let (ax, ay) = (gx.abs(), gy.abs());
        if ay <= ax * TAN_22_5 {
            Self::Deg0
        } else if ay >= ax * TAN_67_5 {
            Self::Deg90
        } else if (gx > 0.0) == (gy > 0.0) {
            Self::Deg45
        } else {
            Self::Deg135
        }
    }

    /// Offsets of the two neighbours across the edge.
    fn neighbours(self) -> [(isize, isize); 2] {
        match self {
            Self::Deg0 => [(-1, 0), (1, 0)],
            Self::Deg45 => [(-1, -1), (1, 1)],
            Self::Deg90 => [(0, -1), (0, 1)],
            Self::Deg135 => [(1, -1), (-1, 1)],
        }
    }
}

/// Canny edge detector on an already-blurred image.
///
/// Sobel gradients, non-maximum suppression across the edge, then hysteresis:
/// magnitudes `>= high` seed edges and any 8-connected run of magnitudes
/// `>= low` reachable from a seed is kept. Returns a binary map with
/// [`EDGE`] for edge pixels. The one-pixel frame has no gradient.
pub fn canny(blurred: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (width, height) = blurred.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut edges = GrayImage::new(width, height);
    if w < 3 || h < 3 {
        return edges;
    }

    let src = blurred.as_raw();
    let at = |x: usize, y: usize| src[y * w + x] as f32;

    let mut magnitude = vec![0f32; w * h];
    let mut direction = vec![Direction::Deg0; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));
            let i = y * w + x;
            magnitude[i] = (gx * gx + gy * gy).sqrt();
            direction[i] = Direction::quantize(gx, gy);
        }
    }

    // Non-maximum suppression.
    let mut thin = vec![0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = magnitude[i];
            if m < low {
                continue;
            }
            let [(ax, ay), (bx, by)] = direction[i].neighbours();
            let a = magnitude[(y as isize + ay) as usize * w + (x as isize + ax) as usize];
            let b = magnitude[(y as isize + by) as usize * w + (x as isize + bx) as usize];
            if m >= a && m >= b {
                thin[i] = m;
            }
        }
    }

    // Hysteresis: flood from strong seeds through weak pixels.
    let out: &mut [u8] = &mut edges;
    let mut queue = VecDeque::new();
    for (i, &m) in thin.iter().enumerate() {
        if m >= high {
            out[i] = EDGE;
            queue.push_back(i);
        }
    }
    while let Some(i) = queue.pop_front() {
        let (x, y) = (i % w, i / w);
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let j = ny * w + nx;
                if out[j] == 0 && thin[j] >= low && thin[j] > 0.0 {
                    out[j] = EDGE;
                    queue.push_back(j);
                }
            }
        }
    }

    edges
}

/// Grow edges with `iterations` passes of a 3x3 max filter.
///
/// On a binary map this is a chessboard-distance dilation of radius
/// `iterations`, clamped to 255.
pub fn dilate(edges: &GrayImage, iterations: u32) -> GrayImage {
    let radius = u8::try_from(iterations).unwrap_or(u8::MAX);
    morphology::dilate(edges, Norm::LInf, radius)
}
