// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour extraction: boundary pixels of each 8-connected edge component.

use flatpage_core::Point;
use image::GrayImage;

/// Boundary pixels of one connected edge component, in discovery order.
/// Neither closed nor convex.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Flood every 8-connected component of non-zero pixels and record the pixels
/// on its boundary: those touching a zero 8-neighbour or the image border.
///
/// Components with fewer than `min_points` boundary pixels are dropped.
pub fn extract_contours(edges: &GrayImage, min_points: usize) -> Vec<Contour> {
    let (width, height) = edges.dimensions();
    let (w, h) = (width as usize, height as usize);
    let map = edges.as_raw();
    let is_edge = |x: usize, y: usize| map[y * w + x] != 0;

    let mut visited = vec![false; w * h];
    let mut contours = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if visited[start] || map[start] == 0 {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut boundary = Vec::new();

        while let Some(i) = stack.pop() {
            let (x, y) = (i % w, i / w);
            let mut on_boundary = x == 0 || y == 0 || x == w - 1 || y == h - 1;

            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    if !is_edge(nx, ny) {
                        on_boundary = true;
                        continue;
                    }
                    let j = ny * w + nx;
                    if !visited[j] {
                        visited[j] = true;
                        stack.push(j);
                    }
                }
            }

            if on_boundary {
                boundary.push(Point::new(x as f64, y as f64));
            }
        }

        if boundary.len() >= min_points {
            contours.push(Contour { points: boundary });
        }
    }

    contours
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled_rect(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Luma([255u8]));
            }
        }
    }

    #[test]
    fn empty_map_has_no_contours() {
        assert!(extract_contours(&GrayImage::new(16, 16), 1).is_empty());
    }

    #[test]
    fn solid_block_records_only_its_rim() {
        let mut img = GrayImage::new(30, 30);
        filled_rect(&mut img, 5, 5, 15, 15);
        let contours = extract_contours(&img, 1);
        assert_eq!(contours.len(), 1);
        // 10x10 block: 100 pixels, 8x8 interior.
        assert_eq!(contours[0].len(), 100 - 64);
        assert!(!contours[0].points.contains(&Point::new(10.0, 10.0)));
    }

    #[test]
    fn separate_components_and_noise_filter() {
        let mut img = GrayImage::new(60, 30);
        filled_rect(&mut img, 2, 2, 20, 20); // rim of 18x18: 68 pixels
        filled_rect(&mut img, 40, 5, 43, 8); // 9 pixels of noise
        assert_eq!(extract_contours(&img, 1).len(), 2);
        let kept = extract_contours(&img, 30);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].len(), 68);
    }

    #[test]
    fn diagonal_pixels_are_one_component() {
        let mut img = GrayImage::new(10, 10);
        for i in 0..10 {
            img.put_pixel(i, i, Luma([255u8]));
        }
        let contours = extract_contours(&img, 1);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 10);
    }

    #[test]
    fn pixels_on_image_border_count_as_boundary() {
        let full = GrayImage::from_pixel(6, 6, Luma([255u8]));
        let contours = extract_contours(&full, 1);
        assert_eq!(contours[0].len(), 36 - 16);
    }
}
