// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Classical corner locator — finds the document quadrilateral from pixels
// alone: edge map, contours, convex hull, Douglas-Peucker, acceptance.

use std::sync::OnceLock;

use flatpage_core::config::{AcceptanceConfig, EdgeConfig};
use flatpage_core::error::{FlatpageError, Result};
use flatpage_core::{PipelineConfig, Point, Quadrilateral, RasterBuffer};
use tracing::{debug, info, instrument};

use super::CornerLocator;
use super::contours::extract_contours;
use super::edges::{canny, dilate, gaussian_blur_5, grayscale};
use crate::geometry::polygon::{closed_perimeter, convex_hull, simplify_closed};

/// Pixel-level document locator.
///
/// Deterministic and free of I/O. The pipeline is:
///
/// 1. Fixed-point grayscale
/// 2. 5-tap separable Gaussian blur
/// 3. Canny edges with hysteresis
/// 4. 3x3 dilation to close small gaps
/// 5. Boundary contours of each edge component
/// 6. Convex hull of each contour
/// 7. Douglas-Peucker with an epsilon relative to the hull perimeter
/// 8. Keep convex 4-gons covering enough of the image; the largest wins
pub struct ClassicalEdgeLocator {
    edges: EdgeConfig,
    acceptance: AcceptanceConfig,
    ready: OnceLock<std::result::Result<(), String>>,
}

impl ClassicalEdgeLocator {
    pub fn new(edges: EdgeConfig, acceptance: AcceptanceConfig) -> Self {
        Self {
            edges,
            acceptance,
            ready: OnceLock::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.edges.clone(), config.acceptance.clone())
    }

    /// Binary, dilated edge map for `image` (steps 1-4).
    pub fn edge_map(&self, image: &RasterBuffer) -> image::GrayImage {
        let gray = grayscale(image);
        let blurred = gaussian_blur_5(&gray);
        let edges = canny(&blurred, self.edges.canny_low, self.edges.canny_high);
        dilate(&edges, self.edges.dilate_iterations)
    }

    /// Every acceptable quadrilateral in `image`, canonically ordered.
    pub fn candidates(&self, image: &RasterBuffer) -> Vec<Quadrilateral> {
        let edges = self.edge_map(image);
        let contours = extract_contours(&edges, self.edges.min_contour_points);
        let min_area = self.acceptance.min_area_ratio * image.area() as f64;

        let candidates: Vec<Quadrilateral> = contours
            .iter()
            .filter_map(|contour| quad_candidate(&contour.points, &self.acceptance, min_area))
            .collect();

        debug!(
            contours = contours.len(),
            candidates = candidates.len(),
            min_area,
            "Quadrilateral candidates collected"
        );
        candidates
    }
}

impl Default for ClassicalEdgeLocator {
    fn default() -> Self {
        Self::new(EdgeConfig::default(), AcceptanceConfig::default())
    }
}

impl CornerLocator for ClassicalEdgeLocator {
    fn name(&self) -> &'static str {
        "classical"
    }

    fn initialize(&self) -> Result<()> {
        self.ready
            .get_or_init(|| {
                self.edges
                    .validate()
                    .and_then(|()| self.acceptance.validate())
            })
            .clone()
            .map_err(FlatpageError::Config)
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn locate(&self, image: &RasterBuffer) -> Option<Quadrilateral> {
        let best = self
            .candidates(image)
            .into_iter()
            .max_by(|a, b| a.area().total_cmp(&b.area()));

        match &best {
            Some(quad) => info!(area = quad.area(), corners = ?quad.corners(), "Document located"),
            None => debug!("No document quadrilateral found"),
        }
        best
    }
}

/// Reduce one contour to a document quadrilateral, if it qualifies.
///
/// Convex hull, closed Douglas-Peucker at `epsilon_ratio * perimeter`, then
/// the 4-vertex, convexity and minimum-area checks.
pub fn quad_candidate(
    contour: &[Point],
    acceptance: &AcceptanceConfig,
    min_area: f64,
) -> Option<Quadrilateral> {
    let hull = convex_hull(contour);
    if hull.len() < 4 {
        return None;
    }

    let epsilon = acceptance.epsilon_ratio * closed_perimeter(&hull);
    let simplified = simplify_closed(&hull, epsilon);
    let [a, b, c, d] = simplified.as_slice() else {
        return None;
    };

    let in_hull_order = Quadrilateral::new([*a, *b, *c, *d]);
    if !in_hull_order.is_convex(acceptance.convexity_tolerance) {
        return None;
    }
    if in_hull_order.area() <= min_area {
        return None;
    }
    Some(Quadrilateral::from_unordered([*a, *b, *c, *d]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point as PixelPoint;

    /// Light quad on a dark background, returned with its true corners.
    fn synthetic_page(width: u32, height: u32, corners: [(i32, i32); 4]) -> RasterBuffer {
        let mut img = GrayImage::from_pixel(width, height, Luma([30u8]));
        let poly: Vec<PixelPoint<i32>> =
            corners.iter().map(|&(x, y)| PixelPoint::new(x, y)).collect();
        draw_polygon_mut(&mut img, &poly, Luma([220u8]));
        RasterBuffer::new(width, height, 1, img.into_raw()).expect("valid raster")
    }

    fn true_area(corners: [(i32, i32); 4]) -> f64 {
        flatpage_core::types::polygon_area(
            &corners.map(|(x, y)| Point::new(x as f64, y as f64)),
        )
    }

    #[test]
    fn finds_tilted_page_with_matching_area_and_order() {
        let corners = [(150, 90), (520, 130), (490, 420), (110, 380)];
        let image = synthetic_page(640, 480, corners);

        let locator = ClassicalEdgeLocator::default();
        locator.initialize().expect("valid defaults");
        let quad = locator.locate(&image).expect("page should be found");

        let expected = true_area(corners);
        let ratio = quad.area() / expected;
        assert!((0.95..=1.05).contains(&ratio), "area ratio {ratio}");

        for (found, (x, y)) in quad.corners().iter().zip(corners) {
            assert!(
                found.distance(&Point::new(x as f64, y as f64)) < 10.0,
                "corner {found:?} too far from ({x}, {y})"
            );
        }
    }

    #[test]
    fn rgb_input_is_supported() {
        let corners = [(60, 50), (360, 40), (370, 260), (50, 250)];
        let gray = synthetic_page(420, 300, corners);
        let rgb: Vec<u8> = gray.pixels().iter().flat_map(|&v| [v, v, v]).collect();
        let image = RasterBuffer::new(420, 300, 3, rgb).expect("raster");
        assert!(ClassicalEdgeLocator::default().locate(&image).is_some());
    }

    #[test]
    fn blank_image_is_not_found() {
        let image = RasterBuffer::filled(300, 200, 3, 200).expect("raster");
        assert!(ClassicalEdgeLocator::default().locate(&image).is_none());
    }

    #[test]
    fn small_quad_is_rejected_by_area() {
        // 60x60 square in a 400x400 image: 2.25% of the area.
        let corners = [(100, 100), (160, 100), (160, 160), (100, 160)];
        let image = synthetic_page(400, 400, corners);
        let locator = ClassicalEdgeLocator::default();
        assert!(locator.locate(&image).is_none());
        // The same shape passes once the floor is lowered.
        let mut acceptance = AcceptanceConfig::default();
        acceptance.min_area_ratio = 0.01;
        let relaxed = ClassicalEdgeLocator::new(EdgeConfig::default(), acceptance);
        assert!(relaxed.locate(&image).is_some());
    }

    #[test]
    fn triangle_is_not_a_document() {
        let mut img = GrayImage::from_pixel(400, 400, Luma([30u8]));
        let tri = [PixelPoint::new(50, 350), PixelPoint::new(200, 40), PixelPoint::new(350, 350)];
        draw_polygon_mut(&mut img, &tri, Luma([220u8]));
        let image = RasterBuffer::new(400, 400, 1, img.into_raw()).expect("raster");
        assert!(ClassicalEdgeLocator::default().locate(&image).is_none());
    }

    #[test]
    fn candidate_from_rectangle_outline() {
        let mut outline = Vec::new();
        for x in 0..=200 {
            outline.push(Point::new(x as f64, 0.0));
            outline.push(Point::new(x as f64, 100.0));
        }
        for y in 0..=100 {
            outline.push(Point::new(0.0, y as f64));
            outline.push(Point::new(200.0, y as f64));
        }
        let quad = quad_candidate(&outline, &AcceptanceConfig::default(), 1000.0)
            .expect("rectangle qualifies");
        assert_eq!(quad.top_left, Point::new(0.0, 0.0));
        assert_eq!(quad.bottom_right, Point::new(200.0, 100.0));
        assert!(quad_candidate(&outline, &AcceptanceConfig::default(), 20_000.0).is_none());
    }

    #[test]
    fn initialize_is_idempotent_and_reports_bad_thresholds() {
        let mut edges = EdgeConfig::default();
        edges.canny_low = 300.0;
        let locator = ClassicalEdgeLocator::new(edges, AcceptanceConfig::default());
        assert!(locator.initialize().is_err());
        assert!(locator.initialize().is_err());

        let ok = ClassicalEdgeLocator::default();
        assert!(ok.initialize().is_ok());
        assert!(ok.initialize().is_ok());
    }

    #[test]
    fn initialize_rejects_what_pipeline_config_rejects() {
        let mut config = PipelineConfig::default();
        config.acceptance.min_area_ratio = 0.0;
        let expected = config.validate().expect_err("zero area ratio").to_string();

        let locator = ClassicalEdgeLocator::from_config(&config);
        let err = locator.initialize().expect_err("locator must refuse it too");
        assert_eq!(err.to_string(), expected);
    }
}
