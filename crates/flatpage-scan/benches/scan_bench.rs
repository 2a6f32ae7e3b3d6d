// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the flatpage-scan crate: corner location alone and
// the full locate + rectify pipeline on a synthetic photographed page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

use flatpage_core::{PipelineConfig, RasterBuffer};
use flatpage_scan::{ClassicalEdgeLocator, CornerLocator, DocumentPipeline};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// 800x1000 gray image with a slightly skewed light page on a dark table.
fn synthetic_page() -> RasterBuffer {
    let (width, height) = (800u32, 1000u32);
    let mut img = GrayImage::from_pixel(width, height, Luma([40u8]));
    let page = [
        Point::new(140, 90),
        Point::new(660, 130),
        Point::new(700, 880),
        Point::new(90, 910),
    ];
    draw_polygon_mut(&mut img, &page, Luma([230u8]));
    // Dimensions and buffer length agree by construction.
    RasterBuffer::new(width, height, 1, img.into_raw()).expect("valid raster")
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_classical_locate(c: &mut Criterion) {
    let image = synthetic_page();
    let locator = ClassicalEdgeLocator::default();

    c.bench_function("classical_locate (800x1000)", |b| {
        b.iter(|| black_box(locator.locate(black_box(&image))));
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let image = synthetic_page();
    let pipeline = DocumentPipeline::from_config(&PipelineConfig::default(), None)
        .expect("classical pipeline");

    c.bench_function("locate_and_rectify (800x1000)", |b| {
        b.iter(|| {
            let output = pipeline.process(black_box(image.clone()));
            black_box(output.dimensions());
        });
    });
}

criterion_group!(benches, bench_classical_locate, bench_full_pipeline);
criterion_main!(benches);
