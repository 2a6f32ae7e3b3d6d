// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster codec — decoding encoded images into `RasterBuffer`s (with an
// optional pre-resize), and encoding rectified buffers back to PNG/JPEG.
// Operates on in-memory images using the `image` crate.

use std::path::Path;

use flatpage_core::RasterBuffer;
use flatpage_core::error::{FlatpageError, Result};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use tracing::{debug, info, instrument};

/// Decode raw encoded bytes (JPEG, PNG, TIFF, ...) into a raster.
///
/// When `max_dimension` is non-zero and the longer side exceeds it, the image
/// is downscaled (Lanczos3, aspect preserved) before conversion so the
/// O(width * height) stages stay bounded.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn decode(data: &[u8], max_dimension: u32) -> Result<RasterBuffer> {
    let img = image::load_from_memory(data).map_err(|err| {
        FlatpageError::ImageError(format!("failed to decode image: {}", err))
    })?;
    debug!(
        width = img.width(),
        height = img.height(),
        "Image decoded from bytes"
    );
    from_dynamic(bound_dimensions(img, max_dimension))
}

/// Load and decode an image file.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn open(path: impl AsRef<Path>, max_dimension: u32) -> Result<RasterBuffer> {
    let img = image::open(path.as_ref()).map_err(|err| {
        FlatpageError::ImageError(format!(
            "failed to open {}: {}",
            path.as_ref().display(),
            err
        ))
    })?;
    info!(
        width = img.width(),
        height = img.height(),
        "Image loaded"
    );
    from_dynamic(bound_dimensions(img, max_dimension))
}

/// Downscale so the longer side is at most `max_dimension` (0 = unbounded).
pub fn bound_dimensions(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    if max_dimension == 0 || img.width().max(img.height()) <= max_dimension {
        return img;
    }
    info!(
        from_w = img.width(),
        from_h = img.height(),
        max_dimension,
        "Downscaling oversized input"
    );
    img.resize(
        max_dimension,
        max_dimension,
        image::imageops::FilterType::Lanczos3,
    )
}

/// Convert a decoded image into a raster with 1, 3 or 4 channels.
///
/// Gray and gray+alpha become 1 and 4 channels respectively; 16-bit and
/// float images are narrowed to 8 bits.
pub fn from_dynamic(img: DynamicImage) -> Result<RasterBuffer> {
    let (width, height) = (img.width(), img.height());
    let color = img.color();
    let (channels, pixels) = if color.has_alpha() {
        (4, img.into_rgba8().into_raw())
    } else if !color.has_color() {
        (1, img.into_luma8().into_raw())
    } else {
        (3, img.into_rgb8().into_raw())
    };
    RasterBuffer::new(width, height, channels, pixels)
}

/// Wrap a raster as a `DynamicImage` without changing its channel layout.
pub fn to_dynamic(raster: &RasterBuffer) -> Result<DynamicImage> {
    let (width, height) = raster.dimensions();
    let pixels = raster.pixels().to_vec();
    let img = match raster.channels() {
        1 => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8),
        other => {
            return Err(FlatpageError::InvalidRaster(format!(
                "unsupported channel count {other}"
            )));
        }
    };
    img.ok_or_else(|| FlatpageError::InvalidRaster("pixel buffer size mismatch".into()))
}

/// Encode a raster as PNG bytes.
pub fn encode_png(raster: &RasterBuffer) -> Result<Vec<u8>> {
    encode_to_format(&to_dynamic(raster)?, ImageFormat::Png)
}

/// Encode a raster as JPEG bytes with the given quality (1-100). Alpha is
/// dropped.
pub fn encode_jpeg(raster: &RasterBuffer, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let dynamic = to_dynamic(raster)?;
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    let result = if raster.channels() == 1 {
        dynamic.to_luma8().write_with_encoder(encoder)
    } else {
        dynamic.to_rgb8().write_with_encoder(encoder)
    };
    result.map_err(|err| FlatpageError::ImageError(format!("JPEG encoding failed: {}", err)))?;
    Ok(buffer)
}

/// Write a raster to a file. The format is inferred from the file extension.
pub fn save(raster: &RasterBuffer, path: impl AsRef<Path>) -> Result<()> {
    let dynamic = to_dynamic(raster)?;
    // JPEG cannot carry alpha.
    let dynamic = match ImageFormat::from_path(path.as_ref()) {
        Ok(ImageFormat::Jpeg) if raster.channels() == 4 => DynamicImage::ImageRgb8(dynamic.to_rgb8()),
        _ => dynamic,
    };
    dynamic.save(path.as_ref()).map_err(|err| {
        FlatpageError::ImageError(format!(
            "failed to save image to {}: {}",
            path.as_ref().display(),
            err
        ))
    })
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image.write_to(&mut cursor, format).map_err(|err| {
        FlatpageError::ImageError(format!("image encoding failed: {}", err))
    })?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn png_round_trip_keeps_gray_layout() {
        let gray = GrayImage::from_fn(7, 5, |x, y| Luma([(x * 30 + y) as u8]));
        let raster = from_dynamic(DynamicImage::ImageLuma8(gray)).expect("raster");
        assert_eq!(raster.channels(), 1);

        let png = encode_png(&raster).expect("encode");
        let back = decode(&png, 0).expect("decode");
        assert_eq!(back, raster);
    }

    #[test]
    fn rgb_and_rgba_layouts_are_preserved() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])));
        assert_eq!(from_dynamic(rgb).expect("rgb").channels(), 3);

        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(3, 2));
        assert_eq!(from_dynamic(rgba).expect("rgba").channels(), 4);
    }

    #[test]
    fn oversized_input_is_bounded() {
        let big = DynamicImage::ImageLuma8(GrayImage::new(400, 100));
        let bounded = bound_dimensions(big, 200);
        assert_eq!((bounded.width(), bounded.height()), (200, 50));

        let small = DynamicImage::ImageLuma8(GrayImage::new(40, 10));
        let kept = bound_dimensions(small, 200);
        assert_eq!((kept.width(), kept.height()), (40, 10));
    }

    #[test]
    fn jpeg_encoding_produces_a_jpeg() {
        let raster = RasterBuffer::filled(16, 16, 4, 128).expect("raster");
        let jpeg = encode_jpeg(&raster, 85).expect("encode");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            decode(b"not an image", 0),
            Err(FlatpageError::ImageError(_))
        ));
    }

    #[test]
    fn save_drops_alpha_for_jpeg_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raster = RasterBuffer::filled(12, 9, 4, 200).expect("raster");

        let jpeg_path = dir.path().join("page.jpg");
        save(&raster, &jpeg_path).expect("save jpeg");
        assert_eq!(open(&jpeg_path, 0).expect("open").channels(), 3);

        let png_path = dir.path().join("page.png");
        save(&raster, &png_path).expect("save png");
        assert_eq!(open(&png_path, 0).expect("open"), raster);
    }
}
