use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use log::debug;

use super::level::{CompressionFactors, CompressionLevel};

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("scaling {width}x{height} leaves nothing to draw")]
    Empty { width: u32, height: u32 },
}

pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Downscales and re-encodes an image in its own format.
///
/// The result is returned even when it is larger than the input; callers that
/// want the smaller of the two have to compare sizes themselves.
pub fn compress_image(
    bytes: &[u8],
    level: Option<CompressionLevel>,
) -> Result<CompressedImage, CompressError> {
    let factors = CompressionFactors::for_level(level);
    let format = image::guess_format(bytes).map_err(CompressError::Decode)?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(CompressError::Decode)?;

    let (width, height) = img.dimensions();
    let target_width = (width as f64 * factors.scale).floor() as u32;
    let target_height = (height as f64 * factors.scale).floor() as u32;
    if target_width == 0 || target_height == 0 {
        return Err(CompressError::Empty { width, height });
    }

    debug!(
        "compressing {:?} {}x{} -> {}x{} at quality {}",
        format, width, height, target_width, target_height, factors.quality
    );

    let scaled = if (target_width, target_height) == (width, height) {
        img
    } else {
        img.resize_exact(target_width, target_height, FilterType::Triangle)
    };

    let bytes = encode(&scaled, format, factors.quality)?;
    Ok(CompressedImage {
        bytes,
        format,
        width: target_width,
        height: target_height,
    })
}

fn encode(img: &DynamicImage, format: ImageFormat, quality: f64) -> Result<Vec<u8>, CompressError> {
    let mut out = Cursor::new(Vec::new());
    match format {
        // jpeg has no alpha channel, flatten before handing it over
        ImageFormat::Jpeg => {
            let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
                .map_err(CompressError::Encode)?;
        }
        _ => img.write_to(&mut out, format).map_err(CompressError::Encode)?,
    }
    Ok(out.into_inner())
}
