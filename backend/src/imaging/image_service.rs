use std::io::Cursor;

use actix_web::web;
use futures_util::{Stream, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use log::{debug, warn};

use crate::config::AppConfig;

pub const ALLOWED_MIME_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/webp", "image/gif"];

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Unsupported content type: {0}")]
    Validation(String),
    #[error("Image exceeds the maximum size of {max_mb}MB")]
    TooLarge { max_mb: usize },
    #[error("Image processing failed: {0}")]
    Processing(String),
    #[error("Failed to read upload: {0}")]
    Upload(String),
}

/// An uploaded image after validation: re-encoded as JPEG with the longest
/// side bounded by the configured maximum dimension.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ProcessedImage {
    pub const MIME_TYPE: &'static str = "image/jpeg";
}

#[derive(Clone)]
pub struct ImageService {
    max_size_bytes: usize,
    max_size_mb: usize,
    max_dimension: u32,
    high_risk_dimension: u32,
}

impl ImageService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            max_size_bytes: config.max_image_size_bytes(),
            max_size_mb: config.max_image_size_mb,
            max_dimension: config.max_image_dimension,
            high_risk_dimension: config.high_risk_dimension,
        }
    }

    /// Reads an upload stream in bounded chunks, enforcing the size cap
    /// incrementally, then decodes, resizes, and re-encodes the image on
    /// the blocking pool. The stream is abandoned as soon as the running
    /// byte count exceeds the cap, so an oversized body is never fully
    /// buffered.
    pub async fn ingest<S, E>(
        &self,
        mut stream: S,
        declared_content_type: &str,
    ) -> Result<ProcessedImage, ImageError>
    where
        S: Stream<Item = Result<web::Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        if !ALLOWED_MIME_TYPES.contains(&declared_content_type) {
            return Err(ImageError::Validation(declared_content_type.to_string()));
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ImageError::Upload(e.to_string()))?;
            if body.len() + chunk.len() > self.max_size_bytes {
                return Err(ImageError::TooLarge {
                    max_mb: self.max_size_mb,
                });
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(ImageError::Processing("empty image payload".to_string()));
        }

        let max_dimension = self.max_dimension;
        let high_risk_dimension = self.high_risk_dimension;
        web::block(move || process_image(&body, max_dimension, high_risk_dimension))
            .await
            .map_err(|e| ImageError::Processing(format!("blocking task failed: {e}")))?
    }
}

/// Decode, flatten, bound, and re-encode an image. CPU-bound; callers run
/// this on the blocking pool.
pub(crate) fn process_image(
    data: &[u8],
    max_dimension: u32,
    high_risk_dimension: u32,
) -> Result<ProcessedImage, ImageError> {
    let decoded = image::load_from_memory(data)
        .map_err(|e| ImageError::Processing(format!("decode failed: {e}")))?;

    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(ImageError::Processing(
            "image has zero width or height".to_string(),
        ));
    }

    let mut img = flatten_alpha(decoded);

    // Aggressive first-pass downsample bounds peak memory before the
    // quality resize kicks in.
    if img.width() > high_risk_dimension || img.height() > high_risk_dimension {
        let factor = img.width().max(img.height()) as f32 / high_risk_dimension as f32;
        warn!(
            "High-risk image ({}x{}), downsampling by a factor of {:.2}",
            img.width(),
            img.height(),
            factor
        );
        let new_width = (img.width() as f32 / factor).max(1.0) as u32;
        let new_height = (img.height() as f32 / factor).max(1.0) as u32;
        img = img.resize(new_width, new_height, FilterType::Triangle);
    }

    if img.width().max(img.height()) > max_dimension {
        img = img.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    }

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), JPEG_QUALITY);
    img.write_with_encoder(encoder)
        .map_err(|e| ImageError::Processing(format!("JPEG encode failed: {e}")))?;

    debug!(
        "Processed image: {}x{}, {} bytes",
        img.width(),
        img.height(),
        buffer.len()
    );

    Ok(ProcessedImage {
        width: img.width(),
        height: img.height(),
        bytes: buffer,
    })
}

/// Composites any alpha channel over an opaque white background. JPEG
/// encoding and the vision APIs expect no alpha.
fn flatten_alpha(img: DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return img;
    }

    let rgba = img.to_rgba8();
    let mut flat = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        let blend = |c: u8| (((c as u32 * alpha) + 255 * (255 - alpha)) / 255) as u8;
        flat.put_pixel(
            x,
            y,
            image::Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]),
        );
    }
    DynamicImage::ImageRgb8(flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use image::{ImageFormat, Rgb, Rgba, RgbaImage};
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service(max_size_mb: usize, max_dimension: u32) -> ImageService {
        ImageService {
            max_size_bytes: max_size_mb * 1024 * 1024,
            max_size_mb,
            max_dimension,
            high_risk_dimension: 8000,
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([180, 40, 40]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn single_chunk(
        data: Vec<u8>,
    ) -> impl Stream<Item = Result<web::Bytes, Infallible>> + Unpin {
        stream::iter(vec![Ok(web::Bytes::from(data))])
    }

    #[actix_web::test]
    async fn rejects_disallowed_content_type() {
        let result = service(10, 1024)
            .ingest(single_chunk(png_bytes(10, 10)), "text/html")
            .await;
        assert!(matches!(result, Err(ImageError::Validation(_))));
    }

    #[actix_web::test]
    async fn never_upscales_a_small_image() {
        let processed = service(10, 1024)
            .ingest(single_chunk(png_bytes(100, 80)), "image/png")
            .await
            .unwrap();
        assert_eq!((processed.width, processed.height), (100, 80));
        assert_eq!(
            image::guess_format(&processed.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[actix_web::test]
    async fn bounds_the_longest_side_to_the_limit() {
        let processed = service(10, 1024)
            .ingest(single_chunk(png_bytes(3000, 1500)), "image/png")
            .await
            .unwrap();
        assert_eq!(processed.width.max(processed.height), 1024);
        assert_eq!(processed.height, 512);
    }

    #[actix_web::test]
    async fn aborts_an_oversized_stream_before_buffering_it() {
        let consumed = Arc::new(AtomicUsize::new(0));
        let counter = consumed.clone();

        // 400 chunks of 8 KiB against a 1 MiB cap; the cap is crossed at
        // chunk 129, long before the stream ends.
        let chunks: Vec<Result<web::Bytes, Infallible>> = (0..400)
            .map(|_| Ok(web::Bytes::from(vec![0u8; 8 * 1024])))
            .collect();
        let stream = stream::iter(chunks).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result = service(1, 1024)
            .ingest(Box::pin(stream), "image/jpeg")
            .await;
        assert!(matches!(result, Err(ImageError::TooLarge { max_mb: 1 })));
        assert!(consumed.load(Ordering::SeqCst) < 200);
    }

    #[actix_web::test]
    async fn rejects_an_empty_payload() {
        let empty = stream::iter(Vec::<Result<web::Bytes, Infallible>>::new());
        let result = service(10, 1024).ingest(empty, "image/png").await;
        assert!(matches!(result, Err(ImageError::Processing(_))));
    }

    #[test]
    fn composites_alpha_over_white() {
        let img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 0]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();

        let processed = process_image(&buffer, 1024, 8000).unwrap();
        let decoded = image::load_from_memory(&processed.bytes).unwrap().to_rgb8();
        let pixel = decoded.get_pixel(10, 10);
        // Fully transparent pixels land on (near-)white after JPEG.
        assert!(pixel[0] > 240 && pixel[1] > 240 && pixel[2] > 240);
    }

    #[test]
    fn downsamples_high_risk_images_before_the_standard_resize() {
        let data = png_bytes(9000, 20);
        let processed = process_image(&data, 1024, 8000).unwrap();
        assert_eq!(processed.width, 1024);
        assert!(processed.height >= 1);
    }

    #[test]
    fn garbage_bytes_fail_with_a_processing_error() {
        let result = process_image(b"not an image", 1024, 8000);
        assert!(matches!(result, Err(ImageError::Processing(_))));
    }
}
