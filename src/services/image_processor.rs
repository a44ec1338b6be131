// src/services/image_processor.rs
use crate::errors::AppError;
use image::{GenericImageView, ImageFormat as ImgFormat};

pub const MAX_DIMENSION: u32 = 4096;
pub const CAPTION_MAX_SIZE: u32 = 2048;

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), AppError> {
        let img = image::load_from_memory(data)
            .map_err(|e| AppError::ImageProcessing(format!("Invalid image format: {}", e)))?;

        let (width, height) = img.dimensions();

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(AppError::ImageProcessing(format!(
                "Image dimensions exceed {}x{}",
                MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok((width, height))
    }

    /// Downscales so the long side fits `max_size`, re-encoding as PNG.
    /// Images already within bounds are returned untouched.
    pub fn resize_if_needed(&self, data: &[u8], max_size: u32) -> Result<Vec<u8>, AppError> {
        let img = image::load_from_memory(data)
            .map_err(|e| AppError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let (width, height) = img.dimensions();

        if width <= max_size && height <= max_size {
            return Ok(data.to_vec());
        }

        let ratio = (max_size as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| {
                AppError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(output)
    }

    /// Validates an uploaded poster and shrinks it for captioning.
    pub fn prepare_poster(&self, data: &[u8]) -> Result<Vec<u8>, AppError> {
        self.validate_image(data)?;
        self.resize_if_needed(data, CAPTION_MAX_SIZE)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), ImgFormat::Png)
        .unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_small_png() {
        let processor = ImageProcessor::new();
        assert_eq!(processor.validate_image(&png_bytes(8, 12)).unwrap(), (8, 12));
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = ImageProcessor::new()
            .validate_image(b"definitely not a png")
            .unwrap_err();
        assert!(matches!(err, AppError::ImageProcessing(_)));
    }

    #[test]
    fn rejects_images_beyond_max_dimension() {
        let processor = ImageProcessor::new();
        let err = processor.validate_image(&png_bytes(4097, 1)).unwrap_err();
        assert_eq!(err.to_string(), "Image dimensions exceed 4096x4096");
        assert!(processor.validate_image(&png_bytes(1, 4097)).is_err());
        assert_eq!(processor.validate_image(&png_bytes(4096, 1)).unwrap(), (4096, 1));
    }

    #[test]
    fn small_images_pass_through_unchanged() {
        let data = png_bytes(16, 16);
        let out = ImageProcessor::new().resize_if_needed(&data, 32).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn large_images_are_scaled_to_fit() {
        let data = png_bytes(64, 32);
        let out = ImageProcessor::new().resize_if_needed(&data, 16).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.dimensions(), (16, 8));
    }

    #[test]
    fn prepare_poster_validates_first() {
        assert!(ImageProcessor::new().prepare_poster(b"GIF89a?").is_err());
        assert!(ImageProcessor::new().prepare_poster(&png_bytes(4, 4)).is_ok());
    }
}
