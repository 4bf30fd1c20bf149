//! Image preprocessing shared by training and inference
//!
//! Every image goes through the same steps:
//! 1. decode and convert to RGB (alpha is dropped)
//! 2. resize to `size x size` with nearest-neighbour sampling
//! 3. scale each channel from 0..=255 to 0.0..=1.0
//! 4. lay out channel-first (CHW), flattened

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, ImageReader};

use crate::utils::error::{BeanDoctorError, Result};

/// Decode an image file
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(BeanDoctorError::PathNotFound(path.to_path_buf()));
    }

    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| BeanDoctorError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| BeanDoctorError::ImageLoad(path.to_path_buf(), e.to_string()))
}

/// Resize and scale a decoded image into a flattened `[3, size, size]` tensor
pub fn preprocess_image(image: &DynamicImage, size: usize) -> Vec<f32> {
    let rgb = image
        .resize_exact(size as u32, size as u32, FilterType::Nearest)
        .to_rgb8();

    let plane = size * size;
    let mut tensor = vec![0.0f32; 3 * plane];

    for (i, pixel) in rgb.pixels().enumerate() {
        tensor[i] = pixel[0] as f32 / 255.0;
        tensor[plane + i] = pixel[1] as f32 / 255.0;
        tensor[2 * plane + i] = pixel[2] as f32 / 255.0;
    }

    tensor
}

/// Load an image from disk and preprocess it for the network
pub fn load_image_tensor(path: &Path, size: usize) -> Result<Vec<f32>> {
    let image = load_image(path)?;
    Ok(preprocess_image(&image, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_preprocess_shape_and_range() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(40, 30, |x, y| {
            Rgb([(x * 6) as u8, (y * 8) as u8, 255])
        }));

        let tensor = preprocess_image(&img, 16);

        assert_eq!(tensor.len(), 3 * 16 * 16);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        // Blue plane is saturated everywhere
        assert!(tensor[2 * 256..].iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_preprocess_channel_first_layout() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 51])));
        let tensor = preprocess_image(&img, 4);

        assert!((tensor[0] - 1.0).abs() < 1e-6);
        assert_eq!(tensor[16], 0.0);
        assert!((tensor[32] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_alpha_is_dropped() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 0])));
        let tensor = preprocess_image(&img, 8);
        assert_eq!(tensor.len(), 3 * 64);
        assert!((tensor[0] - 10.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_load_image_tensor_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.png");
        RgbImage::from_pixel(20, 10, Rgb([0, 128, 0])).save(&path).unwrap();

        let tensor = load_image_tensor(&path, 8).unwrap();
        assert_eq!(tensor.len(), 3 * 8 * 8);
        assert!((tensor[64] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_path_not_found() {
        let err = load_image_tensor(Path::new("/definitely/not/here.jpg"), 8).unwrap_err();
        assert!(matches!(err, BeanDoctorError::PathNotFound(_)));
    }

    #[test]
    fn test_corrupt_file_is_image_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let err = load_image_tensor(&path, 8).unwrap_err();
        assert!(matches!(err, BeanDoctorError::ImageLoad(_, _)));
    }
}
