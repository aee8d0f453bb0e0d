use image::imageops::{self, FilterType};
use image::ImageError;
use ndarray::Array4;

/// Side length the classifier was trained on.
pub const TARGET_SIZE: u32 = 512;
/// Bicubic. Fixed so the same bytes always produce the same tensor.
pub const RESAMPLE_FILTER: FilterType = FilterType::CatmullRom;
pub const CHANNELS: usize = 3;

/// NHWC, batch of one, values in [0, 1].
pub type ImageTensor = Array4<f32>;

pub fn tensor_shape() -> (usize, usize, usize, usize) {
    let side = TARGET_SIZE as usize;
    (1, side, side, CHANNELS)
}

/// Decodes an uploaded image and turns it into the model input tensor.
///
/// Any colour mode is converted to RGB (alpha dropped, grayscale expanded),
/// then the image is stretched to `TARGET_SIZE` x `TARGET_SIZE`.
pub fn preprocess(bytes: &[u8]) -> Result<ImageTensor, ImageError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let resized = imageops::resize(&rgb, TARGET_SIZE, TARGET_SIZE, RESAMPLE_FILTER);

    let tensor = Array4::from_shape_fn(tensor_shape(), |(_, y, x, c)| {
        let pixel = resized.get_pixel(x as u32, y as u32);
        pixel[c] as f32 / 255.0
    });

    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    fn in_unit_range(tensor: &ImageTensor) -> bool {
        tensor.iter().all(|v| (0.0..=1.0).contains(v))
    }

    #[test]
    fn rgba_is_resized_to_model_shape() {
        let img = RgbaImage::from_fn(100, 100, |x, y| Rgba([x as u8, y as u8, 200, 10]));
        let tensor = preprocess(&encode(DynamicImage::ImageRgba8(img))).unwrap();

        assert_eq!(tensor.dim(), (1, 512, 512, 3));
        assert!(in_unit_range(&tensor));
    }

    #[test]
    fn grayscale_is_expanded_to_three_channels() {
        let img = GrayImage::from_pixel(37, 800, Luma([128]));
        let tensor = preprocess(&encode(DynamicImage::ImageLuma8(img))).unwrap();

        assert_eq!(tensor.dim(), (1, 512, 512, 3));
        let expected = 128.0 / 255.0;
        for c in 0..3 {
            assert!((tensor[[0, 256, 256, c]] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn extremes_map_to_unit_bounds() {
        let white = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 0]));
        let tensor = preprocess(&encode(DynamicImage::ImageRgba8(white))).unwrap();
        assert!(tensor.iter().all(|v| (*v - 1.0).abs() < 1e-6));

        let black = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        let tensor = preprocess(&encode(DynamicImage::ImageRgba8(black))).unwrap();
        assert!(tensor.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn same_bytes_same_tensor() {
        let img = RgbaImage::from_fn(61, 29, |x, y| Rgba([(x * 4) as u8, (y * 8) as u8, 7, 255]));
        let bytes = encode(DynamicImage::ImageRgba8(img));

        assert_eq!(preprocess(&bytes).unwrap(), preprocess(&bytes).unwrap());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = preprocess(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ImageError::Unsupported(_)));
    }
}
