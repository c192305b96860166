use std::fmt;

use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgba};

use crate::error::{Error, Result};

/// One raw image buffer read from the driver.
#[derive(Clone, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    pixel_format: String,
    buffer_number: u32,
    timestamp: DateTime<Utc>,
}

impl Frame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        pixel_format: impl Into<String>,
        buffer_number: u32,
    ) -> Self {
        Frame {
            data,
            width,
            height,
            pixel_format: pixel_format.into(),
            buffer_number,
            timestamp: Utc::now(),
        }
    }

    /// Raw buffer contents, as laid out by the camera.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format name reported by the camera, e.g. `Mono8`.
    pub fn pixel_format(&self) -> &str {
        &self.pixel_format
    }

    /// Cumulative buffer number the data was read from.
    pub fn buffer_number(&self) -> u32 {
        self.buffer_number
    }

    /// When the buffer was read out of the driver.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn unsupported(&self) -> Error {
        Error::UnsupportedPixelFormat(self.pixel_format.clone())
    }

    fn exact(&self, bytes_per_pixel: usize) -> Result<&[u8]> {
        self.data
            .get(..self.pixels() * bytes_per_pixel)
            .ok_or_else(|| Error::InvalidArgument {
                name: "data",
                reason: format!(
                    "{} bytes is too short for a {}x{} {} image",
                    self.data.len(),
                    self.width,
                    self.height,
                    self.pixel_format
                ),
            })
    }

    /// Convert the buffer into an [`image::DynamicImage`].
    ///
    /// Supports 8-bit and little-endian 10/12/16-bit monochrome, and 8-bit
    /// RGB, BGR and BGRA packed formats.
    pub fn to_image(&self) -> Result<DynamicImage> {
        let (width, height) = (self.width, self.height);
        let format = self.pixel_format.replace([' ', '_', '-'], "").to_ascii_lowercase();
        let image = match format.as_str() {
            "mono8" => ImageBuffer::<Luma<u8>, _>::from_raw(width, height, self.exact(1)?.to_vec())
                .map(DynamicImage::ImageLuma8),
            "mono10" | "mono12" | "mono16" => {
                let data = self
                    .exact(2)?
                    .chunks_exact(2)
                    .map(|px| u16::from_le_bytes([px[0], px[1]]))
                    .collect::<Vec<u16>>();
                ImageBuffer::<Luma<u16>, _>::from_raw(width, height, data)
                    .map(DynamicImage::ImageLuma16)
            }
            "rgb8" | "rgb8packed" => {
                ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, self.exact(3)?.to_vec())
                    .map(DynamicImage::ImageRgb8)
            }
            "bgr8" | "bgr8packed" => {
                let data = self
                    .exact(3)?
                    .chunks_exact(3)
                    .flat_map(|px| [px[2], px[1], px[0]])
                    .collect::<Vec<u8>>();
                ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data)
                    .map(DynamicImage::ImageRgb8)
            }
            "bgra8" | "bgra8packed" => {
                let data = self
                    .exact(4)?
                    .chunks_exact(4)
                    .flat_map(|px| [px[2], px[1], px[0], px[3]])
                    .collect::<Vec<u8>>();
                ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, data)
                    .map(DynamicImage::ImageRgba8)
            }
            _ => return Err(self.unsupported()),
        };
        image.ok_or_else(|| self.unsupported())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_format", &self.pixel_format)
            .field("buffer_number", &self.buffer_number)
            .field("len", &self.data.len())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_mono8() {
        let frame = Frame::new((0..12).collect(), 4, 3, "Mono8", 7);
        let img = frame.to_image().unwrap();
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 3);
        assert_eq!(img.as_luma8().unwrap().get_pixel(1, 2).0, [9]);
        assert_eq!(frame.buffer_number(), 7);
    }

    #[test]
    fn test_mono16_little_endian() {
        let frame = Frame::new(vec![0x34, 0x12, 0xFF, 0x00], 2, 1, "Mono 16", 0);
        let img = frame.to_image().unwrap();
        let luma = img.as_luma16().unwrap();
        assert_eq!(luma.get_pixel(0, 0).0, [0x1234]);
        assert_eq!(luma.get_pixel(1, 0).0, [0x00FF]);
    }

    #[test]
    fn test_bgra_swaps_channels() {
        let frame = Frame::new(vec![1, 2, 3, 4], 1, 1, "BGRA8Packed", 0);
        let img = frame.to_image().unwrap();
        assert_eq!(img.as_rgba8().unwrap().get_pixel(0, 0).0, [3, 2, 1, 4]);
    }

    #[test]
    fn test_unsupported_and_short() {
        let frame = Frame::new(vec![0; 4], 2, 2, "BayerRG8", 0);
        assert_eq!(
            frame.to_image().unwrap_err(),
            Error::UnsupportedPixelFormat("BayerRG8".to_string())
        );
        let frame = Frame::new(vec![0; 3], 2, 2, "Mono8", 0);
        assert!(matches!(frame.to_image(), Err(Error::InvalidArgument { .. })));
    }
}
