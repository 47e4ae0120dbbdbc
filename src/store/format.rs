//! On-disk image format of stored frames.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Encoding used for frame files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// Lossy JPEG.
    #[default]
    Jpeg,
    /// Lossless PNG.
    Png,
}

impl FrameFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "jpg",
            FrameFormat::Png => "png",
        }
    }

    /// MIME type of encoded frames.
    pub fn mime_type(self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "image/jpeg",
            FrameFormat::Png => "image/png",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            FrameFormat::Jpeg => ImageFormat::Jpeg,
            FrameFormat::Png => ImageFormat::Png,
        }
    }

    /// Encodes an image. JPEG drops the alpha channel.
    pub fn encode(self, image: &DynamicImage, jpeg_quality: u8) -> image::ImageResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            FrameFormat::Jpeg => {
                let rgb = image.to_rgb8();
                JpegEncoder::new_with_quality(&mut buf, jpeg_quality).encode_image(&rgb)?;
            }
            FrameFormat::Png => {
                image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
            }
        }
        Ok(buf)
    }

    /// Decodes bytes previously produced by [`FrameFormat::encode`].
    pub fn decode(self, bytes: &[u8]) -> image::ImageResult<DynamicImage> {
        image::load_from_memory_with_format(bytes, self.image_format())
    }
}
