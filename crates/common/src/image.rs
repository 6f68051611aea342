//! Image value types shared between readers and the frame pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel storage format.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA, four bytes per pixel.
    #[default]
    Rgba8,
    /// 8-bit RGB, three bytes per pixel.
    Rgb8,
    /// 8-bit luminance, one byte per pixel.
    L8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgb8 => 3,
            Self::L8 => 1,
        }
    }
}

/// Scanline layout of decoded pixel data.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanlineOrder {
    /// First row in memory is the top of the image.
    #[default]
    TopDown,
    /// First row in memory is the bottom of the image (GL-style).
    BottomUp,
}

/// Image resolution in pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const HD: Self = Self {
        width: 1920,
        height: 1080,
    };
    pub const UHD: Self = Self {
        width: 3840,
        height: 2160,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Descriptor for one video stream / image plane.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageInfo {
    pub size: Resolution,
    pub format: PixelFormat,
    pub layout: ScanlineOrder,
}

impl ImageInfo {
    pub fn new(size: Resolution, format: PixelFormat) -> Self {
        Self {
            size,
            format,
            layout: ScanlineOrder::TopDown,
        }
    }

    /// Total byte size of a frame with this descriptor.
    pub fn byte_size(self) -> usize {
        self.size.pixel_count() as usize * self.format.bytes_per_pixel()
    }
}

/// A decoded image: descriptor plus pixel bytes.
///
/// Shared between the scheduler and callers as `Arc<Image>`; readers may
/// reuse a caller-provided buffer when its descriptor matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    info: ImageInfo,
    data: Vec<u8>,
}

impl Image {
    /// Allocate a zeroed image.
    pub fn new(info: ImageInfo) -> Self {
        Self {
            info,
            data: vec![0; info.byte_size()],
        }
    }

    pub fn info(&self) -> ImageInfo {
        self.info
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
