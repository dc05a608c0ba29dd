//! Timestamps, pixel buffers and sample buffers flowing out of the backend.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A presentation timestamp or duration, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct MediaTime(i64);

impl MediaTime {
    /// Time zero.
    pub const ZERO: Self = Self(0);

    /// Create a time from nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Create a time from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Nanoseconds since the clock's origin.
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Seconds as a float.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Whether this is exactly zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for MediaTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for MediaTime {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for MediaTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

/// Pixel layouts the video output can be asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Packed 32-bit BGRA.
    #[default]
    Bgra8888,
    /// Bi-planar 4:2:0 Y'CbCr, video range.
    Yuv420BiPlanar,
}

impl PixelFormat {
    /// The four character code identifying this format on the wire.
    #[must_use]
    pub const fn four_cc(self) -> u32 {
        match self {
            Self::Bgra8888 => u32::from_be_bytes(*b"BGRA"),
            Self::Yuv420BiPlanar => u32::from_be_bytes(*b"420v"),
        }
    }
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A normalized point, both axes in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// The centre of the frame.
    pub const CENTER: Self = Self { x: 0.5, y: 0.5 };

    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One plane of image data.
#[derive(Clone, PartialEq, Eq)]
pub struct Plane {
    bytes_per_row: usize,
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Plane {
    /// Create a plane from its raw bytes.
    #[must_use]
    pub const fn new(bytes_per_row: usize, width: usize, height: usize, data: Vec<u8>) -> Self {
        Self {
            bytes_per_row,
            width,
            height,
            data,
        }
    }

    /// Row stride in bytes.
    #[must_use]
    pub const fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    /// Width of the plane in samples.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height of the plane in rows.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Raw bytes, `bytes_per_row * height` long when well formed.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plane")
            .field("bytes_per_row", &self.bytes_per_row)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.data.len())
            .finish()
    }
}

struct PixelBufferInner {
    width: usize,
    height: usize,
    format: PixelFormat,
    planar: bool,
    planes: Vec<Plane>,
}

/// A reference counted image produced by the video output.
///
/// Cloning shares the underlying pixels.
#[derive(Clone)]
pub struct PixelBuffer(Arc<PixelBufferInner>);

impl PixelBuffer {
    /// A packed buffer with a single plane.
    #[must_use]
    pub fn packed(width: usize, height: usize, format: PixelFormat, bytes_per_row: usize, data: Vec<u8>) -> Self {
        Self(Arc::new(PixelBufferInner {
            width,
            height,
            format,
            planar: false,
            planes: vec![Plane::new(bytes_per_row, width, height, data)],
        }))
    }

    /// A planar buffer, e.g. luma followed by interleaved chroma.
    #[must_use]
    pub fn planar(width: usize, height: usize, format: PixelFormat, planes: Vec<Plane>) -> Self {
        Self(Arc::new(PixelBufferInner {
            width,
            height,
            format,
            planar: true,
            planes,
        }))
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.0.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.0.height
    }

    /// Pixel layout.
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.0.format
    }

    /// Whether the image is stored as separate planes.
    #[must_use]
    pub fn is_planar(&self) -> bool {
        self.0.planar
    }

    /// The planes of this image. Packed buffers have exactly one.
    #[must_use]
    pub fn planes(&self) -> &[Plane] {
        &self.0.planes
    }

    /// Whether both handles refer to the same pixels.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.0.width)
            .field("height", &self.0.height)
            .field("format", &self.0.format)
            .field("planes", &self.0.planes.len())
            .finish_non_exhaustive()
    }
}

/// A timestamped media sample delivered by a data output.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    presentation_time: MediaTime,
    duration: MediaTime,
    data_ready: bool,
    image: Option<PixelBuffer>,
    audio: Option<Arc<[u8]>>,
}

impl SampleBuffer {
    /// A video sample carrying an image.
    #[must_use]
    pub fn video(image: PixelBuffer, presentation_time: MediaTime) -> Self {
        Self {
            presentation_time,
            duration: MediaTime::ZERO,
            data_ready: true,
            image: Some(image),
            audio: None,
        }
    }

    /// An audio sample. `duration` may be zero when unknown.
    #[must_use]
    pub fn audio(data: impl Into<Arc<[u8]>>, presentation_time: MediaTime, duration: MediaTime) -> Self {
        Self {
            presentation_time,
            duration,
            data_ready: true,
            image: None,
            audio: Some(data.into()),
        }
    }

    /// Mark the sample's data as not yet ready.
    #[must_use]
    pub fn not_ready(mut self) -> Self {
        self.data_ready = false;
        self
    }

    /// Presentation timestamp.
    #[must_use]
    pub const fn presentation_time(&self) -> MediaTime {
        self.presentation_time
    }

    /// Duration, zero when unknown.
    #[must_use]
    pub const fn duration(&self) -> MediaTime {
        self.duration
    }

    /// Whether the sample's data can be read.
    #[must_use]
    pub const fn is_data_ready(&self) -> bool {
        self.data_ready
    }

    /// The image, for video samples.
    #[must_use]
    pub const fn image_buffer(&self) -> Option<&PixelBuffer> {
        self.image.as_ref()
    }

    /// The encoded audio payload, for audio samples.
    #[must_use]
    pub fn audio_data(&self) -> Option<&[u8]> {
        self.audio.as_deref()
    }

    /// A copy of this sample shifted earlier by `offset`.
    #[must_use]
    pub fn with_time_offset(&self, offset: MediaTime) -> Self {
        Self {
            presentation_time: self.presentation_time - offset,
            ..self.clone()
        }
    }
}
