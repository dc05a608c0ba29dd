//! Wire-level camera settings and their mapping onto backend values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CameraError;
use crate::backend::{DeviceExposureMode, DeviceFlashMode, DeviceFocusMode, VideoOrientation};
use crate::media::{PixelFormat, Point};

macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            /// The name used on the wire.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = CameraError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(CameraError::InvalidArgument {
                        kind: $kind,
                        value: value.to_owned(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Flash behaviour for photo capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlashMode {
    /// Never fire.
    Off,
    /// Fire when the scene needs it.
    Auto,
    /// Always fire.
    Always,
    /// Keep the torch lit continuously.
    Torch,
}

wire_enum!(FlashMode, "flash mode", {
    Off => "off",
    Auto => "auto",
    Always => "always",
    Torch => "torch",
});

impl FlashMode {
    /// The still-capture flash mode, `None` for torch.
    #[must_use]
    pub const fn device_flash_mode(self) -> Option<DeviceFlashMode> {
        match self {
            Self::Off => Some(DeviceFlashMode::Off),
            Self::Auto => Some(DeviceFlashMode::Auto),
            Self::Always => Some(DeviceFlashMode::On),
            Self::Torch => None,
        }
    }
}

/// Exposure behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExposureMode {
    /// Continuously adjust, or one-shot when continuous is unavailable.
    #[default]
    Auto,
    /// Hold the current exposure.
    Locked,
}

wire_enum!(ExposureMode, "exposure mode", {
    Auto => "auto",
    Locked => "locked",
});

impl ExposureMode {
    /// The backend mode to apply on a device with the given support.
    #[must_use]
    pub fn device_mode(self, supports: impl Fn(DeviceExposureMode) -> bool) -> Option<DeviceExposureMode> {
        match self {
            Self::Locked => Some(DeviceExposureMode::Locked),
            Self::Auto if supports(DeviceExposureMode::ContinuousAutoExposure) => {
                Some(DeviceExposureMode::ContinuousAutoExposure)
            }
            Self::Auto => Some(DeviceExposureMode::AutoExpose),
        }
    }
}

/// Focus behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusMode {
    /// Continuously refocus, or one-shot when continuous is unavailable.
    #[default]
    Auto,
    /// Hold the current focus.
    Locked,
}

wire_enum!(FocusMode, "focus mode", {
    Auto => "auto",
    Locked => "locked",
});

impl FocusMode {
    /// The backend mode to apply, `None` when the device supports neither auto mode.
    #[must_use]
    pub fn device_mode(self, supports: impl Fn(DeviceFocusMode) -> bool) -> Option<DeviceFocusMode> {
        match self {
            Self::Locked => Some(DeviceFocusMode::Locked),
            Self::Auto if supports(DeviceFocusMode::ContinuousAutoFocus) => Some(DeviceFocusMode::ContinuousAutoFocus),
            Self::Auto if supports(DeviceFocusMode::AutoFocus) => Some(DeviceFocusMode::AutoFocus),
            Self::Auto => None,
        }
    }
}

/// Physical orientation of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceOrientation {
    /// Orientation is not known.
    Unknown,
    /// Upright, home button at the bottom.
    #[default]
    Portrait,
    /// Upside down.
    PortraitUpsideDown,
    /// Rotated with the top to the left.
    LandscapeLeft,
    /// Rotated with the top to the right.
    LandscapeRight,
    /// Lying flat, screen up.
    FaceUp,
    /// Lying flat, screen down.
    FaceDown,
}

impl DeviceOrientation {
    /// Whether the device is lying flat.
    #[must_use]
    pub const fn is_flat(self) -> bool {
        matches!(self, Self::FaceUp | Self::FaceDown)
    }

    /// Name sent to the host in orientation events.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::PortraitUpsideDown => "portraitDown",
            Self::LandscapeLeft => "landscapeLeft",
            Self::LandscapeRight => "landscapeRight",
            Self::Portrait | Self::Unknown | Self::FaceUp | Self::FaceDown => "portraitUp",
        }
    }

    /// Parse a capture orientation lock request.
    ///
    /// # Errors
    /// Returns [`CameraError::InvalidArgument`] for unrecognized names.
    pub fn from_wire_name(name: &str) -> Result<Self, CameraError> {
        match name {
            "portraitUp" => Ok(Self::Portrait),
            "portraitDown" => Ok(Self::PortraitUpsideDown),
            "landscapeLeft" => Ok(Self::LandscapeLeft),
            "landscapeRight" => Ok(Self::LandscapeRight),
            _ => Err(CameraError::InvalidArgument {
                kind: "orientation",
                value: name.to_owned(),
            }),
        }
    }

    /// Connection orientation for video and photo output.
    ///
    /// The landscape cases cross over because the device rotates opposite to
    /// the captured image.
    #[must_use]
    pub const fn video_orientation(self) -> VideoOrientation {
        match self {
            Self::PortraitUpsideDown => VideoOrientation::PortraitUpsideDown,
            Self::LandscapeLeft => VideoOrientation::LandscapeRight,
            Self::LandscapeRight => VideoOrientation::LandscapeLeft,
            _ => VideoOrientation::Portrait,
        }
    }

    /// Map a point in view coordinates to the sensor's coordinate space.
    #[must_use]
    pub fn remap_point(self, point: Point) -> Point {
        let Point { x, y } = point;
        match self {
            Self::Portrait => Point::new(y, 1.0 - x),
            Self::PortraitUpsideDown => Point::new(1.0 - y, x),
            Self::LandscapeRight => Point::new(1.0 - x, 1.0 - y),
            _ => point,
        }
    }
}

/// Requested capture quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionPreset {
    /// 352x288.
    #[default]
    VeryLow,
    /// 352x288.
    Low,
    /// 640x480.
    Medium,
    /// 1280x720.
    High,
    /// 1920x1080.
    VeryHigh,
    /// 3840x2160.
    UltraHigh,
    /// The best the device offers.
    Max,
}

wire_enum!(ResolutionPreset, "resolution preset", {
    VeryLow => "veryLow",
    Low => "low",
    Medium => "medium",
    High => "high",
    VeryHigh => "veryHigh",
    UltraHigh => "ultraHigh",
    Max => "max",
});

/// Pixel layout requested by the host for preview and streamed frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageFormatGroup {
    /// Packed BGRA.
    Bgra8888,
    /// Bi-planar 4:2:0.
    #[default]
    Yuv420,
}

wire_enum!(ImageFormatGroup, "image format group", {
    Bgra8888 => "bgra8888",
    Yuv420 => "yuv420",
});

impl ImageFormatGroup {
    /// The matching output pixel format.
    #[must_use]
    pub const fn pixel_format(self) -> PixelFormat {
        match self {
            Self::Bgra8888 => PixelFormat::Bgra8888,
            Self::Yuv420 => PixelFormat::Yuv420BiPlanar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        assert_eq!("always".parse::<FlashMode>().unwrap(), FlashMode::Always);
        assert_eq!("locked".parse::<FocusMode>().unwrap(), FocusMode::Locked);
        assert_eq!("ultraHigh".parse::<ResolutionPreset>().unwrap(), ResolutionPreset::UltraHigh);
        assert_eq!("yuv420".parse::<ImageFormatGroup>().unwrap(), ImageFormatGroup::Yuv420);
        assert!(matches!(
            "strobe".parse::<FlashMode>(),
            Err(CameraError::InvalidArgument { kind: "flash mode", .. })
        ));
    }

    #[test]
    fn torch_has_no_still_flash_mode() {
        assert_eq!(FlashMode::Torch.device_flash_mode(), None);
        assert_eq!(FlashMode::Always.device_flash_mode(), Some(DeviceFlashMode::On));
    }

    #[test]
    fn auto_focus_prefers_continuous() {
        assert_eq!(
            FocusMode::Auto.device_mode(|_| true),
            Some(DeviceFocusMode::ContinuousAutoFocus)
        );
        assert_eq!(
            FocusMode::Auto.device_mode(|mode| mode == DeviceFocusMode::AutoFocus),
            Some(DeviceFocusMode::AutoFocus)
        );
        assert_eq!(FocusMode::Auto.device_mode(|_| false), None);
        assert_eq!(FocusMode::Locked.device_mode(|_| false), Some(DeviceFocusMode::Locked));
    }

    #[test]
    fn auto_exposure_falls_back_to_one_shot() {
        assert_eq!(
            ExposureMode::Auto.device_mode(|_| false),
            Some(DeviceExposureMode::AutoExpose)
        );
    }

    #[test]
    fn landscape_orientations_cross_over() {
        assert_eq!(
            DeviceOrientation::LandscapeLeft.video_orientation(),
            VideoOrientation::LandscapeRight
        );
        assert_eq!(
            DeviceOrientation::LandscapeRight.video_orientation(),
            VideoOrientation::LandscapeLeft
        );
        assert_eq!(DeviceOrientation::FaceUp.video_orientation(), VideoOrientation::Portrait);
    }

    #[test]
    fn point_remapping_table() {
        let point = Point::new(0.25, 0.75);
        assert_eq!(DeviceOrientation::Portrait.remap_point(point), Point::new(0.75, 0.75));
        assert_eq!(
            DeviceOrientation::PortraitUpsideDown.remap_point(point),
            Point::new(0.25, 0.25)
        );
        assert_eq!(DeviceOrientation::LandscapeRight.remap_point(point), Point::new(0.75, 0.25));
        assert_eq!(DeviceOrientation::LandscapeLeft.remap_point(point), point);
    }

    #[test]
    fn orientation_names_round_trip() {
        for orientation in [
            DeviceOrientation::Portrait,
            DeviceOrientation::PortraitUpsideDown,
            DeviceOrientation::LandscapeLeft,
            DeviceOrientation::LandscapeRight,
        ] {
            assert_eq!(
                DeviceOrientation::from_wire_name(orientation.wire_name()).unwrap(),
                orientation
            );
        }
        assert!(DeviceOrientation::from_wire_name("sideways").is_err());
    }
}
