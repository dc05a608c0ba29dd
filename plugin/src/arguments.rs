//! Command argument shapes.

use lenskit_camera::media::Point;
use lenskit_camera::{
    CameraError, DeviceOrientation, ExposureMode, FlashMode, FocusMode, ImageFormatGroup, ResolutionPreset,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::PluginError;

/// Parse the arguments of `method`.
pub fn parse<T: DeserializeOwned>(method: &str, arguments: Value) -> Result<T, PluginError> {
    serde_json::from_value(arguments).map_err(|source| PluginError::Arguments {
        method: method.to_owned(),
        source,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArgs {
    pub camera_name: String,
    pub resolution_preset: String,
    #[serde(default)]
    pub enable_audio: bool,
}

impl CreateArgs {
    pub fn resolution_preset(&self) -> Result<ResolutionPreset, CameraError> {
        self.resolution_preset.parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeArgs {
    pub camera_id: i64,
    pub image_format_group: Option<String>,
}

impl InitializeArgs {
    /// `None` when the host keeps the current format.
    pub fn image_format_group(&self) -> Result<Option<ImageFormatGroup>, CameraError> {
        self.image_format_group.as_deref().map(str::parse).transpose()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraIdArgs {
    pub camera_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeArgs {
    pub mode: String,
}

impl ModeArgs {
    pub fn flash(&self) -> Result<FlashMode, CameraError> {
        self.mode.parse()
    }

    pub fn exposure(&self) -> Result<ExposureMode, CameraError> {
        self.mode.parse()
    }

    pub fn focus(&self) -> Result<FocusMode, CameraError> {
        self.mode.parse()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PointArgs {
    pub reset: bool,
    pub x: f64,
    pub y: f64,
}

impl PointArgs {
    /// The requested point, or the center on reset.
    pub const fn point(&self) -> Point {
        if self.reset { Point::CENTER } else { Point::new(self.x, self.y) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OffsetArgs {
    pub offset: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoomArgs {
    pub zoom: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrientationArgs {
    pub orientation: String,
}

impl OrientationArgs {
    pub fn orientation(&self) -> Result<DeviceOrientation, CameraError> {
        DeviceOrientation::from_wire_name(&self.orientation)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn create_arguments() {
        let args: CreateArgs = parse(
            "create",
            json!({"cameraName": "cam0", "resolutionPreset": "veryHigh", "enableAudio": true}),
        )
        .unwrap();

        assert_eq!(args.camera_name, "cam0");
        assert_eq!(args.resolution_preset().unwrap(), ResolutionPreset::VeryHigh);
        assert!(args.enable_audio);
    }

    #[test]
    fn unknown_preset_is_invalid() {
        let args: CreateArgs = parse("create", json!({"cameraName": "cam0", "resolutionPreset": "huge"})).unwrap();

        assert_eq!(args.resolution_preset().unwrap_err().code(), "InvalidArgument");
    }

    #[test]
    fn missing_fields_are_reported() {
        let error = parse::<ZoomArgs>("setZoomLevel", json!({})).unwrap_err();

        assert_eq!(error.code(), "InvalidArgument");
        assert!(error.to_string().starts_with("invalid arguments for setZoomLevel"));
    }

    #[test]
    fn format_group_is_strict() {
        let keep: InitializeArgs = parse("initialize", json!({"cameraId": 1})).unwrap();
        let bgra: InitializeArgs =
            parse("initialize", json!({"cameraId": 1, "imageFormatGroup": "bgra8888"})).unwrap();
        let bad: InitializeArgs = parse("initialize", json!({"cameraId": 1, "imageFormatGroup": "jpeg"})).unwrap();

        assert_eq!(keep.image_format_group().unwrap(), None);
        assert_eq!(bgra.image_format_group().unwrap(), Some(ImageFormatGroup::Bgra8888));
        assert!(bad.image_format_group().is_err());
    }

    #[test]
    fn reset_point_is_center() {
        let args: PointArgs = parse("setFocusPoint", json!({"reset": true, "x": 0.1})).unwrap();

        assert_eq!(args.point(), Point::CENTER);
    }
}
