use lenskit_camera::backend::{CaptureBackend, DevicePosition, DeviceType, MediaType};
use serde::Serialize;

/// Which way a camera points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    /// Towards the user.
    Front,
    /// Away from the user.
    Back,
    /// Neither, e.g. a plugged in camera.
    External,
}

impl From<DevicePosition> for LensFacing {
    fn from(position: DevicePosition) -> Self {
        match position {
            DevicePosition::Front => Self::Front,
            DevicePosition::Back => Self::Back,
            DevicePosition::Unspecified => Self::External,
        }
    }
}

/// One entry of the `availableCameras` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraDescription {
    /// Device identifier, passed back in `create`.
    pub name: String,
    /// Lens direction.
    pub lens_facing: LensFacing,
    /// Sensor rotation in degrees.
    pub sensor_orientation: i64,
}

/// Wide angle, telephoto and ultra wide cameras, in discovery order.
pub fn available_cameras(backend: &dyn CaptureBackend, sensor_orientation: i64) -> Vec<CameraDescription> {
    let device_types = [
        DeviceType::BuiltInWideAngle,
        DeviceType::BuiltInTelephoto,
        DeviceType::BuiltInUltraWide,
    ];
    backend
        .discovery_session(&device_types, MediaType::Video, None)
        .devices()
        .into_iter()
        .map(|device| CameraDescription {
            name: device.unique_id(),
            lens_facing: device.position().into(),
            sensor_orientation,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use lenskit_camera::fake::{BACK_CAMERA, FRONT_CAMERA, FakeBackend, FakeDevice};
    use serde_json::json;

    use super::*;

    #[test]
    fn lists_every_camera_with_facing() {
        let backend = FakeBackend::with_cameras();
        backend.add_device(FakeDevice::new("usb", DevicePosition::Unspecified));

        let cameras = available_cameras(&*backend, 90);

        assert_eq!(
            serde_json::to_value(cameras).unwrap(),
            json!([
                {"name": BACK_CAMERA, "lensFacing": "back", "sensorOrientation": 90},
                {"name": FRONT_CAMERA, "lensFacing": "front", "sensorOrientation": 90},
                {"name": "usb", "lensFacing": "external", "sensorOrientation": 90},
            ])
        );
    }
}
