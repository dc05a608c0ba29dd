use log::debug;

use super::CaptureEngine;
use crate::CameraError;
use crate::backend::{CaptureDevice, MediaType, TorchMode};
use crate::media::Point;
use crate::properties::{DeviceOrientation, ExposureMode, FlashMode, FocusMode};

const SET_FLASH_MODE_FAILED: &str = "setFlashModeFailed";
const SET_EXPOSURE_POINT_FAILED: &str = "setExposurePointFailed";
const SET_FOCUS_POINT_FAILED: &str = "setFocusPointFailed";

impl CaptureEngine {
    /// Lock the device, apply `change`, unlock.
    pub(super) fn configure<F>(&self, change: F) -> Result<(), CameraError>
    where
        F: FnOnce(&dyn CaptureDevice),
    {
        self.device.lock_for_configuration()?;
        change(&*self.device);
        self.device.unlock_for_configuration();
        Ok(())
    }

    /// Switch the flash mode.
    ///
    /// Torch mode lights the torch right away; any other mode turns it off.
    ///
    /// # Errors
    /// A `setFlashModeFailed` capability error when the hardware lacks the
    /// torch, the flash or the specific flash mode.
    pub fn set_flash_mode(&mut self, mode: FlashMode) -> Result<(), CameraError> {
        if mode == FlashMode::Torch {
            if !self.device.has_torch() {
                return Err(CameraError::capability(SET_FLASH_MODE_FAILED, "Device does not support torch mode"));
            }
            if !self.device.is_torch_available() {
                return Err(CameraError::capability(
                    SET_FLASH_MODE_FAILED,
                    "Torch mode is currently not available",
                ));
            }
            if self.device.torch_mode() != TorchMode::On {
                self.configure(|device| device.set_torch_mode(TorchMode::On))?;
            }
        } else {
            if !self.device.has_flash() {
                return Err(CameraError::capability(
                    SET_FLASH_MODE_FAILED,
                    "Device does not have flash capabilities",
                ));
            }
            let supported = self.photo_output.supported_flash_modes();
            if !mode.device_flash_mode().is_some_and(|flash| supported.contains(&flash)) {
                return Err(CameraError::capability(
                    SET_FLASH_MODE_FAILED,
                    "Device does not support this specific flash mode",
                ));
            }
            if self.device.torch_mode() != TorchMode::Off {
                self.configure(|device| device.set_torch_mode(TorchMode::Off))?;
            }
        }
        self.flash_mode = mode;
        Ok(())
    }

    /// Switch the exposure mode and apply it.
    ///
    /// # Errors
    /// Fails when the device cannot be locked for configuration.
    pub fn set_exposure_mode(&mut self, mode: ExposureMode) -> Result<(), CameraError> {
        self.exposure_mode = mode;
        self.apply_exposure_mode()
    }

    fn apply_exposure_mode(&self) -> Result<(), CameraError> {
        self.configure(|device| {
            if let Some(mode) = self.exposure_mode.device_mode(|mode| device.is_exposure_mode_supported(mode)) {
                device.set_exposure_mode(mode);
            }
        })
    }

    /// Switch the focus mode and apply it.
    ///
    /// # Errors
    /// Fails when the device cannot be locked for configuration.
    pub fn set_focus_mode(&mut self, mode: FocusMode) -> Result<(), CameraError> {
        self.focus_mode = mode;
        self.apply_focus_mode()
    }

    fn apply_focus_mode(&self) -> Result<(), CameraError> {
        self.configure(|device| {
            if let Some(mode) = self.focus_mode.device_mode(|mode| device.is_focus_mode_supported(mode)) {
                device.set_focus_mode(mode);
            }
        })
    }

    /// Meter exposure at `point`, given in preview coordinates.
    ///
    /// # Errors
    /// A `setExposurePointFailed` capability error when the device has no
    /// exposure point of interest.
    pub fn set_exposure_point(&mut self, point: Point) -> Result<(), CameraError> {
        if !self.device.is_exposure_point_of_interest_supported() {
            return Err(CameraError::capability(
                SET_EXPOSURE_POINT_FAILED,
                "Device does not have exposure point capabilities",
            ));
        }
        let point = self.device_orientation.remap_point(point);
        self.configure(|device| device.set_exposure_point_of_interest(point))?;
        self.apply_exposure_mode()
    }

    /// Focus at `point`, given in preview coordinates.
    ///
    /// # Errors
    /// A `setFocusPointFailed` capability error when the device has no focus
    /// point of interest.
    pub fn set_focus_point(&mut self, point: Point) -> Result<(), CameraError> {
        if !self.device.is_focus_point_of_interest_supported() {
            return Err(CameraError::capability(
                SET_FOCUS_POINT_FAILED,
                "Device does not have focus point capabilities",
            ));
        }
        let point = self.device_orientation.remap_point(point);
        self.configure(|device| device.set_focus_point_of_interest(point))?;
        self.apply_focus_mode()
    }

    /// Smallest exposure bias the device accepts.
    #[must_use]
    pub fn min_exposure_offset(&self) -> f32 {
        self.device.min_exposure_target_bias()
    }

    /// Largest exposure bias the device accepts.
    #[must_use]
    pub fn max_exposure_offset(&self) -> f32 {
        self.device.max_exposure_target_bias()
    }

    /// Exposure bias increment. Zero means any value in range.
    pub const EXPOSURE_OFFSET_STEP_SIZE: f64 = 0.0;

    /// Bias exposure by `offset` EV and return the applied value.
    ///
    /// # Errors
    /// Fails when the device cannot be locked for configuration.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_exposure_offset(&mut self, offset: f64) -> Result<f64, CameraError> {
        self.configure(|device| device.set_exposure_target_bias(offset as f32))?;
        Ok(offset)
    }

    /// Smallest zoom factor.
    #[must_use]
    pub fn min_zoom_level(&self) -> f64 {
        self.device.min_available_video_zoom_factor()
    }

    /// Largest zoom factor.
    #[must_use]
    pub fn max_zoom_level(&self) -> f64 {
        self.device.max_available_video_zoom_factor()
    }

    /// Zoom to `zoom`.
    ///
    /// # Errors
    /// [`CameraError::ZoomOutOfRange`] when `zoom` lies outside the device's
    /// range. The device is left untouched in that case.
    pub fn set_zoom_level(&mut self, zoom: f64) -> Result<(), CameraError> {
        let (min, max) = (self.min_zoom_level(), self.max_zoom_level());
        if !(min..=max).contains(&zoom) {
            return Err(CameraError::ZoomOutOfRange {
                min,
                max,
                requested: zoom,
            });
        }
        self.configure(|device| device.set_video_zoom_factor(zoom))
    }

    /// Record a new device orientation and re-orient the outputs.
    pub fn set_device_orientation(&mut self, orientation: DeviceOrientation) {
        if self.device_orientation == orientation {
            return;
        }
        self.device_orientation = orientation;
        self.update_orientation();
    }

    /// Capture in `orientation` regardless of how the device is held.
    pub fn lock_capture_orientation(&mut self, orientation: DeviceOrientation) {
        if self.locked_orientation != Some(orientation) {
            self.locked_orientation = Some(orientation);
            self.update_orientation();
        }
    }

    /// Follow the device orientation again.
    pub fn unlock_capture_orientation(&mut self) {
        self.locked_orientation = None;
        self.update_orientation();
    }

    /// Apply the effective orientation to the photo and video connections.
    ///
    /// Skipped while recording so a file never changes orientation midway.
    pub(super) fn update_orientation(&self) {
        if self.recording.is_some() {
            return;
        }
        let orientation = self.locked_orientation.unwrap_or(self.device_orientation);
        debug!("orienting {} for {orientation:?}", self.camera_name);
        let connections = [
            self.photo_output.connection(MediaType::Video),
            self.video_output.connection(MediaType::Video),
        ];
        for connection in connections.into_iter().flatten() {
            if connection.is_video_orientation_supported() {
                connection.set_video_orientation(orientation.video_orientation());
            }
        }
    }
}
