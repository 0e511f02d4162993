// Camera module for webcam acquisition and frame capture

use crate::config::CameraSettings;
use crate::error::{OverlayError, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use tracing::{error, info, warn};

/// An open camera stream that can hand out the current frame
///
/// Dropping the source releases the underlying device.
pub trait FrameSource {
    /// Captures the most recent frame
    fn capture_frame(&mut self) -> Result<RgbImage>;

    /// Native stream resolution as (width, height)
    fn resolution(&self) -> (u32, u32);
}

/// Requests access to a camera
pub trait CameraOpener {
    fn open(&self) -> Result<Box<dyn FrameSource>>;
}

/// Opens the system webcam through nokhwa
#[derive(Clone, Debug)]
pub struct NokhwaOpener {
    settings: CameraSettings,
}

impl NokhwaOpener {
    pub fn new(settings: CameraSettings) -> Self {
        Self { settings }
    }
}

impl CameraOpener for NokhwaOpener {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(NokhwaCamera::open(&self.settings)?))
    }
}

/// Owns a nokhwa camera with an open stream
pub struct NokhwaCamera {
    camera: Camera,
    resolution: (u32, u32),
}

impl NokhwaCamera {
    /// Opens the first working camera and starts its stream
    pub fn open(settings: &CameraSettings) -> Result<Self> {
        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(settings.width, settings.height),
                FrameFormat::YUYV,
                settings.fps,
            ),
        ));

        // Some systems start numbering devices at 1
        let mut camera = Self::try_open_camera(0, requested_format)
            .or_else(|_| Self::try_open_camera(1, requested_format))
            .map_err(|e| {
                error!("Failed to open camera after trying multiple indices: {}", e);
                e
            })?;

        camera.open_stream()?;

        let res = camera.resolution();
        let resolution = (res.width(), res.height());
        info!(
            "Camera '{}' streaming at {}x{}",
            camera.info().human_name(),
            resolution.0,
            resolution.1
        );

        Ok(Self { camera, resolution })
    }

    fn try_open_camera(index: u32, requested_format: RequestedFormat) -> Result<Camera> {
        Camera::new(CameraIndex::Index(index), requested_format).map_err(OverlayError::from)
    }

    /// Lists available camera devices
    pub fn list_devices() -> Result<Vec<String>> {
        let devices = nokhwa::query(nokhwa::utils::ApiBackend::Auto)?;
        Ok(devices
            .iter()
            .map(|info| info.human_name().to_string())
            .collect())
    }
}

impl FrameSource for NokhwaCamera {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        let frame_data = self
            .camera
            .frame()
            .map_err(|e| OverlayError::FrameCapture(format!("Failed to capture frame: {e}")))?;

        let buffer = frame_data
            .decode_image::<RgbFormat>()
            .map_err(|e| OverlayError::FrameCapture(format!("Failed to decode frame: {e}")))?;

        let (width, height) = (buffer.width(), buffer.height());
        RgbImage::from_raw(width, height, buffer.into_raw()).ok_or_else(|| {
            OverlayError::FrameCapture(format!("Frame buffer does not match {width}x{height}"))
        })
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("Error stopping camera stream: {}", e);
        } else {
            info!("Camera stream released");
        }
    }
}
