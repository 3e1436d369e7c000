use crate::screen::ScreenGeometry;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use thiserror::Error;
use xcap::Monitor;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No display found for screenshot")]
    NoDisplaySource,
    #[error("Failed to capture screen: {0}")]
    Backend(String),
    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Raw bitmap source for the primary display surface.
pub trait Capturer: Send + Sync {
    fn frame(&self) -> Result<RgbaImage, CaptureError>;
}

/// Captures the primary monitor via xcap, falling back to the first
/// monitor when none reports itself as primary.
pub struct PrimaryScreenCapturer;

impl Capturer for PrimaryScreenCapturer {
    fn frame(&self) -> Result<RgbaImage, CaptureError> {
        let monitors = Monitor::all().map_err(|e| CaptureError::Backend(e.to_string()))?;

        let primary = monitors
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| Monitor::all().ok()?.into_iter().next())
            .ok_or(CaptureError::NoDisplaySource)?;

        primary
            .capture_image()
            .map_err(|e| CaptureError::Backend(e.to_string()))
    }
}

/// Grabs a frame, downsamples it to model-space resolution and returns it
/// as a base64 PNG ready for the model request. Model dimensions are
/// derived from the frame itself so a resolution change between actions is
/// reflected in the next observation.
pub fn capture_observation(capturer: &dyn Capturer) -> Result<String, CaptureError> {
    let frame = capturer.frame()?;
    let geometry = ScreenGeometry::from_real(frame.width(), frame.height());

    let resized = image::imageops::resize(
        &frame,
        geometry.model_width,
        geometry.model_height,
        FilterType::Lanczos3,
    );

    let mut buffer = Cursor::new(Vec::new());
    resized.write_to(&mut buffer, ImageFormat::Png)?;

    Ok(STANDARD.encode(buffer.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFrameCapturer {
        width: u32,
        height: u32,
    }

    impl Capturer for FixedFrameCapturer {
        fn frame(&self) -> Result<RgbaImage, CaptureError> {
            Ok(RgbaImage::new(self.width, self.height))
        }
    }

    struct FailingCapturer;

    impl Capturer for FailingCapturer {
        fn frame(&self) -> Result<RgbaImage, CaptureError> {
            Err(CaptureError::NoDisplaySource)
        }
    }

    #[test]
    fn test_observation_is_model_space_png() {
        let capturer = FixedFrameCapturer {
            width: 1920,
            height: 1080,
        };
        let encoded = capture_observation(&capturer).unwrap();

        let bytes = STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 1280);
        assert_eq!(decoded.height(), 720);
    }

    #[test]
    fn test_missing_source_propagates() {
        let err = capture_observation(&FailingCapturer).unwrap_err();
        assert!(matches!(err, CaptureError::NoDisplaySource));
    }
}
