mod screenshot;

pub use screenshot::{capture_observation, CaptureError, Capturer, PrimaryScreenCapturer};
