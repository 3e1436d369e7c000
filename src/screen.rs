use thiserror::Error;
use xcap::Monitor;

/// Widest model-space image the planner is asked to reason over.
pub const MODEL_MAX_WIDTH: u32 = 1280;
/// Tallest model-space image the planner is asked to reason over.
pub const MODEL_MAX_HEIGHT: u32 = 800;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("No display found")]
    NoMonitors,
    #[error("Failed to probe display: {0}")]
    ProbeError(String),
}

/// Real display dimensions paired with the model-space dimensions they
/// scale to. Model space is the largest aspect-preserving fit inside
/// 1280x800; a screen already inside the budget keeps its aspect too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenGeometry {
    pub real_width: u32,
    pub real_height: u32,
    pub model_width: u32,
    pub model_height: u32,
}

impl ScreenGeometry {
    pub fn from_real(real_width: u32, real_height: u32) -> Self {
        let aspect = real_width as f64 / real_height as f64;
        let budget_aspect = MODEL_MAX_WIDTH as f64 / MODEL_MAX_HEIGHT as f64;

        // Wider than the budget: width is the binding axis, otherwise height
        let (model_width, model_height) = if aspect > budget_aspect {
            (
                MODEL_MAX_WIDTH,
                (MODEL_MAX_WIDTH as f64 / aspect).round() as u32,
            )
        } else {
            (
                (MODEL_MAX_HEIGHT as f64 * aspect).round() as u32,
                MODEL_MAX_HEIGHT,
            )
        };

        Self {
            real_width,
            real_height,
            model_width,
            model_height,
        }
    }
}

/// Maps a real-screen point into model space. Pure per-axis scaling; a
/// point outside the screen maps outside the model image, never clamped.
pub fn to_model_space(x: f64, y: f64, geometry: &ScreenGeometry) -> (f64, f64) {
    (
        x * geometry.model_width as f64 / geometry.real_width as f64,
        y * geometry.model_height as f64 / geometry.real_height as f64,
    )
}

/// Maps a model-space point onto the real screen. Inverse of
/// [`to_model_space`], and equally clamp-free.
pub fn to_real_space(x: f64, y: f64, geometry: &ScreenGeometry) -> (f64, f64) {
    (
        x * geometry.real_width as f64 / geometry.model_width as f64,
        y * geometry.real_height as f64 / geometry.model_height as f64,
    )
}

/// Live source of primary-display dimensions. Callers derive geometry
/// fresh on every use so a resolution change between steps is picked up.
pub trait DisplayProbe: Send + Sync {
    fn real_dimensions(&self) -> Result<(u32, u32), ScreenError>;

    fn geometry(&self) -> Result<ScreenGeometry, ScreenError> {
        let (width, height) = self.real_dimensions()?;
        Ok(ScreenGeometry::from_real(width, height))
    }
}

/// Probes the primary monitor via xcap, falling back to the first monitor
/// when none reports itself as primary.
pub struct PrimaryDisplayProbe;

impl DisplayProbe for PrimaryDisplayProbe {
    fn real_dimensions(&self) -> Result<(u32, u32), ScreenError> {
        let monitors = Monitor::all().map_err(|e| ScreenError::ProbeError(e.to_string()))?;

        let primary = monitors
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| Monitor::all().ok()?.into_iter().next())
            .ok_or(ScreenError::NoMonitors)?;

        let width = primary
            .width()
            .map_err(|e| ScreenError::ProbeError(e.to_string()))?;
        let height = primary
            .height()
            .map_err(|e| ScreenError::ProbeError(e.to_string()))?;
        Ok((width, height))
    }
}

/// Fixed-size probe for tests and headless runs.
pub struct FixedDisplayProbe(pub u32, pub u32);

impl DisplayProbe for FixedDisplayProbe {
    fn real_dimensions(&self) -> Result<(u32, u32), ScreenError> {
        Ok((self.0, self.1))
    }
}
