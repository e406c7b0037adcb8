use std::fs;
use std::path::Path;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::engine::{FormulaTarget, FractalRenderer, RenderHandle, RenderRequest};
use crate::error::AppError;
use crate::formula::CompileError;
use crate::model::{ColorGradient, Palette};

/// Display name of the built-in preset that `FractalSettings::default()` describes.
pub const STANDARD_PRESET_NAME: &str = "Standard Mandelbrot";

/// Samples taken when a gradient is turned into a palette row.
pub const GRADIENT_PALETTE_WIDTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JuliaConstant {
    pub re: f64,
    pub im: f64,
}

impl From<JuliaConstant> for Complex64 {
    fn from(k: JuliaConstant) -> Self {
        Complex64::new(k.re, k.im)
    }
}

/// Everything needed to reproduce a render apart from the output size.
///
/// Missing fields in a settings file fall back to the standard preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalSettings {
    pub name: String,
    pub formula: String,
    pub palette_x: String,
    pub palette_y: String,
    pub interior_col0: bool,
    pub interior_row0: bool,
    pub limit: f64,
    pub center: (f64, f64),
    pub scale: f64,
    pub iterations: u32,
    pub passes: u32,
    pub julia: Option<JuliaConstant>,
    /// Palette row built from stops; `None` means the default ramp.
    pub gradient: Option<ColorGradient>,
}

impl Default for FractalSettings {
    fn default() -> Self {
        Self {
            name: STANDARD_PRESET_NAME.to_string(),
            formula: "z^2+c".to_string(),
            palette_x: "n/m*(w-1)".to_string(),
            palette_y: "0".to_string(),
            interior_col0: true,
            interior_row0: false,
            limit: 4.0,
            center: (-0.637_011, -0.039_515_9),
            scale: 0.004_038_97,
            iterations: 100,
            passes: 2,
            julia: None,
            gradient: None,
        }
    }
}

impl FractalSettings {
    fn formulas(&self) -> [(FormulaTarget, &str); 3] {
        [
            (FormulaTarget::Iteration, self.formula.as_str()),
            (FormulaTarget::PaletteX, self.palette_x.as_str()),
            (FormulaTarget::PaletteY, self.palette_y.as_str()),
        ]
    }

    /// Compile all three formulas and set palette and interior flags.
    ///
    /// Every formula is attempted; the first compile error is returned after
    /// the renderer's error mask reflects all of them.
    pub fn apply_to(&self, renderer: &mut FractalRenderer) -> Result<(), CompileError> {
        let mut first_error = None;
        for (target, source) in self.formulas() {
            if let Err(e) = renderer.compile(target, source) {
                first_error.get_or_insert(e);
            }
        }
        renderer.set_palette(self.build_palette());
        renderer.set_interior_flags(self.interior_col0, self.interior_row0);
        first_error.map_or(Ok(()), Err)
    }

    /// Queue the same setup on a worker. Compile failures arrive as error-mask events.
    pub fn apply_to_worker(&self, handle: &RenderHandle) -> Result<(), AppError> {
        for (target, source) in self.formulas() {
            handle.compile(target, source)?;
        }
        handle.set_palette(self.build_palette())?;
        handle.set_interior_flags(self.interior_col0, self.interior_row0)
    }

    pub fn build_palette(&self) -> Palette {
        match &self.gradient {
            Some(g) => Palette::from_gradient(g, GRADIENT_PALETTE_WIDTH),
            None => Palette::default(),
        }
    }

    pub fn render_request(&self, width: u32, height: u32) -> RenderRequest {
        RenderRequest {
            center: self.center,
            width,
            height,
            scale: self.scale,
            max_iterations: self.iterations,
            limit: self.limit,
            passes: self.passes,
            julia: self.julia.map(Complex64::from),
        }
    }

    /// Reject values no render could make sense of.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(AppError::validation(format!("scale must be positive, got {}", self.scale)));
        }
        if !self.limit.is_finite() || self.limit < 0.0 {
            return Err(AppError::validation(format!("limit must be non-negative, got {}", self.limit)));
        }
        if !(self.center.0.is_finite() && self.center.1.is_finite()) {
            return Err(AppError::validation("center must be finite"));
        }
        Ok(())
    }
}

/// Load settings from a JSON file.
pub fn load_settings(path: &Path) -> Result<FractalSettings, AppError> {
    let data = fs::read_to_string(path)?;
    let settings: FractalSettings = serde_json::from_str(&data)?;
    settings.validate()?;
    tracing::debug!(path = %path.display(), name = %settings.name, "settings loaded");
    Ok(settings)
}
