use bitflags::bitflags;
use num_complex::Complex64;

use crate::model::Color;

bitflags! {
    /// Which of the three formulas currently fail to compile.
    /// Any set bit blocks rendering.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ErrorMask: u8 {
        /// Iteration formula
        const FORMULA = 0x01;
        /// Palette-X formula
        const PALETTE_X = 0x02;
        /// Palette-Y formula
        const PALETTE_Y = 0x04;
    }
}

/// The three formula slots a renderer owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaTarget {
    /// Complex-valued `z` update.
    Iteration,
    /// Real-valued palette column.
    PaletteX,
    /// Real-valued palette row.
    PaletteY,
}

impl FormulaTarget {
    pub const ALL: [FormulaTarget; 3] = [Self::Iteration, Self::PaletteX, Self::PaletteY];

    pub fn error_flag(self) -> ErrorMask {
        match self {
            Self::Iteration => ErrorMask::FORMULA,
            Self::PaletteX => ErrorMask::PALETTE_X,
            Self::PaletteY => ErrorMask::PALETTE_Y,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Iteration => "formula",
            Self::PaletteX => "palette-x",
            Self::PaletteY => "palette-y",
        }
    }
}

/// Viewport and iteration parameters for one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub center: (f64, f64),
    pub width: u32,
    pub height: u32,
    /// World units per pixel.
    pub scale: f64,
    pub max_iterations: u32,
    /// Escape limit, compared against the squared modulus.
    pub limit: f64,
    pub passes: u32,
    /// `Some` renders the Julia set for this constant.
    pub julia: Option<Complex64>,
}

impl RenderRequest {
    /// Number of passes actually run; at least one.
    pub fn pass_count(&self) -> u32 {
        self.passes.max(1)
    }

    /// Iteration budget for pass `pass`: `M >> 2(P-p-1)`, so each pass gets
    /// four times the budget of the one before and the last gets all of it.
    pub fn pass_budget(&self, pass: u32) -> u32 {
        let remaining = self.pass_count().saturating_sub(pass + 1);
        remaining
            .checked_mul(2)
            .and_then(|shift| self.max_iterations.checked_shr(shift))
            .unwrap_or(0)
    }

    /// World coordinate of pixel `(ix, iy)`.
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn pixel_coordinate(&self, ix: u32, iy: u32) -> Complex64 {
        let dx = i64::from(ix) - i64::from(self.width / 2);
        let dy = i64::from(iy) - i64::from(self.height / 2);
        Complex64::new(
            dx as f64 * self.scale + self.center.0,
            dy as f64 * self.scale + self.center.1,
        )
    }
}

/// One completed pass worth of pixels, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub pass: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl Frame {
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width {
            return None;
        }
        let idx = usize::try_from(u64::from(y) * u64::from(self.width) + u64::from(x)).ok()?;
        self.pixels.get(idx).copied()
    }

    /// Row-major RGBA8 bytes, fully opaque.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|c| c.to_rgba()).collect()
    }

    pub fn to_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.to_rgba8())
    }
}

/// How a render call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Every pass finished and was emitted.
    Completed,
    /// Aborted between scanlines by `cancel()`.
    Cancelled,
    /// A cancel was pending when the call began; nothing was rendered.
    Superseded,
    /// A formula failed to compile; no frames were produced.
    Rejected(ErrorMask),
}

/// Everything a render reports back to its host.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    ErrorMask(ErrorMask),
    /// Scanlines rendered so far, summed over passes.
    Progress(u64),
    Frame(Frame),
    Finished(RenderOutcome),
}

/// Receiver of render events.
pub trait RenderSink {
    fn emit(&mut self, event: RenderEvent);
}

impl RenderSink for Vec<RenderEvent> {
    fn emit(&mut self, event: RenderEvent) {
        self.push(event);
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn request(passes: u32) -> RenderRequest {
        RenderRequest {
            center: (0.0, 0.0),
            width: 4,
            height: 4,
            scale: 1.0,
            max_iterations: 64,
            limit: 4.0,
            passes,
            julia: None,
        }
    }

    #[test]
    fn pass_budgets_quadruple() {
        let r = request(3);
        assert_eq!(r.pass_budget(0), 4);
        assert_eq!(r.pass_budget(1), 16);
        assert_eq!(r.pass_budget(2), 64);
    }

    #[test]
    fn zero_passes_means_one() {
        let r = request(0);
        assert_eq!(r.pass_count(), 1);
        assert_eq!(r.pass_budget(0), 64);
    }

    #[test]
    fn huge_pass_count_gives_zero_budget_early() {
        let r = request(40);
        assert_eq!(r.pass_budget(0), 0);
        assert_eq!(r.pass_budget(39), 64);
    }

    #[test]
    fn pixel_coordinate_centers_on_half_size() {
        let mut r = request(1);
        r.center = (1.0, -2.0);
        r.scale = 0.5;
        assert_eq!(r.pixel_coordinate(2, 2), Complex64::new(1.0, -2.0));
        assert_eq!(r.pixel_coordinate(0, 3), Complex64::new(0.0, -1.5));
    }

    #[test]
    fn odd_sizes_use_integer_halves() {
        let mut r = request(1);
        r.width = 5;
        r.height = 3;
        assert_eq!(r.pixel_coordinate(2, 1), Complex64::new(0.0, 0.0));
    }

    #[test]
    fn frame_exports_rgba() {
        let frame = Frame {
            pass: 0,
            width: 2,
            height: 1,
            pixels: vec![Color::rgb(1, 2, 3), Color::rgb(4, 5, 6)],
        };
        assert_eq!(frame.to_rgba8(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
        assert_eq!(frame.pixel(1, 0), Some(Color::rgb(4, 5, 6)));
        assert_eq!(frame.pixel(2, 0), None);
        assert!(frame.to_image().is_some());
    }
}
