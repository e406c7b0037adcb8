use std::path::Path;

use super::color::Color;
use super::color_gradient::ColorGradient;
use crate::error::AppError;

/// Width of the built-in ramp palette.
pub const DEFAULT_PALETTE_WIDTH: usize = 256;

/// A `width × height` grid of colors, row-major.
///
/// Column 0 and row 0 double as the interior color band when the renderer's
/// interior flags are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    width: usize,
    height: usize,
    colors: Vec<Color>,
}

impl Palette {
    /// Returns `None` unless both dimensions are at least 1 and `colors`
    /// holds exactly `width * height` entries.
    pub fn new(width: usize, height: usize, colors: Vec<Color>) -> Option<Self> {
        if width == 0 || height == 0 || width.checked_mul(height)? != colors.len() {
            return None;
        }
        Some(Self { width, height, colors })
    }

    /// Single-row palette sampled from a gradient.
    pub fn from_gradient(gradient: &ColorGradient, width: usize) -> Self {
        let width = width.max(1);
        Self {
            width,
            height: 1,
            colors: gradient.sample(width),
        }
    }

    pub fn from_image(image: &image::RgbImage) -> Option<Self> {
        let colors = image.pixels().map(|p| Color::from(p.0)).collect();
        Self::new(
            usize::try_from(image.width()).ok()?,
            usize::try_from(image.height()).ok()?,
            colors,
        )
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Color at column `x`, row `y`. Out-of-range cells read as black.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Color {
        if x >= self.width {
            return Color::BLACK;
        }
        self.colors
            .get(y * self.width + x)
            .copied()
            .unwrap_or(Color::BLACK)
    }
}

/// 256×1 ramp from black to yellow.
impl Default for Palette {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        let colors = (0..DEFAULT_PALETTE_WIDTH)
            .map(|i| {
                let v = i as u8;
                Color::rgb(v, v, 0)
            })
            .collect();
        Self {
            width: DEFAULT_PALETTE_WIDTH,
            height: 1,
            colors,
        }
    }
}

/// Load a palette from any image file the `image` crate can decode.
pub fn load_palette(path: &Path) -> Result<Palette, AppError> {
    let image = image::open(path)?.to_rgb8();
    Palette::from_image(&image).ok_or_else(|| AppError::Validation {
        message: format!("palette image {} is empty", path.display()),
    })
}
