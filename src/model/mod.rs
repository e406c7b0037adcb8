pub mod color;
pub mod color_gradient;
pub mod palette;

// Re-export commonly used types at the model level.
pub use color::Color;
pub use color_gradient::{ColorGradient, ColorStop};
pub use palette::{load_palette, Palette};
