use serde::{Deserialize, Serialize};

/// RGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear interpolation between two colors. t is clamped to [0, 1].
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let inv = 1.0 - t;
        Self {
            r: channel(f64::from(self.r) * inv + f64::from(other.r) * t),
            g: channel(f64::from(self.g) * inv + f64::from(other.g) * t),
            b: channel(f64::from(self.b) * inv + f64::from(other.b) * t),
        }
    }

    /// Blend four corner colors by fractional offsets `fx` (toward `c10`/`c11`)
    /// and `fy` (toward `c01`/`c11`).
    #[inline]
    pub fn bilinear(c00: Self, c10: Self, c01: Self, c11: Self, fx: f64, fy: f64) -> Self {
        let mix = |a: u8, b: u8, c: u8, d: u8| {
            let top = f64::from(a) + (f64::from(b) - f64::from(a)) * fx;
            let bottom = f64::from(c) + (f64::from(d) - f64::from(c)) * fx;
            channel(top + (bottom - top) * fy)
        };
        Self {
            r: mix(c00.r, c10.r, c01.r, c11.r),
            g: mix(c00.g, c10.g, c01.g, c11.g),
            b: mix(c00.b, c10.b, c01.b, c11.b),
        }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(v: f64) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_at_boundaries() {
        let a = Color::rgb(10, 20, 30);
        let b = Color::rgb(200, 100, 50);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
    }

    #[test]
    fn lerp_midpoint() {
        let result = Color::BLACK.lerp(Color::WHITE, 0.5);
        assert!((i16::from(result.r) - 127).abs() <= 1);
        assert!((i16::from(result.g) - 127).abs() <= 1);
        assert!((i16::from(result.b) - 127).abs() <= 1);
    }

    #[test]
    fn bilinear_corners_are_exact() {
        let c00 = Color::rgb(10, 0, 0);
        let c10 = Color::rgb(0, 20, 0);
        let c01 = Color::rgb(0, 0, 30);
        let c11 = Color::rgb(40, 40, 40);
        assert_eq!(Color::bilinear(c00, c10, c01, c11, 0.0, 0.0), c00);
        assert_eq!(Color::bilinear(c00, c10, c01, c11, 1.0, 0.0), c10);
        assert_eq!(Color::bilinear(c00, c10, c01, c11, 0.0, 1.0), c01);
        assert_eq!(Color::bilinear(c00, c10, c01, c11, 1.0, 1.0), c11);
    }

    #[test]
    fn bilinear_center_averages() {
        let result = Color::bilinear(
            Color::BLACK,
            Color::WHITE,
            Color::WHITE,
            Color::BLACK,
            0.5,
            0.5,
        );
        assert!((i16::from(result.r) - 127).abs() <= 1);
    }

    #[test]
    fn rgba_is_opaque() {
        assert_eq!(Color::rgb(1, 2, 3).to_rgba(), [1, 2, 3, 255]);
    }
}
