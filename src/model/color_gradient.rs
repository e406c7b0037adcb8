use serde::{Deserialize, Serialize};

use super::color::Color;

/// A color stop at a position along the gradient [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub position: f64,
    pub color: Color,
}

/// Piecewise-linear RGB gradient, used to describe palettes in settings files.
/// Stops are always sorted by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorGradientRaw")]
pub struct ColorGradient {
    stops: Vec<ColorStop>,
}

#[derive(Deserialize)]
struct ColorGradientRaw {
    stops: Vec<ColorStop>,
}

impl TryFrom<ColorGradientRaw> for ColorGradient {
    type Error = String;
    fn try_from(raw: ColorGradientRaw) -> Result<Self, String> {
        ColorGradient::new(raw.stops)
            .ok_or_else(|| "gradient requires at least 1 stop".to_string())
    }
}

impl ColorGradient {
    /// Create a gradient from stops. Requires at least 1 stop.
    /// Positions are clamped to [0, 1] and sorted.
    pub fn new(mut stops: Vec<ColorStop>) -> Option<Self> {
        if stops.is_empty() {
            return None;
        }
        for s in &mut stops {
            s.position = s.position.clamp(0.0, 1.0);
        }
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        Some(Self { stops })
    }

    /// Gradient between two colors.
    pub fn two_color(start: Color, end: Color) -> Self {
        Self {
            stops: vec![
                ColorStop { position: 0.0, color: start },
                ColorStop { position: 1.0, color: end },
            ],
        }
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Evaluate the gradient at a position (clamped to [0, 1]).
    pub fn evaluate(&self, pos: f64) -> Color {
        let pos = pos.clamp(0.0, 1.0);

        // first stop strictly past pos
        let idx = self.stops.partition_point(|s| s.position <= pos);
        let (Some(a), Some(b)) = (
            idx.checked_sub(1).and_then(|i| self.stops.get(i)),
            self.stops.get(idx),
        ) else {
            // before the first stop or after the last
            return self
                .stops
                .get(idx.min(self.stops.len().saturating_sub(1)))
                .map_or(Color::BLACK, |s| s.color);
        };

        let dp = b.position - a.position;
        if dp <= 0.0 {
            return a.color;
        }
        a.color.lerp(b.color, (pos - a.position) / dp)
    }

    /// `count` evenly spaced samples from 0 to 1 inclusive.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(&self, count: usize) -> Vec<Color> {
        match count {
            0 => Vec::new(),
            1 => vec![self.evaluate(0.0)],
            _ => {
                let last = (count - 1) as f64;
                (0..count).map(|i| self.evaluate(i as f64 / last)).collect()
            }
        }
    }
}

impl Default for ColorGradient {
    fn default() -> Self {
        Self::two_color(Color::BLACK, Color::rgb(255, 255, 0))
    }
}
