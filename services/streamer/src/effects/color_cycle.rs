use std::time::Duration;
use types::Crgb;

use super::Effect;
use crate::surface::Canvas;

/// Rotates every pixel through the hue wheel
///
/// `spread` offsets the hue of each pixel from its neighbour, which turns a
/// plain fade into a moving rainbow. Hue is in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCycle {
    degrees_per_second: f64,
    spread: f64,
    brightness: f64,
}

impl ColorCycle {
    pub fn new(degrees_per_second: f64, spread: f64, brightness: f64) -> Self {
        Self {
            degrees_per_second,
            spread,
            brightness: brightness.clamp(0.0, 1.0),
        }
    }

    fn hue_at(&self, index: usize, elapsed: Duration) -> f64 {
        self.degrees_per_second * elapsed.as_secs_f64() + self.spread * index as f64
    }
}

impl Effect for ColorCycle {
    fn name(&self) -> &str {
        "ColorCycle"
    }

    fn render(&mut self, canvas: &mut Canvas<'_>, elapsed: Duration) {
        for index in 0..canvas.dot_count() {
            let color = Crgb::from_hsv(self.hue_at(index, elapsed), 1.0, self.brightness);
            canvas.set_pixel(index, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hue_advances_with_time() {
        let mut pixels = vec![Crgb::BLACK; 3];
        let mut effect = ColorCycle::new(120.0, 0.0, 1.0);

        effect.render(&mut Canvas::new(&mut pixels, 3, 1), Duration::ZERO);
        assert!(pixels.iter().all(|p| *p == Crgb::RED));

        effect.render(&mut Canvas::new(&mut pixels, 3, 1), Duration::from_secs(1));
        assert!(pixels.iter().all(|p| *p == Crgb::GREEN));
    }

    #[test]
    fn test_spread_offsets_neighbours() {
        let mut pixels = vec![Crgb::BLACK; 3];
        ColorCycle::new(0.0, 120.0, 1.0).render(&mut Canvas::new(&mut pixels, 3, 1), Duration::ZERO);
        assert_eq!(pixels, vec![Crgb::RED, Crgb::GREEN, Crgb::BLUE]);
    }
}
