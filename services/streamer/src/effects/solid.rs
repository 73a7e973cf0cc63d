use std::time::Duration;
use types::Crgb;

use super::Effect;
use crate::surface::Canvas;

/// Fills the whole surface with one color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolidColor {
    color: Crgb,
}

impl SolidColor {
    pub fn new(color: Crgb) -> Self {
        Self { color }
    }

    pub fn color(&self) -> Crgb {
        self.color
    }
}

impl Effect for SolidColor {
    fn name(&self) -> &str {
        "SolidColor"
    }

    fn render(&mut self, canvas: &mut Canvas<'_>, _elapsed: Duration) {
        canvas.fill_solid(self.color);
    }
}
