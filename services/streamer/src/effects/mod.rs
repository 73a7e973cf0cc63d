//! Effects
//!
//! An effect draws one frame at a time onto a site's [`Canvas`]. The
//! scheduler calls [`Effect::start`] when an effect becomes the active one
//! and [`Effect::stop`] when it is replaced, each exactly once per change.

mod color_cycle;
mod solid;

pub use color_cycle::ColorCycle;
pub use solid::SolidColor;

use settings::EffectSettings;
use std::time::Duration;
use types::Crgb;

use crate::surface::Canvas;

/// A renderable light effect
pub trait Effect: Send {
    /// Display name, shown as the site's current effect
    fn name(&self) -> &str;

    fn start(&mut self) {}

    fn stop(&mut self) {}

    /// Draw a frame; `elapsed` is the time since this effect was started
    fn render(&mut self, canvas: &mut Canvas<'_>, elapsed: Duration);
}

/// Build one of the stock effects from its settings
pub fn build_effect(settings: &EffectSettings) -> Box<dyn Effect> {
    match settings {
        EffectSettings::Solid { color } => Box::new(SolidColor::new(Crgb::from(*color))),
        EffectSettings::ColorCycle {
            degrees_per_second,
            spread,
            brightness,
        } => Box::new(ColorCycle::new(*degrees_per_second, *spread, *brightness)),
    }
}
