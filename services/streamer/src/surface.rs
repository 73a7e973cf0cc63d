//! Drawing Surface
//!
//! [`Canvas`] is what effects draw on: a width × height view over the locked
//! pixel buffer of a site. Row 0 of the `(x, y)` addressing is the bottom
//! row of the installation, so `y` is flipped against buffer order.
//! Reads outside the surface return black and writes outside it are ignored.

use types::Crgb;

/// Mutable view over a site's pixels
pub struct Canvas<'a> {
    pixels: &'a mut [Crgb],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    /// `pixels` is expected to hold `width * height` entries
    pub fn new(pixels: &'a mut [Crgb], width: u32, height: u32) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        Self {
            pixels,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of pixels
    pub fn dot_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[Crgb] {
        self.pixels
    }

    fn index_xy(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let row = self.height - 1 - y;
        Some(row as usize * self.width as usize + x as usize)
    }

    pub fn get_pixel(&self, index: usize) -> Crgb {
        self.pixels.get(index).copied().unwrap_or(Crgb::BLACK)
    }

    pub fn set_pixel(&mut self, index: usize, color: Crgb) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    pub fn get_pixel_xy(&self, x: u32, y: u32) -> Crgb {
        self.index_xy(x, y)
            .map_or(Crgb::BLACK, |index| self.pixels[index])
    }

    pub fn set_pixel_xy(&mut self, x: u32, y: u32, color: Crgb) {
        if let Some(index) = self.index_xy(x, y) {
            self.pixels[index] = color;
        }
    }

    /// Add `color` onto the pixel, saturating each channel
    pub fn blend_pixel(&mut self, index: usize, color: Crgb) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = *pixel + color;
        }
    }

    pub fn fill_solid(&mut self, color: Crgb) {
        self.pixels.fill(color);
    }

    /// Dim every pixel toward black by `amount` (0.0..=1.0)
    pub fn fade_all_by(&mut self, amount: f64) {
        for pixel in self.pixels.iter_mut() {
            *pixel = pixel.fade_to_black_by(amount);
        }
    }

    /// Blend a run of `count` pixels starting at fractional position `position`
    ///
    /// Partially covered pixels at either end get the color scaled by their
    /// coverage, so a dot can move smoothly between whole pixels.
    pub fn draw_pixels(&mut self, position: f64, count: f64, color: Crgb) {
        if !position.is_finite() || !count.is_finite() || count <= 0.0 {
            return;
        }

        let dots = self.dot_count() as f64;
        let in_range = |p: f64| p >= 0.0 && p < dots;

        let available_first = 1.0 - (position - position.trunc());
        let amount_first = available_first.min(count);
        let mut remaining = count.min(dots - position);
        let mut position = position;

        if in_range(position) {
            self.blend_pixel(position as usize, color.fade_to_black_by(1.0 - amount_first));
        }

        position += amount_first;
        remaining -= amount_first;

        while remaining >= 1.0 && position < dots {
            if in_range(position) {
                self.blend_pixel(position as usize, color);
                remaining -= 1.0;
            }
            position += 1.0;
        }

        if remaining > 0.0 && in_range(position) {
            self.blend_pixel(position as usize, color.fade_to_black_by(1.0 - remaining));
        }
    }
}
