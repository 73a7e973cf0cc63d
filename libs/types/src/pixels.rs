//! Master Pixel Buffer
//!
//! A site owns exactly one [`PixelBuffer`]. The scheduler renders into it while
//! holding the lock, and any external reader (a visualizer, a status dump) takes
//! the same lock so it never observes a half-drawn frame. The buffer length is
//! fixed at `width * height` and never changes.

use crate::Crgb;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::sync::Arc;

/// Fixed-length, shareable, lock-protected pixel buffer
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Arc<Mutex<Vec<Crgb>>>,
}

impl PixelBuffer {
    /// Create a black buffer of `width * height` pixels
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: Arc::new(Mutex::new(vec![Crgb::BLACK; len])),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels (`width * height`)
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take exclusive access to the pixels
    ///
    /// The guard derefs to a slice, so callers can mutate pixels but not resize.
    pub fn lock(&self) -> MappedMutexGuard<'_, [Crgb]> {
        MutexGuard::map(self.pixels.lock(), |v| v.as_mut_slice())
    }

    /// Copy out a consistent view of the whole buffer
    pub fn snapshot(&self) -> Vec<Crgb> {
        self.pixels.lock().clone()
    }
}
