//! Adler-32 checksum
//!
//! Carried big-endian in the container trailer, computed over the
//! uncompressed bytes.

const MOD_ADLER: u32 = 65_521;

/// Largest run of bytes that can be summed before `b` may overflow a u32
const NMAX: usize = 5_552;

/// Calculate the Adler-32 checksum of a complete buffer
pub fn adler32(data: &[u8]) -> u32 {
    let mut checksum = Adler32::new();
    checksum.update(data);
    checksum.finalize()
}

/// Streaming Adler-32 calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    pub fn update(&mut self, data: &[u8]) {
        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                self.a += u32::from(byte);
                self.b += self.a;
            }
            self.a %= MOD_ADLER;
            self.b %= MOD_ADLER;
        }
    }

    pub fn finalize(&self) -> u32 {
        (self.b << 16) | self.a
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}
