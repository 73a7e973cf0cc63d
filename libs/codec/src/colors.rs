//! Pixel slice to device byte conversion

use types::Crgb;

use crate::error::{CodecError, Result};

/// Extract `length` pixels starting at `offset` as packed RGB bytes
///
/// `reversed` emits the pixels last-to-first and `red_green_swap` exchanges
/// the first two channels of every pixel. Both transforms apply to the
/// extracted copy; the source buffer is never modified.
pub fn color_bytes_at_offset(
    pixels: &[Crgb],
    offset: usize,
    length: usize,
    reversed: bool,
    red_green_swap: bool,
) -> Result<Vec<u8>> {
    let end = offset.checked_add(length).ok_or(CodecError::OutOfBounds {
        offset,
        end: usize::MAX,
        len: pixels.len(),
    })?;
    let slice = pixels.get(offset..end).ok_or(CodecError::OutOfBounds {
        offset,
        end,
        len: pixels.len(),
    })?;

    let mut out = Vec::with_capacity(length * 3);
    let mut push = |pixel: &Crgb| {
        let pixel = if red_green_swap {
            pixel.with_red_green_swapped()
        } else {
            *pixel
        };
        out.extend_from_slice(&[pixel.r, pixel.g, pixel.b]);
    };

    if reversed {
        slice.iter().rev().for_each(&mut push);
    } else {
        slice.iter().for_each(&mut push);
    }

    Ok(out)
}

/// Unpack RGB triplets, ignoring any incomplete trailing pixel
pub fn colors_from_bytes(bytes: &[u8]) -> Vec<Crgb> {
    bytes
        .chunks_exact(3)
        .map(|rgb| Crgb::new(rgb[0], rgb[1], rgb[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Vec<Crgb> {
        vec![
            Crgb::new(1, 2, 3),
            Crgb::new(4, 5, 6),
            Crgb::new(7, 8, 9),
        ]
    }

    #[test]
    fn test_forward_extraction() {
        let bytes = color_bytes_at_offset(&ramp(), 1, 2, false, false).unwrap();
        assert_eq!(bytes, vec![4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_reversed_extraction() {
        let bytes = color_bytes_at_offset(&ramp(), 0, 3, true, false).unwrap();
        assert_eq!(bytes, vec![7, 8, 9, 4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn test_swap_with_reverse() {
        let pixels = ramp();
        let bytes = color_bytes_at_offset(&pixels, 0, 2, true, true).unwrap();
        assert_eq!(bytes, vec![5, 4, 6, 2, 1, 3]);
        // Source untouched
        assert_eq!(pixels, ramp());
    }

    #[test]
    fn test_out_of_bounds() {
        assert_eq!(
            color_bytes_at_offset(&ramp(), 2, 5, false, false),
            Err(CodecError::OutOfBounds {
                offset: 2,
                end: 7,
                len: 3
            })
        );
        assert!(color_bytes_at_offset(&ramp(), usize::MAX, 2, false, false).is_err());
        assert!(color_bytes_at_offset(&ramp(), 3, 0, false, false).unwrap().is_empty());
    }

    #[test]
    fn test_colors_from_bytes() {
        let colors = colors_from_bytes(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(colors, vec![Crgb::new(1, 2, 3), Crgb::new(4, 5, 6)]);
    }
}
