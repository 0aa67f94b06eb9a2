// THEORY:
// A `PixelBuffer` is one raw capture from the bead camera: a small, fixed-size
// grid of packed RGB565 pixels. It is a "dumb" data container in the same spirit
// as a chunk of pixels: it knows its geometry and how to hand out a decoded
// `Color` for a linear pixel index, nothing more. The sampler never walks the
// whole image, so decoding happens lazily, one requested pixel at a time.

use crate::core_modules::color::color::Color;
use crate::error::BufferError;

pub type PixelIndex = usize;

/// One sensor capture, row-major, stored as packed RGB565 words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u16>,
}

impl PixelBuffer {
    /// Builds a buffer from the raw sensor dump: two bytes per pixel, high byte first.
    pub fn from_rgb565_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, BufferError> {
        let expected = width as usize * height as usize * 2;
        if bytes.len() != expected {
            return Err(BufferError::LengthMismatch {
                width,
                height,
                expected,
                actual: bytes.len(),
            });
        }

        let pixels = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self { width, height, pixels })
    }

    /// A buffer where every pixel holds the same packed value.
    pub fn filled(width: u32, height: u32, packed: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![packed; width as usize * height as usize],
        }
    }

    /// Builds a buffer by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Color) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y).to_rgb565());
            }
        }
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Decoded color at a linear index. Panics if `index` is out of range; arcs
    /// are validated against the geometry before they are ever sampled.
    pub fn color_at(&self, index: PixelIndex) -> Color {
        Color::from_rgb565(self.pixels[index])
    }

    pub fn packed_at(&self, index: PixelIndex) -> u16 {
        self.pixels[index]
    }

    pub fn set_packed(&mut self, index: PixelIndex, packed: u16) {
        self.pixels[index] = packed;
    }

    pub fn index_of(&self, x: u32, y: u32) -> PixelIndex {
        y as usize * self.width as usize + x as usize
    }

    /// (column, row) of a linear index.
    pub fn coordinates(&self, index: PixelIndex) -> (u32, u32) {
        let width = self.width as usize;
        ((index % width) as u32, (index / width) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_big_endian_pairs() {
        // pixel 0 = 0xF800 (red), pixel 1 = 0x001F (blue)
        let bytes = [0xF8, 0x00, 0x00, 0x1F];
        let buffer = PixelBuffer::from_rgb565_bytes(2, 1, &bytes).expect("valid buffer");
        assert_eq!(buffer.color_at(0), Color::new(255, 0, 0));
        assert_eq!(buffer.color_at(1), Color::new(0, 0, 255));
    }

    #[test]
    fn rejects_short_capture() {
        let err = PixelBuffer::from_rgb565_bytes(40, 30, &[0u8; 100]).unwrap_err();
        assert_eq!(
            err,
            BufferError::LengthMismatch {
                width: 40,
                height: 30,
                expected: 2400,
                actual: 100
            }
        );
    }

    #[test]
    fn index_and_coordinates_agree() {
        let buffer = PixelBuffer::filled(40, 30, 0);
        let index = buffer.index_of(17, 21);
        assert_eq!(index, 21 * 40 + 17);
        assert_eq!(buffer.coordinates(index), (17, 21));
    }

    #[test]
    fn from_fn_is_row_major() {
        let buffer = PixelBuffer::from_fn(3, 2, |x, y| Color::new((x * 80) as u8, 0, if y == 1 { 255 } else { 0 }));
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.color_at(buffer.index_of(0, 1)).blue, 255);
        assert_eq!(buffer.color_at(buffer.index_of(2, 0)).blue, 0);
    }
}
