// THEORY:
// The bead never lands in exactly the same spot under the camera, so a single
// arc isn't enough. The locator owns a small grid of candidate start pixels
// around where the bead reliably sits, scores an arc at each, and trusts the
// arc whose retained pixels agree with each other the most. The bead's color is
// the quadratic mean of that arc's retained pixels.
//
// All candidate arcs are built and validated when the locator is constructed;
// a grid that would run off the image is a configuration mistake and never a
// per-capture failure.

use crate::core_modules::color::color::{mean, Color};
use crate::core_modules::pixel_buffer::{PixelBuffer, PixelIndex};
use crate::core_modules::sample_arc::{ArcScore, SampleArc};
use crate::error::{BufferError, GeometryError, Result};

/// The winning arc for one capture and the color it measured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeadSample {
    pub color: Color,
    pub arc: ArcScore,
}

pub struct BeadLocator {
    width: u32,
    height: u32,
    arcs: Vec<SampleArc>,
}

impl BeadLocator {
    /// Builds every candidate arc up front, failing on the first that doesn't fit.
    pub fn new(width: u32, height: u32, starts: &[PixelIndex]) -> std::result::Result<Self, GeometryError> {
        let arcs = starts
            .iter()
            .map(|&start| SampleArc::around(start, width, height))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { width, height, arcs })
    }

    /// Start pixels for every column in `columns` crossed with every row in
    /// `rows`, columns outermost.
    pub fn grid_starts(width: u32, columns: std::ops::Range<u32>, rows: std::ops::Range<u32>) -> Vec<PixelIndex> {
        columns
            .flat_map(|x| rows.clone().map(move |y| y as PixelIndex * width as PixelIndex + x as PixelIndex))
            .collect()
    }

    /// Representative color of the bead in `buffer`.
    pub fn locate(&self, buffer: &PixelBuffer) -> Result<Color> {
        Ok(self.sample(buffer)?.color)
    }

    /// Full locate result: the winning arc as well as the color.
    pub fn sample(&self, buffer: &PixelBuffer) -> Result<BeadSample> {
        if buffer.width() != self.width || buffer.height() != self.height {
            return Err(BufferError::GeometryMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: buffer.width(),
                height: buffer.height(),
            }
            .into());
        }

        let mut best: Option<ArcScore> = None;
        for arc in &self.arcs {
            let candidate = arc.score(buffer);
            tracing::trace!(start = candidate.start, score = candidate.score, "scored arc");
            // Strict comparison keeps the first arc on ties.
            if best.as_ref().is_none_or(|b| candidate.score < b.score) {
                best = Some(candidate);
            }
        }

        // An empty grid has nothing to sample and averages to black.
        let Some(arc) = best else {
            return Ok(BeadSample {
                color: Color::ZERO,
                arc: ArcScore::default(),
            });
        };

        let color = mean(arc.retained.iter().map(|&idx| buffer.color_at(idx)));
        tracing::debug!(start = arc.start, score = arc.score, %color, "located bead");
        Ok(BeadSample { color, arc })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SorterError;

    const W: u32 = 40;
    const H: u32 = 30;

    fn default_locator() -> BeadLocator {
        BeadLocator::new(W, H, &BeadLocator::grid_starts(W, 15..21, 18..22)).expect("grid fits")
    }

    #[test]
    fn grid_iterates_columns_outermost() {
        let starts = BeadLocator::grid_starts(W, 15..17, 18..20);
        assert_eq!(starts, vec![18 * 40 + 15, 19 * 40 + 15, 18 * 40 + 16, 19 * 40 + 16]);
    }

    #[test]
    fn rejects_a_grid_that_runs_off_the_image() {
        let starts = BeadLocator::grid_starts(W, 30..34, 18..20);
        assert!(matches!(
            BeadLocator::new(W, H, &starts),
            Err(GeometryError::TooCloseToRight { .. })
        ));
    }

    #[test]
    fn uniform_capture_returns_its_color() {
        let color = Color::from_rgb565(Color::new(180, 30, 60).to_rgb565());
        let buffer = PixelBuffer::filled(W, H, color.to_rgb565());
        let sample = default_locator().sample(&buffer).expect("matching geometry");
        assert_eq!(sample.arc.score, 0);
        assert_eq!(sample.color, color);
    }

    #[test]
    fn uniform_capture_ties_resolve_to_first_candidate() {
        let buffer = PixelBuffer::filled(W, H, 0x1234);
        let sample = default_locator().sample(&buffer).expect("matching geometry");
        assert_eq!(sample.arc.start, 18 * 40 + 15);
    }

    #[test]
    fn picks_the_arc_that_sits_on_the_bead() {
        // A green ring drawn exactly where the (17, 20) arc walks; noise elsewhere.
        let green = Color::from_rgb565(Color::new(30, 200, 40).to_rgb565());
        let ring = SampleArc::around((20 * W + 17) as usize, W, H).expect("valid");
        let mut buffer = PixelBuffer::from_fn(W, H, |x, y| {
            Color::new(((x * 37 + y * 11) % 256) as u8, ((x * 13) % 256) as u8, ((y * 29) % 256) as u8)
        });
        for &idx in ring.points() {
            buffer.set_packed(idx, green.to_rgb565());
        }

        let sample = default_locator().sample(&buffer).expect("matching geometry");
        assert_eq!(sample.arc.start, ring.start());
        assert_eq!(sample.color, green);
    }

    #[test]
    fn rejects_capture_of_the_wrong_size() {
        let buffer = PixelBuffer::filled(20, 20, 0);
        assert!(matches!(
            default_locator().locate(&buffer),
            Err(SorterError::Buffer(BufferError::GeometryMismatch { .. }))
        ));
    }
}
