// THEORY:
// A bead sits in the capture pose as a small cylinder seen end-on. Its center is
// the hole, its top carries the specular highlight, and around it is the tray.
// Sampling a disk would mix all three. Instead we walk a fixed half-ring: up the
// left flank, across the top, down the right flank. With the right start pixel
// most of the arc lands on the bead's painted surface.
//
// Key steps:
// 1.  **Arc generation**: 19 pixels derived from a start index. The shape is
//     fixed, so it is materialized eagerly into an array and validated once
//     against the buffer geometry.
// 2.  **Outlier trimming**: Every point is compared to every other point (171
//     pairs). Points whose total distance to the rest is largest are the ones
//     sitting on background, hole or highlight; the 7 worst are dropped and 12
//     are kept.
// 3.  **Scoring**: The score is the sum of the kept points' totals. A low score
//     means the kept pixels agree with each other, i.e. the arc sat on one
//     uniformly colored surface.

use crate::core_modules::color::color::{distance, Distance};
use crate::core_modules::pixel_buffer::{PixelBuffer, PixelIndex};
use crate::error::GeometryError;

pub const ARC_LENGTH: usize = 19;
pub const RETAINED_POINTS: usize = 12;

/// Number of pixels the arc climbs on each flank before stepping diagonally.
const FLANK_STEPS: usize = 5;
/// Number of pixels walked along the top between the two diagonal steps.
const TOP_STEPS: usize = 6;
/// A start row must be strictly below this one.
const MIN_START_ROW: u32 = 7;
/// Columns the arc extends to the right of its start pixel.
const ARC_SPAN: u32 = (TOP_STEPS + 2) as u32;

pub type ArcScoreValue = u32;

/// The 19 pixel indices of one half-ring sample, in walk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleArc {
    start: PixelIndex,
    points: [PixelIndex; ARC_LENGTH],
}

impl SampleArc {
    /// Builds the arc for `start` in a `width`x`height` buffer, or reports why it
    /// would leave the buffer.
    pub fn around(start: PixelIndex, width: u32, height: u32) -> Result<Self, GeometryError> {
        let size = width as usize * height as usize;
        if start >= size {
            return Err(GeometryError::OutOfBounds { start, width, height });
        }

        let column = (start % width as usize) as u32;
        let row = (start / width as usize) as u32;

        if row <= MIN_START_ROW {
            return Err(GeometryError::TooCloseToTop {
                start,
                row,
                min_row: MIN_START_ROW,
            });
        }
        if column + ARC_SPAN >= width {
            return Err(GeometryError::TooCloseToRight { start, column, width });
        }

        let stride = width as usize;
        let mut points = [0; ARC_LENGTH];
        let mut next = 0;
        let mut idx = start;
        let mut push = |idx: PixelIndex| {
            points[next] = idx;
            next += 1;
        };

        push(idx);
        for _ in 0..FLANK_STEPS {
            idx -= stride;
            push(idx);
        }
        idx = idx - stride + 1;
        push(idx);
        for _ in 0..TOP_STEPS {
            idx += 1;
            push(idx);
        }
        idx = idx + stride + 1;
        push(idx);
        for _ in 0..FLANK_STEPS {
            idx += stride;
            push(idx);
        }

        Ok(Self { start, points })
    }

    pub fn start(&self) -> PixelIndex {
        self.start
    }

    pub fn points(&self) -> &[PixelIndex; ARC_LENGTH] {
        &self.points
    }

    /// Trims the arc down to its most self-consistent points and scores them.
    ///
    /// The buffer must have the geometry the arc was built for.
    pub fn score(&self, buffer: &PixelBuffer) -> ArcScore {
        let colors = self.points.map(|idx| buffer.color_at(idx));

        let mut totals: [Distance; ARC_LENGTH] = [0; ARC_LENGTH];
        for a in 0..ARC_LENGTH {
            for b in (a + 1)..ARC_LENGTH {
                let d = distance(colors[a], colors[b]);
                totals[a] += d;
                totals[b] += d;
            }
        }

        // Stable, so equal totals keep walk order.
        let mut order: [usize; ARC_LENGTH] = std::array::from_fn(|i| i);
        order.sort_by_key(|&i| totals[i]);

        let kept = &order[..RETAINED_POINTS];
        let retained = std::array::from_fn(|i| self.points[kept[i]]);
        let score = kept.iter().map(|&i| totals[i]).sum();

        ArcScore {
            start: self.start,
            retained,
            score,
        }
    }
}

/// The outcome of sampling one arc.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArcScore {
    /// Start pixel of the arc that produced this score.
    pub start: PixelIndex,
    /// The 12 pixels that survived trimming, most consistent first.
    pub retained: [PixelIndex; RETAINED_POINTS],
    /// Sum of the retained points' total distances. Lower is better.
    pub score: ArcScoreValue,
}

/// Builds the arc at `start` for this buffer and scores it.
pub fn score(buffer: &PixelBuffer, start: PixelIndex) -> Result<ArcScore, GeometryError> {
    let arc = SampleArc::around(start, buffer.width(), buffer.height())?;
    Ok(arc.score(buffer))
}
