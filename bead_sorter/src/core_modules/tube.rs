// THEORY:
// A `Tube` is one physical bin and the color cluster that feeds it. Tubes are
// created in order and never removed, so a tube's index doubles as its physical
// address: 15 slices around the chute, and rows that alternate between odd and
// even slices so neighbouring tubes never share a row.

use crate::core_modules::color::color::{distance, Color, Distance};

pub type TubeIndex = usize;

/// Number of slices the chute can reach on one row pair.
pub const SLICES_PER_ROW: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tube {
    index: TubeIndex,
    colors: Vec<Color>,
    count: u64,
}

impl Tube {
    /// A fresh tube holding its first bead.
    pub fn new(index: TubeIndex, color: Color) -> Self {
        Self {
            index,
            colors: vec![color],
            count: 1,
        }
    }

    pub fn index(&self) -> TubeIndex {
        self.index
    }

    /// Representative colors, first one is the color the tube was created for.
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Distance from `color` to the closest of this tube's representative colors.
    pub fn min_distance(&self, color: Color) -> Distance {
        self.colors
            .iter()
            .map(|&c| distance(color, c))
            .min()
            .unwrap_or(Distance::MAX)
    }

    pub(crate) fn add_bead(&mut self) {
        self.count += 1;
    }

    pub(crate) fn widen(&mut self, color: Color) {
        self.colors.push(color);
    }

    pub fn row(&self) -> usize {
        row_for(self.index)
    }

    pub fn slice(&self) -> usize {
        slice_for(self.index)
    }
}

/// Hopper row for a tube index.
pub fn row_for(index: TubeIndex) -> usize {
    ((index / SLICES_PER_ROW) << 1) | ((index % SLICES_PER_ROW) & 1)
}

/// Chute slice for a tube index.
pub fn slice_for(index: TubeIndex) -> usize {
    index % SLICES_PER_ROW
}
