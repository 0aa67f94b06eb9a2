// THEORY:
// The `ClusterStore` is the sorter's only long-lived state: the growing list of
// tubes. It performs online, unsupervised clustering with a hard capacity. Each
// observed bead color is either close enough to an existing tube to join it, or
// it opens a new tube, until every tube is taken.
//
// Once the store is full a far-away color still has to go somewhere. Two
// policies exist and the choice is explicit in the config:
// -   `Widen` sends the bead to the tube it is *furthest* from and adds its color
//     to that tube's representatives. That tube's acceptance region grows to
//     absorb later misfits.
// -   `Nearest` drops the bead into the nearest tube and leaves its colors alone.
//
// The store has a single writer (the bead loop) and no concurrent readers.

use serde::Deserialize;

use crate::core_modules::color::color::{Color, Distance};
use crate::core_modules::tube::{Tube, TubeIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Assign to the furthest tube and add the color to its representatives.
    #[default]
    Widen,
    /// Assign to the nearest tube, representatives unchanged.
    Nearest,
}

/// Why a bead ended up in its tube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOutcome {
    /// Within the threshold of an existing tube.
    Matched,
    /// Opened a new tube.
    Created,
    /// The store was full and nothing was close enough.
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub tube: TubeIndex,
    pub outcome: AssignmentOutcome,
    /// Distance to the nearest tube before this bead was assigned. `None` for the very first bead.
    pub nearest_distance: Option<Distance>,
}

pub struct ClusterStore {
    tubes: Vec<Tube>,
    capacity: usize,
    threshold: Distance,
    overflow: OverflowPolicy,
}

impl ClusterStore {
    pub fn new(capacity: usize, threshold: Distance, overflow: OverflowPolicy) -> Self {
        Self {
            tubes: Vec::new(),
            capacity,
            threshold,
            overflow,
        }
    }

    pub fn tubes(&self) -> &[Tube] {
        &self.tubes
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.tubes.len() >= self.capacity
    }

    /// Total beads seen so far.
    pub fn bead_count(&self) -> u64 {
        self.tubes.iter().map(Tube::count).sum()
    }

    /// Places one observed bead and returns the tube it should be routed to.
    pub fn assign(&mut self, color: Color) -> Assignment {
        let nearest = self.nearest(color);

        if let Some((best, d)) = nearest {
            if d < self.threshold {
                self.tubes[best].add_bead();
                return Assignment {
                    tube: best,
                    outcome: AssignmentOutcome::Matched,
                    nearest_distance: Some(d),
                };
            }
        }

        let nearest_distance = nearest.map(|(_, d)| d);

        if !self.is_full() || self.tubes.is_empty() {
            let index = self.tubes.len();
            self.tubes.push(Tube::new(index, color));
            tracing::info!(tube = index, %color, ?nearest_distance, "created tube");
            return Assignment {
                tube: index,
                outcome: AssignmentOutcome::Created,
                nearest_distance,
            };
        }

        let tube = match self.overflow {
            OverflowPolicy::Widen => {
                let furthest = self.furthest(color);
                let tube = &mut self.tubes[furthest];
                tube.add_bead();
                tube.widen(color);
                tracing::warn!(
                    tube = furthest,
                    %color,
                    ?nearest_distance,
                    representatives = tube.colors().len(),
                    "store full; widened furthest tube"
                );
                furthest
            }
            OverflowPolicy::Nearest => {
                // The store is non-empty here, so `nearest` is set.
                let best = nearest.map_or(0, |(best, _)| best);
                self.tubes[best].add_bead();
                tracing::warn!(tube = best, %color, ?nearest_distance, "store full; assigned to nearest tube");
                best
            }
        };

        Assignment {
            tube,
            outcome: AssignmentOutcome::Overflow,
            nearest_distance,
        }
    }

    /// The tube closest to `color` and its distance. Ties go to the lower index.
    pub fn nearest(&self, color: Color) -> Option<(TubeIndex, Distance)> {
        self.tubes
            .iter()
            .map(|tube| (tube.index(), tube.min_distance(color)))
            .min_by_key(|&(_, d)| d)
    }

    /// The tube whose closest representative is furthest from `color`. Ties go
    /// to the lower index.
    fn furthest(&self, color: Color) -> TubeIndex {
        let mut furthest = (0, 0);
        for tube in &self.tubes {
            let d = tube.min_distance(color);
            if d > furthest.1 {
                furthest = (tube.index(), d);
            }
        }
        furthest.0
    }
}
