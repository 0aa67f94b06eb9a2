// THEORY:
// The `pipeline` module is the classification half of the sorter as a single
// entry point: one raw capture in, one tube assignment out. It chains the two
// stateful pieces, the `BeadLocator` (which color is this bead?) and the
// `ClusterStore` (which tube does that color belong to?). The motion sequencer
// and the offline replay tools both go through here, so the two always agree
// on how a bead is classified.

use crate::config::SorterConfig;
use crate::core_modules::bead_locator::{BeadLocator, BeadSample};
use crate::core_modules::cluster_store::ClusterStore;
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::Result;

// Re-export key data structures for the public API.
pub use crate::core_modules::cluster_store::{Assignment, AssignmentOutcome, OverflowPolicy};
pub use crate::core_modules::color::color::Color;
pub use crate::core_modules::tube::{Tube, TubeIndex};

/// Everything learned about one bead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub sample: BeadSample,
    pub assignment: Assignment,
}

impl Classification {
    pub fn color(&self) -> Color {
        self.sample.color
    }

    pub fn tube(&self) -> TubeIndex {
        self.assignment.tube
    }
}

pub struct BeadClassifier {
    locator: BeadLocator,
    store: ClusterStore,
}

impl BeadClassifier {
    /// Builds the locator grid and an empty tube store. Fails on an invalid
    /// config, including a candidate arc that would leave the image.
    pub fn new(config: &SorterConfig) -> Result<Self> {
        config.validate()?;
        let locator = BeadLocator::new(config.image.width, config.image.height, &config.candidate_starts())?;
        let clustering = &config.clustering;
        let store = ClusterStore::new(clustering.max_tubes, clustering.threshold, clustering.overflow);
        Ok(Self { locator, store })
    }

    pub fn classify(&mut self, buffer: &PixelBuffer) -> Result<Classification> {
        let sample = self.locator.sample(buffer)?;
        let assignment = self.store.assign(sample.color);
        tracing::debug!(
            color = %sample.color,
            tube = assignment.tube,
            outcome = ?assignment.outcome,
            nearest = ?assignment.nearest_distance,
            "classified bead"
        );
        Ok(Classification { sample, assignment })
    }

    pub fn locator(&self) -> &BeadLocator {
        &self.locator
    }

    pub fn tubes(&self) -> &[Tube] {
        self.store.tubes()
    }

    pub fn store(&self) -> &ClusterStore {
        &self.store
    }
}
