// THEORY:
// This file is the main entry point for the `bead_sorter` library crate.
//
// The sorter is built in layers, leaves first:
// -   `core_modules` holds the classification core: the redmean color metric,
//     raw RGB565 captures, the 19-point sample arc, the bead locator and the
//     bounded tube store.
// -   `pipeline` chains locator and store into one `BeadClassifier`.
// -   `motion` and `sequencer` turn a tube assignment into timed servo moves and
//     run the perceive -> classify -> route loop.
// -   `hardware` defines the camera and actuator seams plus the replay/logging
//     stand-ins used for dry runs; `config` supplies every tuning constant.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod hardware;
pub mod motion;
pub mod pipeline;
pub mod sequencer;

pub use config::SorterConfig;
pub use error::{Result, SorterError};
pub use pipeline::BeadClassifier;
pub use sequencer::MotionSequencer;
