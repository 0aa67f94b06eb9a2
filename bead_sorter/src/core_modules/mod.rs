pub mod bead_locator;
pub mod cluster_store;
pub mod color;
pub mod pixel_buffer;
pub mod sample_arc;
pub mod tube;
pub mod utils;
