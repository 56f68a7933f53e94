//! Clutch Edit Model
//!
//! Data contracts and pure computation for removing segments from a
//! recording:
//! - **EDL:** Tab-separated cut lists (`start<TAB>stop<TAB>label`)
//! - **Segments:** The complement of a cut list within a media duration
//! - **Media:** Duration and codec tags reported by a probe
//!
//! This crate does no process spawning. All times are `f64` seconds.

pub mod edl;
pub mod media;
pub mod segment;

pub use edl::*;
pub use media::*;
pub use segment::*;
