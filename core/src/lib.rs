//! Peak-localization core for the Rust spike-sorting platform.
//!
//! Estimates the physical source position of detected extracellular spikes
//! from multichannel recordings, given the contact geometry and short trace
//! windows around each peak. The modules provide the per-buffer strategy
//! contract, the geometric shell machinery, and a chunked driver that scales
//! to long recordings without holding the full dataset in memory.

pub mod geometry;
pub mod localization;
pub mod pipeline;
pub mod prelude;
pub mod telemetry;

pub use pipeline::localize_peaks;
pub use prelude::{JobOptions, LocalizeError, LocalizeResult, LocationRecord, PeakLocalizer};
