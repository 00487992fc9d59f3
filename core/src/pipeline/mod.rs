pub mod peaks;
pub mod recording;
pub mod runner;
pub mod waveforms;

pub use peaks::ChunkPlan;
pub use recording::{ArrayRecording, Recording};
pub use runner::localize_peaks;
pub use waveforms::extract_waveforms;
