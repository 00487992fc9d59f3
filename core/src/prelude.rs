use ndarray::{Array3, ArrayView2};
use serde::{Deserialize, Serialize};

/// Detected peak event, as produced by an upstream detector.
///
/// `sample_index` is an offset within `segment_index`; the driver shifts it
/// to be buffer-local before handing peaks to a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peak {
    pub sample_index: usize,
    pub channel_index: usize,
    pub segment_index: usize,
}

/// Field layout of the records a strategy emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `{x, y}` only.
    Planar,
    /// `{x, y, z, alpha}` from the fitted source model.
    SourceModel,
}

/// Estimated location for a single peak.
///
/// `z` and `alpha` are populated only by strategies declaring
/// [`OutputLayout::SourceModel`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationRecord {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
}

impl LocationRecord {
    pub fn planar(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            alpha: None,
        }
    }

    pub fn source_model(x: f32, y: f32, z: f32, alpha: f32) -> Self {
        Self {
            x,
            y,
            z: Some(z),
            alpha: Some(alpha),
        }
    }

    /// Documented fallback for degenerate per-peak computations: every field
    /// of the declared layout is NaN. The peak keeps its slot in the output.
    pub fn sentinel(layout: OutputLayout) -> Self {
        match layout {
            OutputLayout::Planar => Self::planar(f32::NAN, f32::NAN),
            OutputLayout::SourceModel => {
                Self::source_model(f32::NAN, f32::NAN, f32::NAN, f32::NAN)
            }
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.x.is_nan() && self.y.is_nan()
    }
}

/// Execution options forwarded to the chunked driver. Strategies never read
/// these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Samples per trace buffer.
    pub chunk_size: usize,
    /// Worker threads for chunk dispatch; 1 means sequential.
    pub num_workers: usize,
    /// Log per-chunk progress.
    pub progress: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            num_workers: 1,
            progress: false,
        }
    }
}

/// Common error type for localization.
#[derive(thiserror::Error, Debug)]
pub enum LocalizeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type LocalizeResult<T> = Result<T, LocalizeError>;

/// Per-buffer contract every localization strategy satisfies.
///
/// Implementations hold only configuration and read-only geometry data
/// established at construction, so one instance can serve chunks on several
/// workers concurrently. The driver re-assembles records in original peak
/// order; strategies only guarantee order within a buffer.
pub trait PeakLocalizer: Send + Sync {
    /// Whether the driver must extract waveform snippets before calling
    /// [`compute_buffer`](Self::compute_buffer).
    fn requires_waveforms(&self) -> bool;

    fn output_layout(&self) -> OutputLayout;

    /// Computes one location record per peak, in the order given.
    ///
    /// `traces` is the buffer's trace slice (samples x channels) including
    /// margins; peak sample indices are relative to that slice. `waveforms`
    /// is `(peak, sample, channel)` and is present iff
    /// [`requires_waveforms`](Self::requires_waveforms) returned true.
    fn compute_buffer(
        &self,
        traces: ArrayView2<'_, f32>,
        peaks: &[Peak],
        waveforms: Option<&Array3<f32>>,
    ) -> LocalizeResult<Vec<LocationRecord>>;
}
