use crate::prelude::{LocalizeError, LocalizeResult};
use ndarray::{s, Array2};

/// Upstream trace source consumed by the chunked driver.
///
/// Implementations are read-only and shared across workers; the driver only
/// ever asks for bounded slices, so arbitrarily long recordings can stay on
/// disk behind this trait.
pub trait Recording: Send + Sync {
    fn num_segments(&self) -> usize;

    /// Samples in a segment; 0 for an unknown segment.
    fn num_samples(&self, segment: usize) -> usize;

    fn channel_count(&self) -> usize;

    fn sampling_frequency(&self) -> f32;

    /// Planar contact position per channel, in microns.
    fn channel_positions(&self) -> &[[f32; 2]];

    /// Returns `[start, end)` of a segment as a samples x channels array.
    fn traces(&self, segment: usize, start: usize, end: usize) -> LocalizeResult<Array2<f32>>;
}

/// In-memory recording backed by one `ndarray` per segment. Used by tests
/// and the offline simulator; real deployments put a lazy reader behind
/// [`Recording`] instead.
pub struct ArrayRecording {
    segments: Vec<Array2<f32>>,
    sampling_frequency: f32,
    positions: Vec<[f32; 2]>,
}

impl ArrayRecording {
    pub fn new(
        segments: Vec<Array2<f32>>,
        sampling_frequency: f32,
        positions: Vec<[f32; 2]>,
    ) -> LocalizeResult<Self> {
        if segments.is_empty() {
            return Err(LocalizeError::InvalidInput(
                "recording has no segments".into(),
            ));
        }
        for (index, segment) in segments.iter().enumerate() {
            if segment.ncols() != positions.len() {
                return Err(LocalizeError::Config(format!(
                    "segment {} has {} channels but the probe has {} contacts",
                    index,
                    segment.ncols(),
                    positions.len()
                )));
            }
        }
        Ok(Self {
            segments,
            sampling_frequency,
            positions,
        })
    }
}

impl Recording for ArrayRecording {
    fn num_segments(&self) -> usize {
        self.segments.len()
    }

    fn num_samples(&self, segment: usize) -> usize {
        self.segments.get(segment).map_or(0, |s| s.nrows())
    }

    fn channel_count(&self) -> usize {
        self.positions.len()
    }

    fn sampling_frequency(&self) -> f32 {
        self.sampling_frequency
    }

    fn channel_positions(&self) -> &[[f32; 2]] {
        &self.positions
    }

    fn traces(&self, segment: usize, start: usize, end: usize) -> LocalizeResult<Array2<f32>> {
        let data = self.segments.get(segment).ok_or_else(|| {
            LocalizeError::InvalidInput(format!(
                "segment {} out of range ({} segments)",
                segment,
                self.segments.len()
            ))
        })?;
        if start > end || end > data.nrows() {
            return Err(LocalizeError::InvalidInput(format!(
                "trace slice [{}, {}) out of range ({} samples)",
                start,
                end,
                data.nrows()
            )));
        }
        Ok(data.slice(s![start..end, ..]).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_are_bounds_checked() {
        let recording = ArrayRecording::new(
            vec![Array2::<f32>::zeros((100, 2))],
            30_000.0,
            vec![[0.0, 0.0], [20.0, 0.0]],
        )
        .unwrap();

        assert_eq!(recording.traces(0, 10, 20).unwrap().dim(), (10, 2));
        assert!(recording.traces(0, 90, 110).is_err());
        assert!(recording.traces(1, 0, 10).is_err());
    }

    #[test]
    fn channel_count_must_match_probe() {
        let result = ArrayRecording::new(
            vec![Array2::<f32>::zeros((10, 3))],
            30_000.0,
            vec![[0.0, 0.0], [20.0, 0.0]],
        );
        assert!(matches!(result, Err(LocalizeError::Config(_))));
    }
}
