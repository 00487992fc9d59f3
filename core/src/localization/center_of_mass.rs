use crate::geometry::ProbeGeometry;
use crate::prelude::{
    LocalizeError, LocalizeResult, LocationRecord, OutputLayout, Peak, PeakLocalizer,
};
use ndarray::{Array3, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Scalar reduction of a channel's waveform snippet into a centroid weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightFeature {
    /// Max minus min over the window.
    Ptp,
    /// Mean over the window.
    Mean,
    /// Sample-wise L2 norm over the window.
    Energy,
    /// Instantaneous value at the peak sample.
    VOrigin,
}

impl WeightFeature {
    pub fn name(&self) -> &'static str {
        match self {
            WeightFeature::Ptp => "ptp",
            WeightFeature::Mean => "mean",
            WeightFeature::Energy => "energy",
            WeightFeature::VOrigin => "v_origin",
        }
    }
}

impl FromStr for WeightFeature {
    type Err = LocalizeError;

    fn from_str(name: &str) -> LocalizeResult<Self> {
        [
            WeightFeature::Ptp,
            WeightFeature::Mean,
            WeightFeature::Energy,
            WeightFeature::VOrigin,
        ]
        .into_iter()
        .find(|f| f.name() == name)
        .ok_or_else(|| {
            LocalizeError::Config(format!(
                "unsupported weight feature '{}', choose from [ptp, mean, energy, v_origin]",
                name
            ))
        })
    }
}

/// Weighted-centroid strategy over the peak channel's neighbors.
///
/// Consumes pre-extracted waveform snippets; the configured feature reduces
/// each neighbor channel's snippet to one weight. A zero or non-finite
/// weight sum yields the NaN sentinel record instead of a division by zero.
pub struct CenterOfMassLocalizer {
    geometry: Arc<ProbeGeometry>,
    feature: WeightFeature,
    /// Window row of the peak sample, for the `v_origin` feature.
    nbefore: usize,
}

impl CenterOfMassLocalizer {
    pub fn new(geometry: Arc<ProbeGeometry>, feature: WeightFeature, nbefore: usize) -> Self {
        Self {
            geometry,
            feature,
            nbefore,
        }
    }

    fn channel_weight(&self, snippet: ArrayView2<'_, f32>, channel: usize) -> f32 {
        let column = snippet.column(channel);
        match self.feature {
            WeightFeature::Ptp => {
                let mut min = f32::INFINITY;
                let mut max = f32::NEG_INFINITY;
                for &v in column {
                    min = min.min(v);
                    max = max.max(v);
                }
                if max >= min {
                    max - min
                } else {
                    0.0
                }
            }
            WeightFeature::Mean => {
                if column.is_empty() {
                    0.0
                } else {
                    column.sum() / column.len() as f32
                }
            }
            WeightFeature::Energy => column.iter().map(|&v| v * v).sum::<f32>().sqrt(),
            WeightFeature::VOrigin => column.get(self.nbefore).copied().unwrap_or(0.0),
        }
    }
}

impl PeakLocalizer for CenterOfMassLocalizer {
    fn requires_waveforms(&self) -> bool {
        true
    }

    fn output_layout(&self) -> OutputLayout {
        OutputLayout::Planar
    }

    fn compute_buffer(
        &self,
        _traces: ArrayView2<'_, f32>,
        peaks: &[Peak],
        waveforms: Option<&Array3<f32>>,
    ) -> LocalizeResult<Vec<LocationRecord>> {
        let waveforms = waveforms.ok_or_else(|| {
            LocalizeError::InvalidInput("center of mass requires extracted waveforms".into())
        })?;
        if waveforms.dim().0 != peaks.len() {
            return Err(LocalizeError::InvalidInput(format!(
                "{} waveform snippets for {} peaks",
                waveforms.dim().0,
                peaks.len()
            )));
        }

        // Peaks on the same channel share one neighbor lookup; the per-peak
        // result is identical to processing them independently.
        let mut neighbor_cache: HashMap<usize, (Vec<usize>, Vec<[f32; 2]>)> = HashMap::new();
        let mut records = Vec::with_capacity(peaks.len());

        for (peak_index, peak) in peaks.iter().enumerate() {
            let (neighbors, positions) = match neighbor_cache.entry(peak.channel_index) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let neighbors = self.geometry.neighbors(peak.channel_index)?.to_vec();
                    let positions = neighbors
                        .iter()
                        .map(|&ch| self.geometry.position(ch))
                        .collect::<LocalizeResult<Vec<_>>>()?;
                    entry.insert((neighbors, positions))
                }
            };

            let snippet = waveforms.index_axis(ndarray::Axis(0), peak_index);
            let mut weight_sum = 0.0f32;
            let mut weighted = [0.0f32; 2];
            for (&channel, position) in neighbors.iter().zip(positions.iter()) {
                let weight = self.channel_weight(snippet, channel);
                weight_sum += weight;
                weighted[0] += weight * position[0];
                weighted[1] += weight * position[1];
            }

            if weight_sum == 0.0 || !weight_sum.is_finite() {
                records.push(LocationRecord::sentinel(OutputLayout::Planar));
            } else {
                records.push(LocationRecord::planar(
                    weighted[0] / weight_sum,
                    weighted[1] / weight_sum,
                ));
            }
        }

        Ok(records)
    }
}
