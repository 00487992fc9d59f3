use crate::geometry::{ProbeGeometry, ShellOrdering};
use crate::localization::solver::{fit_monopolar, OptimizerKind};
use crate::prelude::{
    LocalizeResult, LocationRecord, OutputLayout, Peak, PeakLocalizer,
};
use ndarray::{s, Array3, ArrayView1, ArrayView2};
use std::sync::Arc;

/// Monopolar triangulation: fits a point current source to the peak-to-peak
/// amplitude falloff across the peak channel's neighbors.
///
/// Extracts its own window from the raw trace buffer, so the driver never
/// needs to hand it waveform snippets. With `enforce_decrease`, amplitudes
/// are clamped to decay along the precomputed shell ordering before the fit.
pub struct MonopolarLocalizer {
    geometry: Arc<ProbeGeometry>,
    shells: Option<ShellOrdering>,
    nbefore: usize,
    nafter: usize,
    max_distance_um: f32,
    optimizer: OptimizerKind,
}

impl MonopolarLocalizer {
    pub fn new(
        geometry: Arc<ProbeGeometry>,
        nbefore: usize,
        nafter: usize,
        max_distance_um: f32,
        optimizer: OptimizerKind,
        enforce_decrease: bool,
    ) -> LocalizeResult<Self> {
        let shells = if enforce_decrease {
            Some(ShellOrdering::new(&geometry)?)
        } else {
            None
        };
        Ok(Self {
            geometry,
            shells,
            nbefore,
            nafter,
            max_distance_um,
            optimizer,
        })
    }
}

fn peak_to_peak(column: ArrayView1<'_, f32>) -> f32 {
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

impl PeakLocalizer for MonopolarLocalizer {
    fn requires_waveforms(&self) -> bool {
        false
    }

    fn output_layout(&self) -> OutputLayout {
        OutputLayout::SourceModel
    }

    fn compute_buffer(
        &self,
        traces: ArrayView2<'_, f32>,
        peaks: &[Peak],
        _waveforms: Option<&Array3<f32>>,
    ) -> LocalizeResult<Vec<LocationRecord>> {
        let buffer_samples = traces.nrows();
        let mut records = Vec::with_capacity(peaks.len());

        for peak in peaks {
            let neighbors = self.geometry.neighbors(peak.channel_index)?;
            let origin = self.geometry.position(peak.channel_index)?;

            let start = peak.sample_index.saturating_sub(self.nbefore);
            let end = (peak.sample_index + self.nafter).min(buffer_samples);
            if start >= end {
                records.push(LocationRecord::sentinel(OutputLayout::SourceModel));
                continue;
            }
            let window = traces.slice(s![start..end, ..]);

            let mut amplitudes: Vec<f32> = neighbors
                .iter()
                .map(|&ch| peak_to_peak(window.column(ch)))
                .collect();

            if let Some(shells) = &self.shells {
                shells.enforce_decrease(peak.channel_index, neighbors, &mut amplitudes)?;
            }

            let positions = neighbors
                .iter()
                .map(|&ch| self.geometry.position(ch))
                .collect::<LocalizeResult<Vec<_>>>()?;

            let record = match fit_monopolar(
                &amplitudes,
                &positions,
                origin,
                self.max_distance_um,
                self.optimizer,
            ) {
                Some(fit) => LocationRecord::source_model(fit.x, fit.y, fit.z, fit.alpha),
                None => LocationRecord::sentinel(OutputLayout::SourceModel),
            };
            records.push(record);
        }

        Ok(records)
    }
}
