use crate::geometry::ProbeGeometry;
use crate::prelude::{
    LocalizeResult, LocationRecord, OutputLayout, Peak, PeakLocalizer,
};
use ndarray::{Array3, ArrayView2};
use std::sync::Arc;

/// Trivial strategy: the location is the position of the peak's own channel.
///
/// Needs neither traces nor waveforms; kept mostly as a cheap baseline.
pub struct PeakChannelLocalizer {
    geometry: Arc<ProbeGeometry>,
}

impl PeakChannelLocalizer {
    pub fn new(geometry: Arc<ProbeGeometry>) -> Self {
        Self { geometry }
    }
}

impl PeakLocalizer for PeakChannelLocalizer {
    fn requires_waveforms(&self) -> bool {
        false
    }

    fn output_layout(&self) -> OutputLayout {
        OutputLayout::Planar
    }

    fn compute_buffer(
        &self,
        _traces: ArrayView2<'_, f32>,
        peaks: &[Peak],
        _waveforms: Option<&Array3<f32>>,
    ) -> LocalizeResult<Vec<LocationRecord>> {
        peaks
            .iter()
            .map(|peak| {
                let [x, y] = self.geometry.position(peak.channel_index)?;
                Ok(LocationRecord::planar(x, y))
            })
            .collect()
    }
}
