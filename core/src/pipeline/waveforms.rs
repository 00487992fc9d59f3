use crate::prelude::Peak;
use ndarray::{Array3, ArrayView2};

/// Copies `[-nbefore, +nafter)` around each peak out of a buffer's trace
/// slice into a `(peak, sample, channel)` array.
///
/// Rows falling outside the slice are zero-filled, so a peak sitting at the
/// very start or end of a recording still yields a full-size snippet. Peak
/// sample indices must already be slice-local.
pub fn extract_waveforms(
    traces: ArrayView2<'_, f32>,
    peaks: &[Peak],
    nbefore: usize,
    nafter: usize,
) -> Array3<f32> {
    let window = nbefore + nafter;
    let channels = traces.ncols();
    let samples = traces.nrows();
    let mut waveforms = Array3::<f32>::zeros((peaks.len(), window, channels));

    for (peak_index, peak) in peaks.iter().enumerate() {
        for row in 0..window {
            let offset = peak.sample_index as isize - nbefore as isize + row as isize;
            if offset < 0 || offset as usize >= samples {
                continue;
            }
            waveforms
                .slice_mut(ndarray::s![peak_index, row, ..])
                .assign(&traces.row(offset as usize));
        }
    }
    waveforms
}
