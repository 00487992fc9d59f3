use crate::prelude::{LocalizeError, LocalizeResult, Peak};
use std::collections::BTreeMap;

/// One buffer of work for a strategy: a trace slice to fetch and the peaks
/// falling inside it, with sample indices already shifted slice-local.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub segment_index: usize,
    /// Trace slice bounds, margins included, clamped to the segment.
    pub start: usize,
    pub end: usize,
    pub peaks: Vec<Peak>,
    /// Original output slot of each peak, same order as `peaks`.
    pub output_indices: Vec<usize>,
}

/// Partitions peaks into fixed-size chunks per segment.
///
/// Each chunk's slice is widened by `margin` samples on both sides so every
/// peak window fits; empty chunks are skipped. Peaks referencing unknown
/// segments or samples are rejected up front.
pub fn plan_chunks(
    segment_samples: &[usize],
    peaks: &[Peak],
    chunk_size: usize,
    margin: usize,
) -> LocalizeResult<Vec<ChunkPlan>> {
    let chunk_size = chunk_size.max(1);
    let mut grouped: BTreeMap<(usize, usize), (Vec<Peak>, Vec<usize>)> = BTreeMap::new();

    for (index, peak) in peaks.iter().enumerate() {
        let samples = *segment_samples.get(peak.segment_index).ok_or_else(|| {
            LocalizeError::InvalidInput(format!(
                "peak {} references segment {} ({} segments)",
                index,
                peak.segment_index,
                segment_samples.len()
            ))
        })?;
        if peak.sample_index >= samples {
            return Err(LocalizeError::InvalidInput(format!(
                "peak {} at sample {} beyond segment {} ({} samples)",
                index, peak.sample_index, peak.segment_index, samples
            )));
        }

        let chunk = peak.sample_index / chunk_size;
        let entry = grouped
            .entry((peak.segment_index, chunk))
            .or_insert_with(|| (Vec::new(), Vec::new()));
        entry.0.push(*peak);
        entry.1.push(index);
    }

    let mut plans = Vec::with_capacity(grouped.len());
    for ((segment_index, chunk), (chunk_peaks, output_indices)) in grouped {
        let samples = segment_samples[segment_index];
        let core_start = chunk * chunk_size;
        let core_end = (core_start + chunk_size).min(samples);
        let start = core_start.saturating_sub(margin);
        let end = (core_end + margin).min(samples);

        let local_peaks = chunk_peaks
            .into_iter()
            .map(|peak| Peak {
                sample_index: peak.sample_index - start,
                ..peak
            })
            .collect();

        plans.push(ChunkPlan {
            segment_index,
            start,
            end,
            peaks: local_peaks,
            output_indices,
        });
    }
    Ok(plans)
}
