use crate::geometry::ProbeGeometry;
use crate::localization::{build_localizer, Method, MethodOptions};
use crate::pipeline::peaks::{plan_chunks, ChunkPlan};
use crate::pipeline::recording::Recording;
use crate::pipeline::waveforms::extract_waveforms;
use crate::prelude::{
    JobOptions, LocalizeError, LocalizeResult, LocationRecord, Peak, PeakLocalizer,
};
use crate::telemetry::{LogManager, MetricsRecorder};
use rayon::prelude::*;

/// Localizes every peak of a recording with the named method.
///
/// Configuration problems (unknown method or feature, a peak channel outside
/// the probe geometry) fail before any buffer is touched. Per-peak numerical
/// degeneracies degrade to NaN sentinel records instead. The output holds
/// exactly one record per input peak, in input order, regardless of how
/// chunks were scheduled.
pub fn localize_peaks(
    recording: &dyn Recording,
    peaks: &[Peak],
    method: &str,
    method_options: &MethodOptions,
    job_options: &JobOptions,
) -> LocalizeResult<Vec<LocationRecord>> {
    let method: Method = method.parse()?;
    let geometry = ProbeGeometry::new(
        recording.channel_positions().to_vec(),
        method_options.local_radius_um,
    )?;
    if geometry.channel_count() != recording.channel_count() {
        return Err(LocalizeError::Config(format!(
            "probe has {} contacts but the recording carries {} channels",
            geometry.channel_count(),
            recording.channel_count()
        )));
    }
    for (index, peak) in peaks.iter().enumerate() {
        if peak.channel_index >= geometry.channel_count() {
            return Err(LocalizeError::Config(format!(
                "peak {} on channel {} has no entry in the neighbor mask ({} contacts)",
                index,
                peak.channel_index,
                geometry.channel_count()
            )));
        }
    }

    let localizer = build_localizer(
        method,
        method_options,
        std::sync::Arc::new(geometry),
        recording.sampling_frequency(),
    )?;
    let (nbefore, nafter) = method_options.window_samples(recording.sampling_frequency());
    let margin = nbefore.max(nafter);

    let segment_samples: Vec<usize> = (0..recording.num_segments())
        .map(|s| recording.num_samples(s))
        .collect();
    let plans = plan_chunks(&segment_samples, peaks, job_options.chunk_size, margin)?;

    let logger = LogManager::new();
    let total_chunks = plans.len();
    let process = |plan: &ChunkPlan| -> LocalizeResult<(Vec<usize>, Vec<LocationRecord>)> {
        let traces = recording.traces(plan.segment_index, plan.start, plan.end)?;
        let waveforms = if localizer.requires_waveforms() {
            Some(extract_waveforms(traces.view(), &plan.peaks, nbefore, nafter))
        } else {
            None
        };
        let records = localizer.compute_buffer(traces.view(), &plan.peaks, waveforms.as_ref())?;
        if records.len() != plan.peaks.len() {
            return Err(LocalizeError::Internal(format!(
                "strategy emitted {} records for {} peaks",
                records.len(),
                plan.peaks.len()
            )));
        }
        Ok((plan.output_indices.clone(), records))
    };

    let chunk_results: Vec<(Vec<usize>, Vec<LocationRecord>)> = if job_options.num_workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(job_options.num_workers)
            .build()
            .map_err(|e| LocalizeError::Internal(format!("building worker pool: {}", e)))?;
        pool.install(|| plans.par_iter().map(process).collect::<LocalizeResult<_>>())?
    } else {
        let mut results = Vec::with_capacity(plans.len());
        for (index, plan) in plans.iter().enumerate() {
            let progress = format!(
                "localize peaks ({}): chunk {}/{}",
                method.name(),
                index + 1,
                total_chunks
            );
            if job_options.progress {
                logger.record(&progress);
            } else {
                logger.record_progress(&progress);
            }
            results.push(process(plan)?);
        }
        results
    };

    let mut records = vec![LocationRecord::sentinel(localizer.output_layout()); peaks.len()];
    for (slots, chunk_records) in chunk_results {
        for (slot, record) in slots.into_iter().zip(chunk_records) {
            records[slot] = record;
        }
    }

    let metrics = MetricsRecorder::new();
    for record in &records {
        metrics.record_localized();
        if record.is_sentinel() {
            metrics.record_fallback();
        }
    }
    let (localized, fallbacks) = metrics.snapshot();
    logger.record(&format!(
        "localize peaks ({}) done: {} peaks, {} fallback records, {} chunks",
        method.name(),
        localized,
        fallbacks,
        total_chunks
    ));

    Ok(records)
}
