use crate::generator::recording::{build_recording, SyntheticRecording};
use crate::workflow::config::ScenarioConfig;
use anyhow::Context;
use serde::Serialize;
use spikeloccore::localize_peaks;

/// Outcome of one offline scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub method: String,
    pub num_peaks: usize,
    pub fallback_count: usize,
    /// Mean |estimate - truth| over the probe plane, non-sentinel records
    /// only; NaN when every record fell back.
    pub mean_planar_error_um: f32,
}

#[derive(Clone)]
pub struct Runner {
    config: ScenarioConfig,
}

impl Runner {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> anyhow::Result<RunSummary> {
        let SyntheticRecording {
            recording,
            peaks,
            truth,
        } = build_recording(&self.config.generator).context("building synthetic recording")?;

        let records = localize_peaks(
            &recording,
            &peaks,
            &self.config.method,
            &self.config.method_options,
            &self.config.job_options,
        )
        .context("localizing peaks")?;

        let mut fallback_count = 0usize;
        let mut error_sum = 0.0f64;
        let mut error_count = 0usize;
        for (record, source) in records.iter().zip(&truth) {
            if record.is_sentinel() {
                fallback_count += 1;
                continue;
            }
            let dx = (record.x - source.x) as f64;
            let dy = (record.y - source.y) as f64;
            error_sum += (dx * dx + dy * dy).sqrt();
            error_count += 1;
        }
        let mean_planar_error_um = if error_count > 0 {
            (error_sum / error_count as f64) as f32
        } else {
            f32::NAN
        };

        Ok(RunSummary {
            method: self.config.method.clone(),
            num_peaks: records.len(),
            fallback_count,
            mean_planar_error_um,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::recording::GeneratorConfig;

    fn quiet_scenario(method: &str) -> ScenarioConfig {
        ScenarioConfig {
            method: method.to_string(),
            generator: GeneratorConfig {
                rows: 6,
                cols: 4,
                duration_s: 0.5,
                num_spikes: 12,
                noise: 0.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn monopolar_scenario_localizes_near_the_truth() {
        let runner = Runner::new(quiet_scenario("monopolar_triangulation"));
        let summary = runner.execute().unwrap();

        assert_eq!(summary.num_peaks, 12);
        assert_eq!(summary.fallback_count, 0);
        // Noiseless injection follows the source model exactly, so the fit
        // lands close; leave slack for sparsity at the probe border.
        assert!(summary.mean_planar_error_um < 20.0);
    }

    #[test]
    fn center_of_mass_scenario_stays_on_the_probe() {
        let runner = Runner::new(quiet_scenario("center_of_mass"));
        let summary = runner.execute().unwrap();

        assert_eq!(summary.num_peaks, 12);
        assert!(summary.mean_planar_error_um.is_finite());
    }

    #[test]
    fn unknown_method_surfaces_the_config_error() {
        let runner = Runner::new(quiet_scenario("triangulate"));
        assert!(runner.execute().is_err());
    }
}
