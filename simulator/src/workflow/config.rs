use crate::generator::recording::GeneratorConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use spikeloccore::localization::MethodOptions;
use spikeloccore::prelude::JobOptions;
use std::fs;
use std::path::Path;

/// One offline scenario: what to generate and how to localize it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub method: String,
    pub generator: GeneratorConfig,
    pub method_options: MethodOptions,
    pub job_options: JobOptions,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            method: "monopolar_triangulation".to_string(),
            generator: GeneratorConfig::default(),
            method_options: MethodOptions::default(),
            job_options: JobOptions::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading scenario config {}", path_ref.display()))?;
        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing scenario config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(method: &str, num_spikes: usize, num_workers: usize, chunk_size: usize) -> Self {
        Self {
            method: method.to_string(),
            generator: GeneratorConfig {
                num_spikes,
                ..Default::default()
            },
            job_options: JobOptions {
                chunk_size,
                num_workers,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_fills_job_options() {
        let cfg = ScenarioConfig::from_args("center_of_mass", 25, 4, 5000);
        assert_eq!(cfg.method, "center_of_mass");
        assert_eq!(cfg.generator.num_spikes, 25);
        assert_eq!(cfg.job_options.num_workers, 4);
        assert_eq!(cfg.job_options.chunk_size, 5000);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"method: center_of_mass\ngenerator:\n  num_spikes: 7\nmethod_options:\n  local_radius_um: 60.0\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = ScenarioConfig::load(&path).unwrap();
        assert_eq!(cfg.method, "center_of_mass");
        assert_eq!(cfg.generator.num_spikes, 7);
        assert_eq!(cfg.method_options.local_radius_um, 60.0);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.method_options.ms_before, 1.0);
    }
}
