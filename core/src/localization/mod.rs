pub mod center_of_mass;
pub mod monopolar;
pub mod peak_channel;
pub mod solver;

pub use center_of_mass::{CenterOfMassLocalizer, WeightFeature};
pub use monopolar::MonopolarLocalizer;
pub use peak_channel::PeakChannelLocalizer;
pub use solver::OptimizerKind;

use crate::geometry::ProbeGeometry;
use crate::prelude::{LocalizeError, LocalizeResult, PeakLocalizer};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Supported localization strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    PeakChannel,
    CenterOfMass,
    MonopolarTriangulation,
}

impl Method {
    pub const ALL: [Method; 3] = [
        Method::PeakChannel,
        Method::CenterOfMass,
        Method::MonopolarTriangulation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Method::PeakChannel => "peak_channel",
            Method::CenterOfMass => "center_of_mass",
            Method::MonopolarTriangulation => "monopolar_triangulation",
        }
    }
}

impl FromStr for Method {
    type Err = LocalizeError;

    fn from_str(name: &str) -> LocalizeResult<Self> {
        Method::ALL
            .into_iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| {
                LocalizeError::Config(format!(
                    "unsupported localization method '{}', choose from {:?}",
                    name,
                    Method::ALL.map(|m| m.name())
                ))
            })
    }
}

/// Per-method tuning knobs. Defaults mirror the reference pipeline: 1 ms
/// window on each side, 75 um sparsity radius, ptp weighting, 1000 um fit
/// bound with the log-penalty optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodOptions {
    pub ms_before: f32,
    pub ms_after: f32,
    pub local_radius_um: f32,
    /// Center-of-mass weighting feature.
    pub feature: WeightFeature,
    /// Bound on the planar search radius for monopolar triangulation.
    pub max_distance_um: f32,
    pub optimizer: OptimizerKind,
    /// Clamp amplitudes to decay with shell distance before fitting.
    pub enforce_decrease: bool,
}

impl Default for MethodOptions {
    fn default() -> Self {
        Self {
            ms_before: 1.0,
            ms_after: 1.0,
            local_radius_um: 75.0,
            feature: WeightFeature::Ptp,
            max_distance_um: 1000.0,
            optimizer: OptimizerKind::MinimizeWithLogPenalty,
            enforce_decrease: false,
        }
    }
}

impl MethodOptions {
    pub fn window_samples(&self, sampling_frequency: f32) -> (usize, usize) {
        let nbefore = (self.ms_before * sampling_frequency / 1000.0) as usize;
        let nafter = (self.ms_after * sampling_frequency / 1000.0) as usize;
        (nbefore, nafter)
    }

    fn validate(&self, sampling_frequency: f32) -> LocalizeResult<()> {
        if !sampling_frequency.is_finite() || sampling_frequency <= 0.0 {
            return Err(LocalizeError::Config(format!(
                "sampling frequency must be positive, got {}",
                sampling_frequency
            )));
        }
        let (nbefore, nafter) = self.window_samples(sampling_frequency);
        if nbefore + nafter == 0 {
            return Err(LocalizeError::Config(format!(
                "window [{} ms, {} ms] spans zero samples at {} Hz",
                self.ms_before, self.ms_after, sampling_frequency
            )));
        }
        if !self.max_distance_um.is_finite() || self.max_distance_um <= 0.0 {
            return Err(LocalizeError::Config(format!(
                "max_distance_um must be positive, got {}",
                self.max_distance_um
            )));
        }
        Ok(())
    }
}

/// Static registry mapping a method to its strategy implementation.
pub fn build_localizer(
    method: Method,
    options: &MethodOptions,
    geometry: Arc<ProbeGeometry>,
    sampling_frequency: f32,
) -> LocalizeResult<Box<dyn PeakLocalizer>> {
    options.validate(sampling_frequency)?;
    let (nbefore, nafter) = options.window_samples(sampling_frequency);
    match method {
        Method::PeakChannel => Ok(Box::new(PeakChannelLocalizer::new(geometry))),
        Method::CenterOfMass => Ok(Box::new(CenterOfMassLocalizer::new(
            geometry,
            options.feature,
            nbefore,
        ))),
        Method::MonopolarTriangulation => Ok(Box::new(MonopolarLocalizer::new(
            geometry,
            nbefore,
            nafter,
            options.max_distance_um,
            options.optimizer,
            options.enforce_decrease,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_round_trip() {
        for method in Method::ALL {
            assert_eq!(method.name().parse::<Method>().unwrap(), method);
        }
    }

    #[test]
    fn unknown_method_fails_fast() {
        let err = "centre_of_mass".parse::<Method>().unwrap_err();
        assert!(matches!(err, LocalizeError::Config(_)));
    }

    #[test]
    fn window_samples_follow_sampling_rate() {
        let options = MethodOptions::default();
        assert_eq!(options.window_samples(30_000.0), (30, 30));
        assert_eq!(options.window_samples(10_000.0), (10, 10));
    }

    #[test]
    fn degenerate_window_is_config_error() {
        let options = MethodOptions {
            ms_before: 0.0,
            ms_after: 0.0,
            ..Default::default()
        };
        assert!(options.validate(30_000.0).is_err());
    }
}
