//! Bounded Levenberg-Marquardt fit of the monopolar source model
//! `amp_c = alpha / sqrt(|p_c - (x, y)|^2 + z^2)`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::prelude::{LocalizeError, LocalizeResult};

/// Residual formulation used by the fit. Both converge to the same model;
/// the log penalty compresses amplitudes so loud channels cannot dominate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    LeastSquare,
    MinimizeWithLogPenalty,
}

impl OptimizerKind {
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::LeastSquare => "least_square",
            OptimizerKind::MinimizeWithLogPenalty => "minimize_with_log_penalty",
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = LocalizeError;

    fn from_str(name: &str) -> LocalizeResult<Self> {
        [
            OptimizerKind::LeastSquare,
            OptimizerKind::MinimizeWithLogPenalty,
        ]
        .into_iter()
        .find(|o| o.name() == name)
        .ok_or_else(|| {
            LocalizeError::Config(format!(
                "unsupported optimizer '{}', choose from [least_square, minimize_with_log_penalty]",
                name
            ))
        })
    }
}

/// Fitted source parameters.
#[derive(Debug, Clone, Copy)]
pub struct SourceFit {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub alpha: f32,
}

const MAX_ITERATIONS: usize = 300;
const LAMBDA_RETRIES: usize = 12;
const STEP_TOLERANCE: f64 = 1e-10;
const MIN_DISTANCE: f64 = 1e-9;

/// Fits `(x, y, z, alpha)` to the observed per-channel amplitudes.
///
/// `origin` is the peak channel's planar position; the planar estimate is
/// confined to `origin +- max_distance_um` on each axis and `z >= 0`.
/// Returns `None` when the problem is degenerate (fewer than four channels,
/// no signal) or the iteration fails to settle; callers map that to the NaN
/// sentinel record.
pub fn fit_monopolar(
    amplitudes: &[f32],
    positions: &[[f32; 2]],
    origin: [f32; 2],
    max_distance_um: f32,
    optimizer: OptimizerKind,
) -> Option<SourceFit> {
    if amplitudes.len() != positions.len() || amplitudes.len() < 4 {
        return None;
    }
    let observed: Vec<f64> = amplitudes.iter().map(|&a| a as f64).collect();
    let contacts: Vec<[f64; 2]> = positions
        .iter()
        .map(|p| [p[0] as f64, p[1] as f64])
        .collect();
    let peak_amp = observed.iter().cloned().fold(0.0f64, f64::max);
    if peak_amp <= 0.0 || !peak_amp.is_finite() {
        return None;
    }

    let bound = max_distance_um as f64;
    let lower = [origin[0] as f64 - bound, origin[1] as f64 - bound, 0.0, 0.0];
    let upper = [
        origin[0] as f64 + bound,
        origin[1] as f64 + bound,
        10.0 * bound,
        f64::INFINITY,
    ];

    let mut params = [origin[0] as f64, origin[1] as f64, 1.0, 0.0];
    params[3] = initial_alpha(&params, &observed, &contacts);
    let mut cost = residual_cost(&params, &observed, &contacts, optimizer);
    let mut lambda = 1e-3;

    for _ in 0..MAX_ITERATIONS {
        let (jtj, jtr) = normal_equations(&params, &observed, &contacts, optimizer);
        let mut accepted = false;

        for _ in 0..LAMBDA_RETRIES {
            let mut damped = jtj;
            for k in 0..4 {
                damped[k][k] += lambda * jtj[k][k].max(1e-9);
            }
            let step = match solve_4x4(damped, jtr) {
                Some(step) => step,
                None => {
                    lambda *= 5.0;
                    continue;
                }
            };

            let mut candidate = [0.0f64; 4];
            for k in 0..4 {
                candidate[k] = (params[k] - step[k]).clamp(lower[k], upper[k]);
            }
            let candidate_cost = residual_cost(&candidate, &observed, &contacts, optimizer);
            if candidate_cost < cost {
                let moved: f64 = (0..4)
                    .map(|k| (candidate[k] - params[k]).powi(2))
                    .sum::<f64>()
                    .sqrt();
                let scale: f64 = params.iter().map(|p| p * p).sum::<f64>().sqrt();
                params = candidate;
                cost = candidate_cost;
                lambda = (lambda / 5.0).max(1e-12);
                accepted = true;
                if moved < STEP_TOLERANCE * (1.0 + scale) {
                    return Some(to_fit(params));
                }
                break;
            }
            lambda *= 5.0;
        }

        // No damping level improves the cost: the iterate sits at a local
        // minimum (possibly on the box boundary).
        if !accepted {
            return Some(to_fit(params));
        }
    }

    None
}

fn to_fit(params: [f64; 4]) -> SourceFit {
    SourceFit {
        x: params[0] as f32,
        y: params[1] as f32,
        z: params[2] as f32,
        alpha: params[3] as f32,
    }
}

fn source_distance(params: &[f64; 4], contact: [f64; 2]) -> f64 {
    let dx = params[0] - contact[0];
    let dy = params[1] - contact[1];
    (dx * dx + dy * dy + params[2] * params[2])
        .sqrt()
        .max(MIN_DISTANCE)
}

/// Closed-form least-squares `alpha` for a fixed source position.
fn initial_alpha(params: &[f64; 4], observed: &[f64], contacts: &[[f64; 2]]) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (a, &contact) in observed.iter().zip(contacts) {
        let q = source_distance(params, contact);
        numerator += a / q;
        denominator += 1.0 / (q * q);
    }
    if denominator > 0.0 {
        (numerator / denominator).max(0.0)
    } else {
        0.0
    }
}

fn residual_cost(
    params: &[f64; 4],
    observed: &[f64],
    contacts: &[[f64; 2]],
    optimizer: OptimizerKind,
) -> f64 {
    let mut cost = 0.0;
    for (a, &contact) in observed.iter().zip(contacts) {
        let model = params[3] / source_distance(params, contact);
        let r = match optimizer {
            OptimizerKind::LeastSquare => model - a,
            OptimizerKind::MinimizeWithLogPenalty => (1.0 + model).ln() - (1.0 + a).ln(),
        };
        cost += r * r;
    }
    cost
}

fn normal_equations(
    params: &[f64; 4],
    observed: &[f64],
    contacts: &[[f64; 2]],
    optimizer: OptimizerKind,
) -> ([[f64; 4]; 4], [f64; 4]) {
    let mut jtj = [[0.0f64; 4]; 4];
    let mut jtr = [0.0f64; 4];

    for (a, &contact) in observed.iter().zip(contacts) {
        let q = source_distance(params, contact);
        let model = params[3] / q;
        let q3 = q * q * q;

        let mut jacobian = [
            -params[3] * (params[0] - contact[0]) / q3,
            -params[3] * (params[1] - contact[1]) / q3,
            -params[3] * params[2] / q3,
            1.0 / q,
        ];
        let residual = match optimizer {
            OptimizerKind::LeastSquare => model - a,
            OptimizerKind::MinimizeWithLogPenalty => {
                let damp = 1.0 / (1.0 + model);
                for j in jacobian.iter_mut() {
                    *j *= damp;
                }
                (1.0 + model).ln() - (1.0 + a).ln()
            }
        };

        for row in 0..4 {
            for col in 0..4 {
                jtj[row][col] += jacobian[row] * jacobian[col];
            }
            jtr[row] += jacobian[row] * residual;
        }
    }

    (jtj, jtr)
}

/// Gaussian elimination with partial pivoting; `None` on a singular system.
fn solve_4x4(mut a: [[f64; 4]; 4], mut b: [f64; 4]) -> Option<[f64; 4]> {
    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot_row][col].abs() < 1e-30 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..4 {
            let factor = a[row][col] / a[col][col];
            for k in col..4 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0f64; 4];
    for row in (0..4).rev() {
        let mut sum = b[row];
        for col in (row + 1)..4 {
            sum -= a[row][col] * x[col];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_positions(rows: usize, cols: usize, pitch: f32) -> Vec<[f32; 2]> {
        let mut positions = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                positions.push([c as f32 * pitch, r as f32 * pitch]);
            }
        }
        positions
    }

    fn model_amplitudes(positions: &[[f32; 2]], source: [f32; 4]) -> Vec<f32> {
        positions
            .iter()
            .map(|p| {
                let dx = (p[0] - source[0]) as f64;
                let dy = (p[1] - source[1]) as f64;
                let z = source[2] as f64;
                (source[3] as f64 / (dx * dx + dy * dy + z * z).sqrt()) as f32
            })
            .collect()
    }

    fn assert_relative(estimate: f32, truth: f32, tolerance: f32) {
        let scale = truth.abs().max(1.0);
        assert!(
            (estimate - truth).abs() / scale < tolerance,
            "estimate {} vs truth {}",
            estimate,
            truth
        );
    }

    #[test]
    fn recovers_noiseless_source_with_plain_residuals() {
        let positions = grid_positions(4, 4, 20.0);
        let source = [25.0, 35.0, 30.0, 1500.0];
        let amplitudes = model_amplitudes(&positions, source);

        let fit = fit_monopolar(
            &amplitudes,
            &positions,
            [20.0, 40.0],
            150.0,
            OptimizerKind::LeastSquare,
        )
        .unwrap();

        assert_relative(fit.x, source[0], 1e-3);
        assert_relative(fit.y, source[1], 1e-3);
        assert_relative(fit.z, source[2], 1e-3);
        assert_relative(fit.alpha, source[3], 1e-3);
    }

    #[test]
    fn recovers_noiseless_source_with_log_penalty() {
        let positions = grid_positions(4, 4, 20.0);
        let source = [42.0, 18.0, 22.0, 900.0];
        let amplitudes = model_amplitudes(&positions, source);

        let fit = fit_monopolar(
            &amplitudes,
            &positions,
            [40.0, 20.0],
            150.0,
            OptimizerKind::MinimizeWithLogPenalty,
        )
        .unwrap();

        assert_relative(fit.x, source[0], 1e-3);
        assert_relative(fit.y, source[1], 1e-3);
        assert_relative(fit.z, source[2], 1e-3);
        assert_relative(fit.alpha, source[3], 1e-3);
    }

    #[test]
    fn planar_estimate_respects_max_distance_bound() {
        let positions = grid_positions(3, 3, 20.0);
        // Source far outside the allowed search box.
        let source = [400.0, 20.0, 15.0, 2000.0];
        let amplitudes = model_amplitudes(&positions, source);

        let origin = [20.0, 20.0];
        let bound = 50.0;
        let fit = fit_monopolar(
            &amplitudes,
            &positions,
            origin,
            bound,
            OptimizerKind::LeastSquare,
        )
        .unwrap();

        assert!((fit.x - origin[0]).abs() <= bound + 1e-3);
        assert!((fit.y - origin[1]).abs() <= bound + 1e-3);
        assert!(fit.z >= 0.0);
    }

    #[test]
    fn silent_channels_yield_no_fit() {
        let positions = grid_positions(3, 3, 20.0);
        let amplitudes = vec![0.0; positions.len()];
        assert!(fit_monopolar(
            &amplitudes,
            &positions,
            [20.0, 20.0],
            100.0,
            OptimizerKind::LeastSquare,
        )
        .is_none());
    }

    #[test]
    fn underdetermined_problems_yield_no_fit() {
        let positions = vec![[0.0, 0.0], [20.0, 0.0], [40.0, 0.0]];
        let amplitudes = vec![5.0, 9.0, 5.0];
        assert!(fit_monopolar(
            &amplitudes,
            &positions,
            [20.0, 0.0],
            100.0,
            OptimizerKind::LeastSquare,
        )
        .is_none());
    }

    #[test]
    fn unknown_optimizer_name_is_config_error() {
        assert!("newton".parse::<OptimizerKind>().is_err());
        assert_eq!(
            "minimize_with_log_penalty".parse::<OptimizerKind>().unwrap(),
            OptimizerKind::MinimizeWithLogPenalty
        );
    }
}
