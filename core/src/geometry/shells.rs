use crate::geometry::ProbeGeometry;
use crate::prelude::{LocalizeError, LocalizeResult};

/// Two distances within this many microns land in the same shell.
const SHELL_TOLERANCE_UM: f32 = 1e-3;

/// Distance-ordered channel shells around one reference channel.
///
/// Shell 0 is the reference channel itself; each later shell groups the
/// neighbor channels at the next strictly larger radial distance, with ties
/// sharing a shell.
#[derive(Debug, Clone)]
pub struct ShellOrder {
    shells: Vec<Vec<usize>>,
}

impl ShellOrder {
    fn build(geometry: &ProbeGeometry, reference: usize) -> LocalizeResult<Self> {
        let mut by_distance: Vec<(f32, usize)> = geometry
            .neighbors(reference)?
            .iter()
            .map(|&ch| Ok((geometry.distance(reference, ch)?, ch)))
            .collect::<LocalizeResult<_>>()?;
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut shells: Vec<Vec<usize>> = Vec::new();
        let mut shell_start = f32::NEG_INFINITY;
        for (distance, channel) in by_distance {
            if distance - shell_start > SHELL_TOLERANCE_UM {
                shells.push(Vec::new());
                shell_start = distance;
            }
            shells
                .last_mut()
                .ok_or_else(|| LocalizeError::Internal("empty shell order".into()))?
                .push(channel);
        }
        Ok(Self { shells })
    }

    pub fn shells(&self) -> &[Vec<usize>] {
        &self.shells
    }
}

/// One [`ShellOrder`] per channel, built once per geometry and immutable
/// thereafter. Shared read-only across workers.
#[derive(Debug, Clone)]
pub struct ShellOrdering {
    orders: Vec<ShellOrder>,
}

impl ShellOrdering {
    pub fn new(geometry: &ProbeGeometry) -> LocalizeResult<Self> {
        let orders = (0..geometry.channel_count())
            .map(|ch| ShellOrder::build(geometry, ch))
            .collect::<LocalizeResult<_>>()?;
        Ok(Self { orders })
    }

    pub fn order(&self, channel: usize) -> LocalizeResult<&ShellOrder> {
        self.orders.get(channel).ok_or_else(|| {
            LocalizeError::Config(format!(
                "channel {} has no shell order ({} contacts)",
                channel,
                self.orders.len()
            ))
        })
    }

    /// Clamps `amplitudes` in place so they never increase with shell
    /// distance from `reference`.
    ///
    /// `neighbor_channels` names the channel behind each amplitude slot and
    /// must be sorted ascending (as produced by
    /// [`ProbeGeometry::neighbors`]). Shell 0 is unconstrained; every
    /// amplitude in shell k is clamped to the minimum amplitude of shell
    /// k - 1 after that shell's own clamping. Scoped to a single peak; no
    /// state survives the call.
    pub fn enforce_decrease(
        &self,
        reference: usize,
        neighbor_channels: &[usize],
        amplitudes: &mut [f32],
    ) -> LocalizeResult<()> {
        if neighbor_channels.len() != amplitudes.len() {
            return Err(LocalizeError::InvalidInput(format!(
                "amplitude vector has {} slots for {} neighbor channels",
                amplitudes.len(),
                neighbor_channels.len()
            )));
        }

        let order = self.order(reference)?;
        let mut previous_min = f32::INFINITY;
        for (shell_index, shell) in order.shells().iter().enumerate() {
            let mut shell_min = f32::INFINITY;
            for channel in shell {
                let slot = match neighbor_channels.binary_search(channel) {
                    Ok(slot) => slot,
                    Err(_) => continue,
                };
                if shell_index > 0 && amplitudes[slot] > previous_min {
                    amplitudes[slot] = previous_min;
                }
                shell_min = shell_min.min(amplitudes[slot]);
            }
            if shell_min.is_finite() {
                previous_min = shell_min;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_geometry(count: usize) -> ProbeGeometry {
        let positions = (0..count).map(|i| [i as f32 * 20.0, 0.0]).collect();
        ProbeGeometry::new(positions, 100.0).unwrap()
    }

    #[test]
    fn shells_group_equal_distances() {
        // Channel 2 of a 5-contact line: 1 and 3 are both 20 um away, 0 and
        // 4 both 40 um.
        let ordering = ShellOrdering::new(&linear_geometry(5)).unwrap();
        let shells = ordering.order(2).unwrap().shells();
        assert_eq!(shells[0], vec![2]);
        assert_eq!(shells[1], vec![1, 3]);
        assert_eq!(shells[2], vec![0, 4]);
    }

    #[test]
    fn shell_distances_are_non_decreasing() {
        let geometry = linear_geometry(6);
        let ordering = ShellOrdering::new(&geometry).unwrap();
        for ch in 0..6 {
            let shells = ordering.order(ch).unwrap().shells();
            let mut last_max = 0.0f32;
            for shell in shells {
                let mut shell_min = f32::INFINITY;
                let mut shell_max = 0.0f32;
                for &other in shell {
                    let d = geometry.distance(ch, other).unwrap();
                    shell_min = shell_min.min(d);
                    shell_max = shell_max.max(d);
                }
                assert!(shell_min + SHELL_TOLERANCE_UM >= last_max);
                last_max = shell_max;
            }
        }
    }

    #[test]
    fn enforce_decrease_clamps_outward() {
        let geometry = linear_geometry(5);
        let ordering = ShellOrdering::new(&geometry).unwrap();
        let neighbors: Vec<usize> = geometry.neighbors(2).unwrap().to_vec();
        assert_eq!(neighbors, vec![0, 1, 2, 3, 4]);

        // Channel 4 (outer shell) is louder than the inner ring.
        let mut amplitudes = vec![1.0, 4.0, 10.0, 3.0, 7.0];
        ordering
            .enforce_decrease(2, &neighbors, &mut amplitudes)
            .unwrap();
        // Shell 1 = {1, 3} min is 3.0; shell 2 = {0, 4} clamps to 3.0.
        assert_eq!(amplitudes, vec![1.0, 4.0, 10.0, 3.0, 3.0]);

        // Every shell is bounded by the previous shell's minimum.
        let shells = ordering.order(2).unwrap().shells();
        let mut previous_min = f32::INFINITY;
        for (k, shell) in shells.iter().enumerate() {
            let values: Vec<f32> = shell
                .iter()
                .map(|ch| amplitudes[neighbors.binary_search(ch).unwrap()])
                .collect();
            if k > 0 {
                assert!(values.iter().all(|&v| v <= previous_min));
            }
            previous_min = values.iter().fold(f32::INFINITY, |m, &v| m.min(v));
        }
    }

    #[test]
    fn already_decreasing_amplitudes_are_untouched() {
        let geometry = linear_geometry(5);
        let ordering = ShellOrdering::new(&geometry).unwrap();
        let neighbors: Vec<usize> = geometry.neighbors(2).unwrap().to_vec();
        let mut amplitudes = vec![2.0, 5.0, 9.0, 5.0, 2.0];
        let original = amplitudes.clone();
        ordering
            .enforce_decrease(2, &neighbors, &mut amplitudes)
            .unwrap();
        assert_eq!(amplitudes, original);
    }

    #[test]
    fn mismatched_amplitude_length_is_rejected() {
        let geometry = linear_geometry(4);
        let ordering = ShellOrdering::new(&geometry).unwrap();
        let neighbors: Vec<usize> = geometry.neighbors(1).unwrap().to_vec();
        let mut amplitudes = vec![1.0; neighbors.len() + 1];
        assert!(ordering
            .enforce_decrease(1, &neighbors, &mut amplitudes)
            .is_err());
    }
}
