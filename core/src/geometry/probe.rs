use crate::prelude::{LocalizeError, LocalizeResult};

/// Immutable contact layout shared by every strategy for a pipeline run.
///
/// Built once before any buffer is processed; the neighbor mask pairs every
/// channel with the channels within `local_radius_um` of it.
#[derive(Debug, Clone)]
pub struct ProbeGeometry {
    positions: Vec<[f32; 2]>,
    neighbors: Vec<Vec<usize>>,
    local_radius_um: f32,
}

impl ProbeGeometry {
    pub fn new(positions: Vec<[f32; 2]>, local_radius_um: f32) -> LocalizeResult<Self> {
        if positions.is_empty() {
            return Err(LocalizeError::Config(
                "probe geometry has no contacts".into(),
            ));
        }
        if !local_radius_um.is_finite() || local_radius_um <= 0.0 {
            return Err(LocalizeError::Config(format!(
                "local_radius_um must be positive, got {}",
                local_radius_um
            )));
        }

        let mut neighbors = Vec::with_capacity(positions.len());
        for i in 0..positions.len() {
            let mut around = Vec::new();
            for j in 0..positions.len() {
                if planar_distance(positions[i], positions[j]) <= local_radius_um {
                    around.push(j);
                }
            }
            neighbors.push(around);
        }

        Ok(Self {
            positions,
            neighbors,
            local_radius_um,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.positions.len()
    }

    pub fn local_radius_um(&self) -> f32 {
        self.local_radius_um
    }

    pub fn position(&self, channel: usize) -> LocalizeResult<[f32; 2]> {
        self.positions
            .get(channel)
            .copied()
            .ok_or_else(|| channel_mismatch(channel, self.positions.len()))
    }

    /// Channels within `local_radius_um` of `channel`, ascending, including
    /// the channel itself.
    pub fn neighbors(&self, channel: usize) -> LocalizeResult<&[usize]> {
        self.neighbors
            .get(channel)
            .map(|n| n.as_slice())
            .ok_or_else(|| channel_mismatch(channel, self.positions.len()))
    }

    pub fn distance(&self, a: usize, b: usize) -> LocalizeResult<f32> {
        Ok(planar_distance(self.position(a)?, self.position(b)?))
    }
}

fn planar_distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

fn channel_mismatch(channel: usize, count: usize) -> LocalizeError {
    LocalizeError::Config(format!(
        "channel {} is outside the probe geometry ({} contacts)",
        channel, count
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_probe(pitch: f32, count: usize) -> Vec<[f32; 2]> {
        (0..count).map(|i| [i as f32 * pitch, 0.0]).collect()
    }

    #[test]
    fn neighbor_mask_respects_radius() {
        let geometry = ProbeGeometry::new(linear_probe(20.0, 5), 45.0).unwrap();
        assert_eq!(geometry.neighbors(0).unwrap(), &[0, 1, 2]);
        assert_eq!(geometry.neighbors(2).unwrap(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn neighbor_mask_is_symmetric() {
        let geometry = ProbeGeometry::new(linear_probe(25.0, 6), 60.0).unwrap();
        for i in 0..6 {
            for j in 0..6 {
                let ij = geometry.neighbors(i).unwrap().contains(&j);
                let ji = geometry.neighbors(j).unwrap().contains(&i);
                assert_eq!(ij, ji);
            }
        }
    }

    #[test]
    fn out_of_range_channel_is_config_error() {
        let geometry = ProbeGeometry::new(linear_probe(20.0, 4), 50.0).unwrap();
        assert!(matches!(
            geometry.position(7),
            Err(LocalizeError::Config(_))
        ));
    }

    #[test]
    fn empty_probe_is_rejected() {
        assert!(ProbeGeometry::new(Vec::new(), 50.0).is_err());
        assert!(ProbeGeometry::new(linear_probe(20.0, 4), 0.0).is_err());
    }
}
