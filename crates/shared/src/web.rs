use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::aabb::Aabb;

/// Read-only edge-set snapshot (a wireframe net) from the modeling kernel.
///
/// `tracks` carries one group id per edge; all edges of one logical curve
/// share a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSnapshot {
    pub points: Vec<[f32; 3]>,
    pub edges: Vec<[u32; 2]>,
    pub tracks: Vec<u32>,
}

impl WebSnapshot {
    /// Web with all edges in group 0
    pub fn new(points: Vec<[f32; 3]>, edges: Vec<[u32; 2]>) -> Self {
        let tracks = vec![0; edges.len()];
        Self { points, edges, tracks }
    }

    pub fn with_tracks(points: Vec<[f32; 3]>, edges: Vec<[u32; 2]>, tracks: Vec<u32>) -> Self {
        debug_assert_eq!(edges.len(), tracks.len());
        Self { points, edges, tracks }
    }

    pub fn point(&self, i: u32) -> Vec3 {
        Vec3::from_array(self.points[i as usize])
    }

    pub fn edge_center(&self, e: usize) -> Vec3 {
        let [a, b] = self.edges[e];
        (self.point(a) + self.point(b)) * 0.5
    }

    pub fn edge_direction(&self, e: usize) -> Vec3 {
        let [a, b] = self.edges[e];
        (self.point(b) - self.point(a)).normalize_or_zero()
    }

    /// Per-vertex group ids: each edge propagates its track onto its
    /// endpoints, last writer wins.
    pub fn vertex_groups(&self) -> Vec<u32> {
        let mut groups = vec![0; self.points.len()];
        for (edge, &track) in self.edges.iter().zip(&self.tracks) {
            for &v in edge {
                groups[v as usize] = track;
            }
        }
        groups
    }

    /// Points where a curve group starts or stops: endpoints used by exactly
    /// one edge, or shared by edges of different tracks.
    pub fn group_extremities(&self) -> Vec<u32> {
        let mut uses: Vec<(u32, u32, bool)> = vec![(0, 0, false); self.points.len()];
        for (edge, &track) in self.edges.iter().zip(&self.tracks) {
            for &v in edge {
                let entry = &mut uses[v as usize];
                if entry.0 == 0 {
                    entry.1 = track;
                } else if entry.1 != track {
                    entry.2 = true;
                }
                entry.0 += 1;
            }
        }
        uses.iter()
            .enumerate()
            .filter(|&(_, &(count, _, mixed))| count == 1 || mixed)
            .map(|(i, _)| i as u32)
            .collect()
    }

    pub fn barycenter(&self) -> Vec3 {
        if self.points.is_empty() {
            return Vec3::ZERO;
        }
        let sum: Vec3 = self.points.iter().map(|&p| Vec3::from_array(p)).sum();
        sum / self.points.len() as f32
    }

    pub fn bounding_box(&self) -> Aabb {
        Aabb::from_points(self.points.iter().map(|&p| Vec3::from_array(p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polyline(tracks: Vec<u32>) -> WebSnapshot {
        WebSnapshot::with_tracks(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [3.0, 0.0, 0.0],
            ],
            vec![[0, 1], [1, 2], [2, 3]],
            tracks,
        )
    }

    #[test]
    fn extremities_single_track() {
        let w = polyline(vec![0, 0, 0]);
        // open polyline: only the two ends
        assert_eq!(w.group_extremities(), vec![0, 3]);
    }

    #[test]
    fn extremities_track_change() {
        let w = polyline(vec![0, 0, 5]);
        // the junction between tracks counts as an extremity
        assert_eq!(w.group_extremities(), vec![0, 2, 3]);
    }

    #[test]
    fn direction_normalized() {
        let w = polyline(vec![0, 0, 0]);
        assert!((w.edge_direction(1) - Vec3::X).length() < 1e-6);
    }
}
