use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::aabb::Aabb;

/// Read-only triangle-mesh snapshot produced by the modeling kernel.
///
/// `tracks` carries one group id per face; all faces of one logical surface
/// (a planar face, a fillet band) share a track so they select together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSnapshot {
    pub points: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
    pub tracks: Vec<u32>,
}

impl MeshSnapshot {
    /// Mesh with all faces in group 0
    pub fn new(points: Vec<[f32; 3]>, faces: Vec<[u32; 3]>) -> Self {
        let tracks = vec![0; faces.len()];
        Self { points, faces, tracks }
    }

    pub fn with_tracks(points: Vec<[f32; 3]>, faces: Vec<[u32; 3]>, tracks: Vec<u32>) -> Self {
        debug_assert_eq!(faces.len(), tracks.len());
        Self { points, faces, tracks }
    }

    pub fn point(&self, i: u32) -> Vec3 {
        Vec3::from_array(self.points[i as usize])
    }

    pub fn face_points(&self, f: usize) -> [Vec3; 3] {
        let [a, b, c] = self.faces[f];
        [self.point(a), self.point(b), self.point(c)]
    }

    pub fn face_center(&self, f: usize) -> Vec3 {
        let [a, b, c] = self.face_points(f);
        (a + b + c) / 3.0
    }

    pub fn face_normal(&self, f: usize) -> Vec3 {
        let [a, b, c] = self.face_points(f);
        (b - a).cross(c - a).normalize_or_zero()
    }

    /// Per-vertex normals: normalized plain sum of incident face normals
    /// (no area or angle weighting).
    pub fn vertex_normals(&self) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; self.points.len()];
        for f in 0..self.faces.len() {
            let n = self.face_normal(f);
            for &v in &self.faces[f] {
                normals[v as usize] += n;
            }
        }
        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        normals
    }

    /// Per-vertex group ids: each face propagates its track onto its corners.
    /// Vertices shared by several groups end up with the last writer, which
    /// is the same tie-break the selection highlight uses.
    pub fn vertex_groups(&self) -> Vec<u32> {
        let mut groups = vec![0; self.points.len()];
        for (face, &track) in self.faces.iter().zip(&self.tracks) {
            for &v in face {
                groups[v as usize] = track;
            }
        }
        groups
    }

    /// Edges that outline face groups: boundary edges plus edges shared by
    /// faces of different tracks.
    pub fn group_outlines(&self) -> Vec<[u32; 2]> {
        // edge key -> (occurrences, track of first face seen, mixed tracks)
        let mut edges: HashMap<(u32, u32), (u32, u32, bool)> = HashMap::new();
        for (face, &track) in self.faces.iter().zip(&self.tracks) {
            for k in 0..3 {
                let a = face[k];
                let b = face[(k + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                let entry = edges.entry(key).or_insert((0, track, false));
                entry.0 += 1;
                if entry.1 != track {
                    entry.2 = true;
                }
            }
        }
        let mut outlines: Vec<[u32; 2]> = edges
            .into_iter()
            .filter(|&(_, (count, _, mixed))| count == 1 || mixed)
            .map(|((a, b), _)| [a, b])
            .collect();
        outlines.sort_unstable();
        outlines
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

    /// Unit quad in the XY plane, split along the (0,2) diagonal.
    fn quad(tracks: Vec<u32>) -> MeshSnapshot {
        MeshSnapshot::with_tracks(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            vec![[0, 1, 2], [0, 2, 3]],
            tracks,
        )
    }

    #[test]
    fn face_normal_orientation() {
        let m = quad(vec![0, 0]);
        assert!((m.face_normal(0) - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn vertex_normals_are_unweighted_average() {
        // Two faces folded along the Y axis: +Z and +X normals.
        let m = MeshSnapshot::new(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 0.0, -1.0],
            ],
            vec![[0, 1, 2], [0, 3, 1]],
        );
        let normals = m.vertex_normals();
        // vertex 2 only touches the first face
        assert!((normals[2] - Vec3::Z).length() < 1e-6);
        // vertex 0 touches both: normalized sum of the two face normals
        let expected = (Vec3::Z + m.face_normal(1)).normalize();
        assert!((normals[0] - expected).length() < 1e-6);
    }

    #[test]
    fn vertex_groups_backpropagate() {
        let m = quad(vec![4, 7]);
        let groups = m.vertex_groups();
        assert_eq!(groups[1], 4); // only in face 0
        assert_eq!(groups[3], 7); // only in face 1
        assert_eq!(groups[0], 7); // shared, last writer
    }

    #[test]
    fn group_outlines_single_group() {
        let m = quad(vec![0, 0]);
        // one group: only the 4 boundary edges, not the diagonal
        assert_eq!(
            m.group_outlines(),
            vec![[0, 1], [0, 3], [1, 2], [2, 3]]
        );
    }

    #[test]
    fn group_outlines_split_groups() {
        let m = quad(vec![0, 1]);
        // two groups: the diagonal separates them
        assert_eq!(
            m.group_outlines(),
            vec![[0, 1], [0, 2], [0, 3], [1, 2], [2, 3]]
        );
    }

    #[test]
    fn serde_roundtrip() {
        let m = quad(vec![0, 1]);
        let json = serde_json::to_string(&m).unwrap();
        let back: MeshSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
