//! Dimension and label annotations, built as schemes.
//!
//! Arrow heads are little revolution cones in `ScaleScreen` spaces so they
//! keep a constant pixel size; leader and measure lines are world-space and
//! layer-biased so they stay visible over the surfaces they annotate.
//! Text itself is out of scope here: the builders accept an opaque
//! component the host anchors at the note tail.

use glam::{Quat, Vec3};
use shared::{MeshSnapshot, WebSnapshot};

use crate::display::Displayable;
use crate::scheme::Scheme;
use crate::space::Space;

/// Depth bias of annotation lines; negative pulls them toward the camera
const NOTE_LAYER: f32 = -5e-3;
/// Arrow head size in scale-space units (pixel-sized under `ScaleScreen`)
const ARROW_LENGTH: f32 = 16.0;
const ARROW_RADIUS: f32 = 4.0;
const ARROW_DIVISIONS: u32 = 8;
/// Horizontal tail a label hangs from, in halo-screen units
const TAIL_LENGTH: f32 = 24.0;
/// Segments of an angular-dimension arc
const ARC_DIVISIONS: u32 = 16;
/// Radial legs run a little past the arc
const ARC_LEG_OVERSHOOT: f32 = 1.05;

// ── Anchor placement ─────────────────────────────────────────

/// Anchor a note on a surface: the face nearest the barycenter, pointed
/// along its normal.
pub fn mesh_placement(mesh: &MeshSnapshot) -> (Vec3, Vec3) {
    if mesh.faces.is_empty() {
        return (mesh.barycenter(), Vec3::Z);
    }
    let bary = mesh.barycenter();
    let nearest = (0..mesh.faces.len())
        .min_by(|&a, &b| {
            let da = mesh.face_center(a).distance_squared(bary);
            let db = mesh.face_center(b).distance_squared(bary);
            da.total_cmp(&db)
        })
        .unwrap_or(0);
    (mesh.face_center(nearest), mesh.face_normal(nearest))
}

/// Anchor a note on a wireframe: the edge nearest the barycenter, pointed
/// perpendicular to it.
pub fn web_placement(web: &WebSnapshot) -> (Vec3, Vec3) {
    if web.edges.is_empty() {
        return (web.barycenter(), Vec3::Z);
    }
    let bary = web.barycenter();
    let nearest = (0..web.edges.len())
        .min_by(|&a, &b| {
            let da = web.edge_center(a).distance_squared(bary);
            let db = web.edge_center(b).distance_squared(bary);
            da.total_cmp(&db)
        })
        .unwrap_or(0);
    let normal = web.edge_direction(nearest).any_orthonormal_vector();
    (web.edge_center(nearest), normal)
}

pub fn point_placement(point: Vec3) -> (Vec3, Vec3) {
    (point, Vec3::Z)
}

// ── Arrow geometry ───────────────────────────────────────────

/// Revolution cone from `summit` opening along `axis`
fn cone_mesh(summit: Vec3, axis: Vec3, length: f32, radius: f32, divisions: u32) -> MeshSnapshot {
    let axis = axis.normalize_or_zero();
    let x = axis.any_orthonormal_vector();
    let y = axis.cross(x);
    let base = summit + axis * length;

    let mut points = Vec::with_capacity(divisions as usize + 2);
    points.push(summit.to_array());
    for i in 0..divisions {
        let angle = std::f32::consts::TAU * i as f32 / divisions as f32;
        let rim = base + (x * angle.cos() + y * angle.sin()) * radius;
        points.push(rim.to_array());
    }
    points.push(base.to_array());

    let center = divisions + 1;
    let mut faces = Vec::with_capacity(2 * divisions as usize);
    for i in 0..divisions {
        let a = 1 + i;
        let b = 1 + (i + 1) % divisions;
        faces.push([0, a, b]);
        faces.push([center, b, a]);
    }
    MeshSnapshot::new(points, faces)
}

fn add_arrow(scheme: &mut Scheme, anchor: Vec3, direction: Vec3) {
    scheme.set_space(Space::ScaleScreen(anchor)).set_shader("fill");
    scheme.add_mesh(&cone_mesh(
        Vec3::ZERO,
        direction,
        ARROW_LENGTH,
        ARROW_RADIUS,
        ARROW_DIVISIONS,
    ));
    scheme.set_shader("line");
}

// ── Note builders ────────────────────────────────────────────

/// A leader note: arrow head on the anchor, leader line along `normal`,
/// horizontal tail for a label component at the free end.
pub fn note_leading(
    anchor: Vec3,
    normal: Vec3,
    length: f32,
    label: Option<Box<dyn Displayable>>,
) -> Scheme {
    let direction = normal.normalize_or_zero();
    let tip = anchor + direction * length;

    let mut scheme = Scheme::new();
    scheme.set_layer(NOTE_LAYER);
    scheme.add_points(&[anchor, tip]);
    add_arrow(&mut scheme, anchor, direction);

    // the tail always extends rightward; the label reads left to right
    scheme.set_space(Space::HaloScreen(tip));
    scheme.add_points(&[Vec3::ZERO, Vec3::new(TAIL_LENGTH, 0.0, 0.0)]);
    if let Some(label) = label {
        scheme.add_component(label);
    }
    scheme
}

/// A distance note between `a` and `b`: extension lines along `offset`,
/// a measure line with an arrow head at each end, and an optional label
/// component anchored at the middle.
pub fn note_distance(
    a: Vec3,
    b: Vec3,
    offset: Vec3,
    label: Option<Box<dyn Displayable>>,
) -> Scheme {
    let ao = a + offset;
    let bo = b + offset;
    let along = (bo - ao).normalize_or_zero();

    let mut scheme = Scheme::new();
    scheme.set_layer(NOTE_LAYER);
    scheme.add_points(&[a, ao]);
    scheme.add_points(&[b, bo]);
    scheme.add_points(&[ao, bo]);
    add_arrow(&mut scheme, ao, along);
    add_arrow(&mut scheme, bo, -along);

    scheme.set_space(Space::HaloScreen(ao.midpoint(bo)));
    if let Some(label) = label {
        scheme.add_component(label);
    }
    scheme
}

/// An angle note between two directions meeting at `center`: radial legs,
/// an arc at `radius` with an arrow head tangent to each end, and an
/// optional label component anchored at the arc middle.
pub fn note_angle(
    center: Vec3,
    d0: Vec3,
    d1: Vec3,
    radius: f32,
    label: Option<Box<dyn Displayable>>,
) -> Scheme {
    let d0 = d0.normalize_or_zero();
    let d1 = d1.normalize_or_zero();
    let cross = d0.cross(d1);
    // parallel directions leave the arc plane free; pick one
    let (axis, angle) = if cross.length_squared() < 1e-12 {
        let fallback = if d0.dot(d1) < 0.0 { std::f32::consts::PI } else { 0.0 };
        (d0.any_orthonormal_vector(), fallback)
    } else {
        (cross.normalize(), d0.angle_between(d1))
    };
    let at = |t: f32| center + Quat::from_axis_angle(axis, t * angle) * d0 * radius;

    let mut scheme = Scheme::new();
    scheme.set_layer(NOTE_LAYER);
    scheme.add_points(&[center, center + d0 * radius * ARC_LEG_OVERSHOOT]);
    scheme.add_points(&[center, center + d1 * radius * ARC_LEG_OVERSHOOT]);

    let arc: Vec<Vec3> = (0..=ARC_DIVISIONS)
        .map(|i| at(i as f32 / ARC_DIVISIONS as f32))
        .collect();
    scheme.add_points(&arc);

    // arrows sit on the arc ends, opening along the tangent into the arc
    add_arrow(&mut scheme, at(0.0), axis.cross(d0));
    add_arrow(&mut scheme, at(1.0), -axis.cross(d1));

    scheme.set_space(Space::HaloScreen(at(0.5)));
    if let Some(label) = label {
        scheme.add_component(label);
    }
    scheme
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::assemble;

    fn quad() -> MeshSnapshot {
        MeshSnapshot::new(
            vec![
                [0.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [2.0, 2.0, 0.0],
                [0.0, 2.0, 0.0],
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn mesh_placement_sits_on_the_surface() {
        let (pos, normal) = mesh_placement(&quad());
        assert_eq!(pos.z, 0.0);
        assert!((normal.length() - 1.0).abs() < 1e-6);
        assert_eq!(normal.abs(), Vec3::Z);
    }

    #[test]
    fn web_placement_is_perpendicular_to_its_edge() {
        let web = WebSnapshot::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]],
            vec![[0, 1], [1, 2]],
        );
        let (pos, normal) = web_placement(&web);
        assert!((normal.length() - 1.0).abs() < 1e-6);
        // the anchor is one of the edge centers
        assert!(pos == Vec3::new(0.5, 0.0, 0.0) || pos == Vec3::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn cone_is_a_closed_surface() {
        let mesh = cone_mesh(Vec3::ZERO, Vec3::Z, 2.0, 1.0, 8);
        assert_eq!(mesh.points.len(), 10);
        assert_eq!(mesh.faces.len(), 16);
        // every rim edge is shared by a side face and a base face
        assert!(mesh.group_outlines().is_empty());
    }

    #[test]
    fn leading_note_assembles() {
        let scheme = note_leading(Vec3::ZERO, Vec3::Z, 2.0, None);
        let spaces = scheme.spaces().to_vec();
        assert!(spaces.contains(&Space::ScaleScreen(Vec3::ZERO)));
        assert!(spaces.contains(&Space::HaloScreen(Vec3::new(0.0, 0.0, 2.0))));

        let assembly = assemble(scheme).unwrap();
        // leader + tail lines and the arrow cone
        assert!(!assembly.packed.is_empty());
        assert_eq!(assembly.batches.len(), 2);
    }

    #[test]
    fn distance_note_measures_between_offsets() {
        let scheme = note_distance(Vec3::ZERO, Vec3::X, Vec3::Y, None);
        let lines = scheme.batch("line").unwrap().to_vec();
        let verts = scheme.vertices();
        // extension pairs first, then the measure line between the offsets
        assert_eq!(lines, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(verts[4].pos, Vec3::Y);
        assert_eq!(verts[5].pos, Vec3::new(1.0, 1.0, 0.0));

        assert!(assemble(scheme).is_ok());
    }

    #[test]
    fn angle_note_arcs_between_the_directions() {
        let scheme = note_angle(Vec3::ZERO, Vec3::X, Vec3::Y, 2.0, None);

        // one scale-screen arrow per arc end
        let arrows = scheme
            .spaces()
            .iter()
            .filter(|s| matches!(s, Space::ScaleScreen(_)))
            .count();
        assert_eq!(arrows, 2);

        // the arc stays on the dimension circle and bisects the angle
        let on_arc: Vec<Vec3> = scheme
            .vertices()
            .iter()
            .filter(|v| v.space == 0 && (v.pos.length() - 2.0).abs() < 1e-4)
            .map(|v| v.pos)
            .collect();
        assert!(on_arc.contains(&Vec3::new(2.0, 0.0, 0.0)));
        assert!(on_arc.iter().any(|p| p.distance(Vec3::new(0.0, 2.0, 0.0)) < 1e-4));
        let bisector = Vec3::new(1.0, 1.0, 0.0).normalize() * 2.0;
        assert!(on_arc.iter().any(|p| p.distance(bisector) < 1e-3));

        assert!(assemble(scheme).is_ok());
    }

    #[test]
    fn angle_note_with_parallel_directions_degenerates_cleanly() {
        let scheme = note_angle(Vec3::ZERO, Vec3::X, Vec3::X, 1.0, None);
        assert!(assemble(scheme).is_ok());
    }
}
