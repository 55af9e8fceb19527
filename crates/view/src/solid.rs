//! Composite displays for kernel geometry: solids (surface meshes) and webs
//! (edge wireframes).
//!
//! A composite owns one shared vertex store and one primitive sub-display
//! per aspect of the geometry. The visible aspects are chosen per frame from
//! `DisplayOptions`, while picking always goes through a single canonical
//! sub-display so the ident range stays one-per-group.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::display::{ControlEvent, Display, DisplayHandle, Displayable};
use crate::error::Result;
use crate::prims::{FacesDisplay, LinesDisplay, PointsDisplay};
use crate::scene::{Frame, Scene};
use crate::vertices::SharedVertices;

const VERTEX_MARKER_SIZE: f32 = 3.0;

/// Unique undirected edges of a triangle set, for the wireframe overlay
fn face_edges(faces: &[[u32; 3]]) -> Vec<[u32; 2]> {
    let mut edges = BTreeSet::new();
    for &[a, b, c] in faces {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            edges.insert(if u < v { [u, v] } else { [v, u] });
        }
    }
    edges.into_iter().collect()
}

// ── Solid ────────────────────────────────────────────────────

/// A surface mesh: filled faces, group boundary lines, optional wireframe
/// overlay and vertex markers. One pickable ident per face group.
pub struct SolidDisplay {
    vertices: Rc<RefCell<SharedVertices>>,
    faces: FacesDisplay,
    groups: LinesDisplay,
    wire: LinesDisplay,
    points: PointsDisplay,
}

impl SolidDisplay {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scene: &mut Scene,
        world: Mat4,
        positions: Vec<[f32; 3]>,
        idents: Vec<u32>,
        normals: &[[f32; 3]],
        faces: &[[u32; 3]],
        outlines: &[[u32; 2]],
        color: Option<Vec3>,
    ) -> Result<Self> {
        let palette = scene.palette();
        let color = color.unwrap_or(palette.solid_color);
        let line_color = palette.line_color;

        let vertices = Rc::new(RefCell::new(SharedVertices::new(positions, idents, world)?));
        let wire = face_edges(faces);
        Ok(Self {
            faces: FacesDisplay::new(scene, vertices.clone(), normals, faces, color)?,
            groups: LinesDisplay::new(scene, vertices.clone(), outlines, line_color)?,
            wire: LinesDisplay::new(scene, vertices.clone(), &wire, line_color)?,
            points: PointsDisplay::new(
                scene,
                vertices.clone(),
                None,
                line_color,
                VERTEX_MARKER_SIZE,
            )?,
            vertices,
        })
    }

    pub fn from_mesh(
        scene: &mut Scene,
        mesh: &shared::MeshSnapshot,
        world: Mat4,
        color: Option<Vec3>,
    ) -> Result<Self> {
        let normals: Vec<[f32; 3]> = mesh.vertex_normals().iter().map(|n| n.to_array()).collect();
        Self::new(
            scene,
            world,
            mesh.points.clone(),
            mesh.vertex_groups(),
            &normals,
            &mesh.faces,
            &mesh.group_outlines(),
            color,
        )
    }

    pub fn vertices(&self) -> &Rc<RefCell<SharedVertices>> {
        &self.vertices
    }
}

impl Display for SolidDisplay {
    fn render(&mut self, frame: &Frame) {
        self.vertices.borrow_mut().sync(&frame.gl);
        if frame.options.display_faces {
            self.faces.render(frame);
        }
        if frame.options.display_groups {
            self.groups.render(frame);
        }
        if frame.options.display_wire {
            self.wire.render(frame);
        }
        if frame.options.display_points {
            self.points.render(frame);
        }
    }

    /// Picking draws the faces only; every sub-display shares the same
    /// per-group idents, so one draw covers them all.
    fn identify(&mut self, frame: &Frame, start_ident: u32) -> u32 {
        self.vertices.borrow_mut().sync(&frame.gl);
        self.faces.identify(frame, start_ident)
    }

    fn control(&mut self, _frame: &Frame, _group: u32, ident: u32, event: ControlEvent) {
        if event == ControlEvent::Click {
            self.vertices.borrow_mut().toggle(ident);
        }
    }

    fn select(&mut self, idents: &[u32], state: bool) {
        self.vertices.borrow_mut().set_selected(idents, state);
    }

    fn selected(&self, ident: u32) -> bool {
        self.vertices.borrow().is_selected(ident)
    }

    fn set_world(&mut self, world: Mat4) {
        self.vertices.borrow_mut().transform = world;
    }
}

// ── Web ──────────────────────────────────────────────────────

/// An edge wireframe: segments, group extremity markers and optional vertex
/// markers. One pickable ident per edge group.
pub struct WebDisplay {
    vertices: Rc<RefCell<SharedVertices>>,
    edges: LinesDisplay,
    extremities: PointsDisplay,
    points: PointsDisplay,
}

impl WebDisplay {
    pub fn new(
        scene: &mut Scene,
        world: Mat4,
        positions: Vec<[f32; 3]>,
        idents: Vec<u32>,
        edges: &[[u32; 2]],
        extremities: &[u32],
        color: Option<Vec3>,
    ) -> Result<Self> {
        let color = color.unwrap_or(scene.palette().line_color);

        let vertices = Rc::new(RefCell::new(SharedVertices::new(positions, idents, world)?));
        Ok(Self {
            edges: LinesDisplay::new(scene, vertices.clone(), edges, color)?,
            extremities: PointsDisplay::new(
                scene,
                vertices.clone(),
                Some(extremities),
                color,
                VERTEX_MARKER_SIZE + 2.0,
            )?,
            points: PointsDisplay::new(scene, vertices.clone(), None, color, VERTEX_MARKER_SIZE)?,
            vertices,
        })
    }

    pub fn from_web(
        scene: &mut Scene,
        web: &shared::WebSnapshot,
        world: Mat4,
        color: Option<Vec3>,
    ) -> Result<Self> {
        Self::new(
            scene,
            world,
            web.points.clone(),
            web.vertex_groups(),
            &web.edges,
            &web.group_extremities(),
            color,
        )
    }

    pub fn vertices(&self) -> &Rc<RefCell<SharedVertices>> {
        &self.vertices
    }
}

impl Display for WebDisplay {
    fn render(&mut self, frame: &Frame) {
        self.vertices.borrow_mut().sync(&frame.gl);
        self.edges.render(frame);
        if frame.options.display_groups {
            self.extremities.render(frame);
        }
        if frame.options.display_points {
            self.points.render(frame);
        }
    }

    fn identify(&mut self, frame: &Frame, start_ident: u32) -> u32 {
        self.vertices.borrow_mut().sync(&frame.gl);
        self.edges.identify(frame, start_ident)
    }

    fn control(&mut self, _frame: &Frame, _group: u32, ident: u32, event: ControlEvent) {
        if event == ControlEvent::Click {
            self.vertices.borrow_mut().toggle(ident);
        }
    }

    fn select(&mut self, idents: &[u32], state: bool) {
        self.vertices.borrow_mut().set_selected(idents, state);
    }

    fn selected(&self, ident: u32) -> bool {
        self.vertices.borrow().is_selected(ident)
    }

    fn set_world(&mut self, world: Mat4) {
        self.vertices.borrow_mut().transform = world;
    }
}

impl Displayable for shared::MeshSnapshot {
    fn display(&self, scene: &mut Scene) -> Result<DisplayHandle> {
        let display = SolidDisplay::from_mesh(scene, self, Mat4::IDENTITY, None)?;
        Ok(Rc::new(RefCell::new(display)))
    }
}

impl Displayable for shared::WebSnapshot {
    fn display(&self, scene: &mut Scene) -> Result<DisplayHandle> {
        let display = WebDisplay::from_web(scene, self, Mat4::IDENTITY, None)?;
        Ok(Rc::new(RefCell::new(display)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_edges_are_unique_and_undirected() {
        // two triangles sharing the edge 1-2
        let edges = face_edges(&[[0, 1, 2], [2, 1, 3]]);
        assert_eq!(edges, vec![[0, 1], [0, 2], [1, 2], [1, 3], [2, 3]]);
    }

    #[test]
    fn face_edges_of_empty_mesh() {
        assert!(face_edges(&[]).is_empty());
    }
}
