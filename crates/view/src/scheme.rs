//! Declarative builder for annotation drawings.
//!
//! A `Scheme` accumulates vertices across several coordinate spaces and
//! shader batches, then compiles into one display drawing everything with a
//! single vertex buffer. Kinematic-style sketches, dimension notes and
//! gizmos are all schemes.
//!
//! The builder keeps a template vertex: every `set_*` call updates the
//! template, every `add_*` call stamps it onto the geometry it appends.
//! Assembly into packed buffers is pure; only `compile` touches GL.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};
use glow::HasContext;
use shared::{MeshSnapshot, WebSnapshot};

use crate::camera::CameraState;
use crate::display::{
    ControlEvent, Display, DisplayHandle, Displayable, Pass, StackSlot, PRIORITY_ANNOTATION,
};
use crate::error::{Result, ViewError};
use crate::scene::{Frame, Scene};
use crate::settings::Palette;
use crate::shaders::{self, shader_topology, SchemePrograms, Topology};
use crate::space::{self, Space, MAX_SPACES};

/// One annotation vertex. `space` indexes the scheme's space list; `track`
/// is the pickable group the vertex belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemeVertex {
    pub space: usize,
    pub pos: Vec3,
    pub normal: Vec3,
    pub color: Vec4,
    pub layer: f32,
    pub track: u32,
    pub flags: u32,
}

/// GPU layout of a scheme vertex; see the vertex shader attribute list
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedVertex {
    pub space: u32,
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [u8; 4],
    pub layer: f32,
    pub track: u32,
    pub flags: u32,
}

pub struct Scheme {
    spaces: Vec<Space>,
    vertices: Vec<SchemeVertex>,
    /// Index batches keyed by shader name
    batches: BTreeMap<String, Vec<u32>>,
    components: Vec<(usize, Box<dyn Displayable>)>,
    current: SchemeVertex,
    shader: String,
}

impl Default for Scheme {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheme {
    pub fn new() -> Self {
        Self {
            spaces: vec![Space::World],
            vertices: Vec::new(),
            batches: BTreeMap::new(),
            components: Vec::new(),
            current: SchemeVertex {
                space: 0,
                pos: Vec3::ZERO,
                normal: Vec3::ZERO,
                color: Palette::default().annotation_color,
                layer: 0.0,
                track: 0,
                flags: 0,
            },
            shader: "line".to_string(),
        }
    }

    // ── Template setters ─────────────────────────────────────

    /// Make `space` the current one, registering it if unseen. Vertices
    /// already added keep the space they were stamped with.
    pub fn set_space(&mut self, space: Space) -> &mut Self {
        self.current.space = match self.spaces.iter().position(|s| *s == space) {
            Some(i) => i,
            None => {
                self.spaces.push(space);
                self.spaces.len() - 1
            }
        };
        self
    }

    pub fn set_color(&mut self, color: Vec4) -> &mut Self {
        self.current.color = color;
        self
    }

    pub fn set_layer(&mut self, layer: f32) -> &mut Self {
        self.current.layer = layer;
        self
    }

    pub fn set_track(&mut self, track: u32) -> &mut Self {
        self.current.track = track;
        self
    }

    pub fn set_flags(&mut self, flags: u32) -> &mut Self {
        self.current.flags = flags;
        self
    }

    /// Shader names are resolved against the program table at compile
    pub fn set_shader(&mut self, shader: &str) -> &mut Self {
        self.shader = shader.to_string();
        self
    }

    pub fn spaces(&self) -> &[Space] {
        &self.spaces
    }

    pub fn vertices(&self) -> &[SchemeVertex] {
        &self.vertices
    }

    pub fn batch(&self, shader: &str) -> Option<&[u32]> {
        self.batches.get(shader).map(Vec::as_slice)
    }

    // ── Geometry ─────────────────────────────────────────────

    fn push_vertex(&mut self, pos: Vec3, normal: Vec3, track: u32) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(SchemeVertex {
            pos,
            normal,
            track,
            ..self.current
        });
        index
    }

    fn extend_batch(&mut self, indices: impl IntoIterator<Item = u32>) {
        self.batches
            .entry(self.shader.clone())
            .or_default()
            .extend(indices);
    }

    /// Append a surface: one vertex per mesh point with its averaged normal,
    /// one index triple per face. Face tracks are carried to the corners,
    /// offset by the template track.
    pub fn add_mesh(&mut self, mesh: &MeshSnapshot) -> &mut Self {
        let base = self.vertices.len() as u32;
        let normals = mesh.vertex_normals();
        let groups = mesh.vertex_groups();
        let offset = self.current.track;
        for (i, &p) in mesh.points.iter().enumerate() {
            self.push_vertex(Vec3::from_array(p), normals[i], offset + groups[i]);
        }
        let indices: Vec<u32> = mesh
            .faces
            .iter()
            .flat_map(|f| f.iter().map(|&i| base + i))
            .collect();
        self.extend_batch(indices);
        self
    }

    /// Append a wireframe: one index pair per edge, edge tracks carried to
    /// the endpoints.
    pub fn add_web(&mut self, web: &WebSnapshot) -> &mut Self {
        let base = self.vertices.len() as u32;
        let groups = web.vertex_groups();
        let offset = self.current.track;
        for (i, &p) in web.points.iter().enumerate() {
            self.push_vertex(Vec3::from_array(p), Vec3::ZERO, offset + groups[i]);
        }
        let indices: Vec<u32> = web
            .edges
            .iter()
            .flat_map(|e| e.iter().map(|&i| base + i))
            .collect();
        self.extend_batch(indices);
        self
    }

    /// Append an open polyline through the given points
    pub fn add_points(&mut self, points: &[Vec3]) -> &mut Self {
        let base = self.vertices.len() as u32;
        let track = self.current.track;
        for &p in points {
            self.push_vertex(p, Vec3::ZERO, track);
        }
        let n = points.len() as u32;
        let indices: Vec<u32> = (1..n).flat_map(|i| [base + i - 1, base + i]).collect();
        self.extend_batch(indices);
        self
    }

    /// Attach a nested display anchored in the current space; it will be
    /// constructed at compile and re-posed every frame.
    pub fn add_component(&mut self, component: Box<dyn Displayable>) -> &mut Self {
        self.components.push((self.current.space, component));
        self
    }

    /// Build the GL-side display. Pure assembly happens first, so a bad
    /// shader name or a ragged batch fails before any GL object exists.
    pub fn compile(self, scene: &mut Scene) -> Result<SchemeDisplay> {
        let programs = scene.scheme_programs()?;
        let mut scheme = self;
        let components = std::mem::take(&mut scheme.components);
        let assembly = assemble(scheme)?;

        let mut handles = Vec::with_capacity(components.len());
        for (space, component) in components {
            handles.push((space::clamp_index(space), component.display(scene)?));
        }

        let gl = scene.gl_handle();
        unsafe {
            let vbo = gl.create_buffer().map_err(ViewError::gl)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&assembly.packed),
                glow::DYNAMIC_DRAW,
            );

            let vao = gl.create_vertex_array().map_err(ViewError::gl)?;
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            let stride = std::mem::size_of::<PackedVertex>() as i32;
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_i32(0, 1, glow::UNSIGNED_INT, stride, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, 4);
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 3, glow::FLOAT, false, stride, 16);
            gl.enable_vertex_attrib_array(3);
            gl.vertex_attrib_pointer_f32(3, 4, glow::UNSIGNED_BYTE, true, stride, 28);
            gl.enable_vertex_attrib_array(4);
            gl.vertex_attrib_pointer_f32(4, 1, glow::FLOAT, false, stride, 32);
            gl.enable_vertex_attrib_array(5);
            gl.vertex_attrib_pointer_i32(5, 1, glow::UNSIGNED_INT, stride, 36);
            gl.enable_vertex_attrib_array(6);
            gl.vertex_attrib_pointer_i32(6, 1, glow::UNSIGNED_INT, stride, 40);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            let upload = |indices: &[u32], topology: Topology| -> Result<GpuBatch> {
                let ibo = gl.create_buffer().map_err(ViewError::gl)?;
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(ibo));
                gl.buffer_data_u8_slice(
                    glow::ARRAY_BUFFER,
                    bytemuck::cast_slice(indices),
                    glow::STATIC_DRAW,
                );
                gl.bind_buffer(glow::ARRAY_BUFFER, None);
                Ok(GpuBatch { topology, ibo, count: indices.len() as i32 })
            };

            let mut batches = Vec::with_capacity(assembly.batches.len());
            for batch in &assembly.batches {
                batches.push(upload(&batch.indices, batch.topology)?);
            }
            let mut ident_batches = Vec::with_capacity(assembly.ident_batches.len());
            for (&topology, indices) in &assembly.ident_batches {
                ident_batches.push(upload(indices, topology)?);
            }

            Ok(SchemeDisplay {
                world: Mat4::IDENTITY,
                spaces: assembly.spaces,
                packed: assembly.packed,
                selected: vec![false; assembly.nident as usize],
                dirty: false,
                nident: assembly.nident,
                programs,
                vbo,
                vao,
                batches,
                ident_batches,
                components: handles,
            })
        }
    }
}

// ── Pure assembly ────────────────────────────────────────────

#[derive(Debug)]
pub struct AssembledBatch {
    pub shader: String,
    pub topology: Topology,
    pub indices: Vec<u32>,
}

/// CPU-side result of scheme assembly, free of GL objects
#[derive(Debug)]
pub struct SchemeAssembly {
    pub spaces: Vec<Space>,
    pub packed: Vec<PackedVertex>,
    pub batches: Vec<AssembledBatch>,
    /// All shader batches merged per topology, for the ident pass
    pub ident_batches: BTreeMap<Topology, Vec<u32>>,
    pub nident: u32,
}

/// Resolve shader names, validate batch arities, pack vertices and clamp
/// the space list to capacity.
pub fn assemble(scheme: Scheme) -> Result<SchemeAssembly> {
    let mut spaces = scheme.spaces;
    if spaces.len() > MAX_SPACES {
        tracing::warn!(
            spaces = spaces.len(),
            capacity = MAX_SPACES,
            "too many scheme spaces; excess anchored to the last kept space"
        );
        spaces.truncate(MAX_SPACES);
    }

    let mut batches = Vec::with_capacity(scheme.batches.len());
    let mut ident_batches: BTreeMap<Topology, Vec<u32>> = BTreeMap::new();
    for (shader, indices) in scheme.batches {
        let topology = shader_topology(&shader)
            .ok_or_else(|| ViewError::config(format!("unknown scheme shader {shader:?}")))?;
        if indices.len() % topology.arity() != 0 {
            return Err(ViewError::config(format!(
                "batch {shader:?} holds {} indices, not a multiple of {}",
                indices.len(),
                topology.arity()
            )));
        }
        ident_batches
            .entry(topology)
            .or_default()
            .extend_from_slice(&indices);
        batches.push(AssembledBatch { shader, topology, indices });
    }

    let packed: Vec<PackedVertex> = scheme
        .vertices
        .iter()
        .map(|v| PackedVertex {
            space: space::clamp_index(v.space) as u32,
            pos: v.pos.to_array(),
            normal: v.normal.to_array(),
            color: pack_color(v.color),
            layer: v.layer,
            track: v.track,
            flags: v.flags,
        })
        .collect();

    let nident = scheme
        .vertices
        .iter()
        .map(|v| v.track)
        .max()
        .map_or(0, |m| m + 1);

    Ok(SchemeAssembly { spaces, packed, batches, ident_batches, nident })
}

/// World pose of a component anchored in `space`: the pose whose
/// composition under the camera view equals the space transform.
pub fn component_world(space: Space, cam: &CameraState, world: Mat4) -> Mat4 {
    cam.view.inverse() * space.matrix(cam, world)
}

fn pack_color(color: Vec4) -> [u8; 4] {
    let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
}

// ── Display ──────────────────────────────────────────────────

struct GpuBatch {
    topology: Topology,
    ibo: glow::Buffer,
    count: i32,
}

/// Compiled scheme: one vertex buffer, per-shader batches for the visible
/// pass, per-topology batches for the ident pass, nested components re-posed
/// from their anchor space every frame.
pub struct SchemeDisplay {
    world: Mat4,
    spaces: Vec<Space>,
    packed: Vec<PackedVertex>,
    /// Selection state per track
    selected: Vec<bool>,
    dirty: bool,
    nident: u32,
    programs: Rc<SchemePrograms>,
    vbo: glow::Buffer,
    vao: glow::VertexArray,
    batches: Vec<GpuBatch>,
    ident_batches: Vec<GpuBatch>,
    components: Vec<(usize, DisplayHandle)>,
}

impl SchemeDisplay {
    pub fn nident(&self) -> u32 {
        self.nident
    }

    fn space_matrices(&self, frame: &Frame) -> Vec<Mat4> {
        self.spaces
            .iter()
            .map(|s| s.matrix(&frame.camera, self.world))
            .collect()
    }

    /// Push selection changes into the packed flag words and re-upload
    fn sync(&mut self, gl: &glow::Context) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        for v in &mut self.packed {
            let on = self
                .selected
                .get(v.track as usize)
                .copied()
                .unwrap_or(false);
            v.flags = (v.flags & !1) | u32::from(on);
        }
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, bytemuck::cast_slice(&self.packed));
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn draw(&self, gl: &glow::Context, batches: &[GpuBatch]) {
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            for batch in batches {
                gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(batch.ibo));
                gl.draw_elements(batch.topology.gl_mode(), batch.count, glow::UNSIGNED_INT, 0);
            }
            gl.bind_vertex_array(None);
        }
    }

    /// Re-derive component poses so a component anchored in a screen or
    /// halo space follows the camera. Runs for both passes, since a pick
    /// can be issued before the first screen draw.
    fn pose_components(&self, frame: &Frame) {
        for (space, handle) in &self.components {
            let world = component_world(self.spaces[*space], &frame.camera, self.world);
            handle.borrow_mut().set_world(world);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
            for batch in self.batches.iter().chain(&self.ident_batches) {
                gl.delete_buffer(batch.ibo);
            }
        }
    }
}

impl Display for SchemeDisplay {
    fn render(&mut self, frame: &Frame) {
        let gl = &frame.gl;
        self.sync(gl);
        self.pose_components(frame);

        let program = self.programs.color;
        unsafe {
            gl.use_program(Some(program));
            gl.enable(glow::BLEND);
            gl.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
        }
        shaders::set_mat4(gl, program, "u_proj", &frame.camera.proj);
        shaders::set_mat4_array(gl, program, "u_spaces", &self.space_matrices(frame));
        shaders::set_vec3(gl, program, "u_select_color", frame.palette.select_color_line);
        self.draw(gl, &self.batches);
        unsafe {
            gl.disable(glow::BLEND);
        }
    }

    fn identify(&mut self, frame: &Frame, start_ident: u32) -> u32 {
        let gl = &frame.gl;
        self.sync(gl);
        self.pose_components(frame);

        let program = self.programs.ident;
        unsafe {
            gl.use_program(Some(program));
        }
        shaders::set_mat4(gl, program, "u_proj", &frame.camera.proj);
        shaders::set_mat4_array(gl, program, "u_spaces", &self.space_matrices(frame));
        shaders::set_u32(gl, program, "u_start_ident", start_ident);
        self.draw(gl, &self.ident_batches);
        self.nident
    }

    fn control(&mut self, _frame: &Frame, _group: u32, ident: u32, event: ControlEvent) {
        if event == ControlEvent::Click {
            let state = self.selected(ident);
            self.select(&[ident], !state);
        }
    }

    fn select(&mut self, idents: &[u32], state: bool) {
        for &ident in idents {
            if let Some(slot) = self.selected.get_mut(ident as usize) {
                *slot = state;
            }
        }
        self.dirty = true;
    }

    fn selected(&self, ident: u32) -> bool {
        self.selected.get(ident as usize).copied().unwrap_or(false)
    }

    fn stack(&self) -> Vec<StackSlot> {
        vec![
            StackSlot { pass: Pass::Screen, priority: PRIORITY_ANNOTATION },
            StackSlot { pass: Pass::Ident, priority: PRIORITY_ANNOTATION },
        ]
    }

    fn components(&self) -> Vec<DisplayHandle> {
        self.components.iter().map(|(_, h)| h.clone()).collect()
    }

    fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_face() -> MeshSnapshot {
        MeshSnapshot::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn template_applies_to_later_vertices_only() {
        let mut scheme = Scheme::new();
        scheme.add_points(&[Vec3::ZERO, Vec3::X]);
        scheme.set_color(Vec4::ONE).set_layer(-0.1).set_track(4);
        scheme.add_points(&[Vec3::Y, Vec3::Z]);

        let v = scheme.vertices();
        assert_eq!(v[0].track, 0);
        assert_eq!(v[2].track, 4);
        assert_eq!(v[2].layer, -0.1);
        assert_eq!(v[2].color, Vec4::ONE);
        assert_eq!(v[0].layer, 0.0);
    }

    #[test]
    fn spaces_deduplicate_by_value() {
        let mut scheme = Scheme::new();
        scheme.set_space(Space::Screen);
        scheme.set_space(Space::World);
        scheme.set_space(Space::Screen);
        assert_eq!(scheme.spaces(), &[Space::World, Space::Screen]);
        assert_eq!(scheme.current.space, 1);
    }

    #[test]
    fn add_mesh_appends_offset_triples() {
        let mut scheme = Scheme::new();
        scheme.add_points(&[Vec3::ZERO, Vec3::X]);
        scheme.set_shader("fill");
        scheme.add_mesh(&one_face());

        assert_eq!(scheme.vertices().len(), 5);
        // the mesh has one face group, so all corners share one track
        assert_eq!(scheme.vertices()[2].track, 0);
        assert_eq!(scheme.vertices()[4].track, 0);
        assert_eq!(scheme.batch("fill"), Some(&[2, 3, 4][..]));
        assert_eq!(scheme.batch("line"), Some(&[0, 1][..]));
    }

    #[test]
    fn track_offset_is_applied_to_mesh_groups() {
        let mut scheme = Scheme::new();
        scheme.set_track(7).set_shader("fill").add_mesh(&one_face());
        assert!(scheme.vertices().iter().all(|v| v.track == 7));
    }

    #[test]
    fn polyline_chains_consecutive_pairs() {
        let mut scheme = Scheme::new();
        scheme.add_points(&[Vec3::ZERO, Vec3::X, Vec3::Y]);
        assert_eq!(scheme.batch("line"), Some(&[0, 1, 1, 2][..]));
    }

    #[test]
    fn assemble_reports_unknown_shader() {
        let mut scheme = Scheme::new();
        scheme.set_shader("sparkle").add_points(&[Vec3::ZERO, Vec3::X]);
        let err = assemble(scheme).unwrap_err();
        assert!(matches!(err, ViewError::Config(_)));
    }

    #[test]
    fn assemble_reports_ragged_batch() {
        let mut scheme = Scheme::new();
        // a mesh under a line shader leaves a 3-index batch
        scheme.add_mesh(&one_face());
        let err = assemble(scheme).unwrap_err();
        assert!(matches!(err, ViewError::Config(_)));
    }

    #[test]
    fn assemble_packs_and_counts_idents() {
        let mut scheme = Scheme::new();
        scheme.set_track(2).add_points(&[Vec3::ZERO, Vec3::X]);
        scheme.set_shader("fill").set_track(0).add_mesh(&one_face());

        let assembly = assemble(scheme).unwrap();
        assert_eq!(assembly.packed.len(), 5);
        assert_eq!(assembly.nident, 3);
        assert_eq!(assembly.batches.len(), 2);
        assert_eq!(
            assembly.ident_batches.get(&Topology::Lines),
            Some(&vec![0, 1])
        );
        assert_eq!(
            assembly.ident_batches.get(&Topology::Triangles),
            Some(&vec![2, 3, 4])
        );
    }

    #[test]
    fn assemble_clamps_excess_spaces() {
        let mut scheme = Scheme::new();
        for i in 0..40 {
            scheme.set_space(Space::HaloScreen(Vec3::new(i as f32, 0.0, 0.0)));
            scheme.add_points(&[Vec3::ZERO, Vec3::X]);
        }
        let assembly = assemble(scheme).unwrap();
        assert_eq!(assembly.spaces.len(), MAX_SPACES);
        assert!(assembly
            .packed
            .iter()
            .all(|v| (v.space as usize) < MAX_SPACES));
        // the overflowing vertices land in the last kept space
        assert_eq!(
            assembly.packed.last().map(|v| v.space as usize),
            Some(MAX_SPACES - 1)
        );
    }

    #[test]
    fn component_pose_cancels_the_view() {
        let cam = CameraState {
            view: Mat4::look_at_rh(Vec3::new(3.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y),
            proj: Mat4::perspective_rh_gl(45.0_f32.to_radians(), 4.0 / 3.0, 0.1, 100.0),
            width: 800.0,
            height: 600.0,
        };
        let world = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));

        // a world-anchored component keeps the owner's pose exactly
        let posed = component_world(Space::World, &cam, world);
        assert!(posed.abs_diff_eq(world, 1e-4));

        // a halo-anchored component still lands on its anchor point
        let anchor = Vec3::new(0.5, -1.0, 0.25);
        let posed = component_world(Space::HaloScreen(anchor), &cam, Mat4::IDENTITY);
        let origin = (cam.view * posed) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let expected = cam.view * anchor.extend(1.0);
        assert!((origin - expected).length() < 1e-4);
    }

    #[test]
    fn packed_vertex_layout_is_stable() {
        assert_eq!(std::mem::size_of::<PackedVertex>(), 44);
        let packed = pack_color(Vec4::new(0.0, 0.5, 1.0, 2.0));
        assert_eq!(packed, [0, 128, 255, 255]);
    }
}
