//! Standalone markers: a pickable point and a dashed axis line.
//!
//! Both are single-ident displays placed at marker priority, so they draw
//! over solids and annotation schemes.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3};
use glow::HasContext;

use crate::display::{ControlEvent, Display, Pass, StackSlot, PRIORITY_MARKER};
use crate::error::{Result, ViewError};
use crate::prims::PointsDisplay;
use crate::scene::{Frame, Scene};
use crate::shaders::{self, AxisPrograms};
use crate::vertices::SharedVertices;

// ── Point ────────────────────────────────────────────────────

const POINT_MARKER_SIZE: f32 = 6.0;

/// A single point drawn at constant pixel size
pub struct PointDisplay {
    vertices: Rc<RefCell<SharedVertices>>,
    points: PointsDisplay,
}

impl PointDisplay {
    pub fn new(
        scene: &mut Scene,
        position: Vec3,
        world: Mat4,
        color: Option<Vec3>,
    ) -> Result<Self> {
        let color = color.unwrap_or(scene.palette().line_color);
        let vertices = Rc::new(RefCell::new(SharedVertices::new(
            vec![position.to_array()],
            vec![0],
            world,
        )?));
        Ok(Self {
            points: PointsDisplay::new(scene, vertices.clone(), None, color, POINT_MARKER_SIZE)?,
            vertices,
        })
    }
}

impl Display for PointDisplay {
    fn render(&mut self, frame: &Frame) {
        self.vertices.borrow_mut().sync(&frame.gl);
        self.points.render(frame);
    }

    fn identify(&mut self, frame: &Frame, start_ident: u32) -> u32 {
        self.vertices.borrow_mut().sync(&frame.gl);
        self.points.identify(frame, start_ident)
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

    fn stack(&self) -> Vec<StackSlot> {
        vec![
            StackSlot { pass: Pass::Screen, priority: PRIORITY_MARKER },
            StackSlot { pass: Pass::Ident, priority: PRIORITY_MARKER },
        ]
    }

    fn set_world(&mut self, world: Mat4) {
        self.vertices.borrow_mut().transform = world;
    }
}

// ── Axis ─────────────────────────────────────────────────────

/// Dash template over one repetition, as (start, end) abscissa pairs
const DASH_PATTERN: [f32; 6] = [0.0, 0.25, 0.45, 0.55, 0.75, 1.0];
const DASH_REPETITIONS: u32 = 3;

/// Per-vertex (absciss, alpha) pairs of the dashed line. Alpha fades out
/// toward both ends to suggest an unbounded axis.
pub fn axis_pattern() -> Vec<Vec2> {
    let mut verts = Vec::new();
    for r in 0..DASH_REPETITIONS {
        for dash in DASH_PATTERN.chunks(2) {
            for &t in dash {
                let absciss = (r as f32 + t) / DASH_REPETITIONS as f32;
                let alpha = 1.0 - (2.0 * absciss - 1.0).powi(2);
                verts.push(Vec2::new(absciss, alpha));
            }
        }
    }
    verts
}

/// A dashed line along `direction` from `origin`, spanning `interval`
/// abscissas. The geometry is two floats per vertex; the axis placement is
/// all uniforms, so moving the axis costs nothing.
pub struct AxisDisplay {
    world: Mat4,
    origin: Vec3,
    direction: Vec3,
    interval: Vec2,
    color: Vec3,
    is_selected: bool,
    programs: Rc<AxisPrograms>,
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    count: i32,
}

impl AxisDisplay {
    pub fn new(
        scene: &mut Scene,
        origin: Vec3,
        direction: Vec3,
        interval: Vec2,
        world: Mat4,
        color: Option<Vec3>,
    ) -> Result<Self> {
        let programs = scene.axis_programs()?;
        let color = color.unwrap_or(scene.palette().line_color);
        let gl = scene.gl_handle();

        let pattern = axis_pattern();
        let flat: Vec<f32> = pattern.iter().flat_map(|v| [v.x, v.y]).collect();
        unsafe {
            let vbo = gl.create_buffer().map_err(ViewError::gl)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&flat),
                glow::STATIC_DRAW,
            );

            let vao = gl.create_vertex_array().map_err(ViewError::gl)?;
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 1, glow::FLOAT, false, 8, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 1, glow::FLOAT, false, 8, 4);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            Ok(Self {
                world,
                origin,
                direction: direction.normalize_or_zero(),
                interval,
                color,
                is_selected: false,
                programs,
                vao,
                vbo,
                count: pattern.len() as i32,
            })
        }
    }

    fn set_common(&self, gl: &glow::Context, program: glow::Program, frame: &Frame) {
        shaders::set_mat4(gl, program, "u_view", &(frame.camera.view * self.world));
        shaders::set_mat4(gl, program, "u_proj", &frame.camera.proj);
        shaders::set_vec3(gl, program, "u_origin", self.origin);
        shaders::set_vec3(gl, program, "u_direction", self.direction);
        shaders::set_vec2(gl, program, "u_interval", self.interval);
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
        }
    }
}

impl Display for AxisDisplay {
    fn render(&mut self, frame: &Frame) {
        let gl = &frame.gl;
        let program = self.programs.color;
        unsafe {
            gl.use_program(Some(program));
            gl.enable(glow::BLEND);
            gl.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
        }
        self.set_common(gl, program, frame);
        let color = if self.is_selected {
            frame.palette.select_color_line
        } else {
            self.color
        };
        shaders::set_vec3(gl, program, "u_color", color);
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::LINES, 0, self.count);
            gl.bind_vertex_array(None);
            gl.disable(glow::BLEND);
        }
    }

    fn identify(&mut self, frame: &Frame, start_ident: u32) -> u32 {
        let gl = &frame.gl;
        let program = self.programs.ident;
        unsafe {
            gl.use_program(Some(program));
        }
        self.set_common(gl, program, frame);
        shaders::set_u32(gl, program, "u_start_ident", start_ident);
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::LINES, 0, self.count);
            gl.bind_vertex_array(None);
        }
        1
    }

    fn control(&mut self, _frame: &Frame, _group: u32, _ident: u32, event: ControlEvent) {
        if event == ControlEvent::Click {
            self.is_selected = !self.is_selected;
        }
    }

    fn select(&mut self, idents: &[u32], state: bool) {
        if idents.contains(&0) {
            self.is_selected = state;
        }
    }

    fn selected(&self, ident: u32) -> bool {
        ident == 0 && self.is_selected
    }

    fn stack(&self) -> Vec<StackSlot> {
        vec![
            StackSlot { pass: Pass::Screen, priority: PRIORITY_MARKER },
            StackSlot { pass: Pass::Ident, priority: PRIORITY_MARKER },
        ]
    }

    fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_pairs_per_repetition() {
        let pattern = axis_pattern();
        // 3 dashes of 2 vertices each, repeated
        assert_eq!(pattern.len() as u32, 6 * DASH_REPETITIONS);
        assert_eq!(pattern.len() % 2, 0);
    }

    #[test]
    fn pattern_spans_unit_interval_monotonically() {
        let pattern = axis_pattern();
        assert_eq!(pattern[0].x, 0.0);
        assert_eq!(pattern.last().map(|v| v.x), Some(1.0));
        for pair in pattern.windows(2) {
            assert!(pair[0].x <= pair[1].x);
        }
    }

    #[test]
    fn pattern_fades_at_ends() {
        let pattern = axis_pattern();
        assert!(pattern[0].y.abs() < 1e-6);
        assert!(pattern.last().map(|v| v.y.abs()).unwrap() < 1e-6);
        let mid = pattern[pattern.len() / 2 - 1].y.max(pattern[pattern.len() / 2].y);
        assert!(mid > 0.9);
    }
}
