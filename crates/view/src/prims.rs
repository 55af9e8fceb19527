//! Primitive sub-displays: one topology kind drawn against a shared vertex
//! store, with a visual draw and an ident draw each.
//!
//! These are building blocks for the composite displays in `solid`; they are
//! plain structs, not `Display` implementations, because they never appear
//! on the stack themselves.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use glow::HasContext;

use crate::error::{Result, ViewError};
use crate::scene::{Frame, Scene};
use crate::shaders::{self, SolidPrograms};
use crate::vertices::SharedVertices;

type Vertices = Rc<RefCell<SharedVertices>>;

// ── VAO assembly ─────────────────────────────────────────────

/// Visual layout for the solid program: position + normal + flag byte
unsafe fn solid_vao(
    gl: &glow::Context,
    positions: glow::Buffer,
    normals: glow::Buffer,
    flags: glow::Buffer,
    index_buffer: Option<glow::Buffer>,
) -> Result<glow::VertexArray> {
    let vao = gl.create_vertex_array().map_err(ViewError::gl)?;
    gl.bind_vertex_array(Some(vao));

    gl.bind_buffer(glow::ARRAY_BUFFER, Some(positions));
    gl.enable_vertex_attrib_array(0);
    gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, 12, 0);

    gl.bind_buffer(glow::ARRAY_BUFFER, Some(normals));
    gl.enable_vertex_attrib_array(1);
    gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, 12, 0);

    gl.bind_buffer(glow::ARRAY_BUFFER, Some(flags));
    gl.enable_vertex_attrib_array(2);
    gl.vertex_attrib_pointer_i32(2, 1, glow::UNSIGNED_BYTE, 1, 0);

    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, index_buffer);
    gl.bind_vertex_array(None);
    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
    Ok(vao)
}

/// Visual layout for the wire program: position + flag byte
unsafe fn wire_vao(
    gl: &glow::Context,
    positions: glow::Buffer,
    flags: glow::Buffer,
    index_buffer: Option<glow::Buffer>,
) -> Result<glow::VertexArray> {
    let vao = gl.create_vertex_array().map_err(ViewError::gl)?;
    gl.bind_vertex_array(Some(vao));

    gl.bind_buffer(glow::ARRAY_BUFFER, Some(positions));
    gl.enable_vertex_attrib_array(0);
    gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, 12, 0);

    gl.bind_buffer(glow::ARRAY_BUFFER, Some(flags));
    gl.enable_vertex_attrib_array(1);
    gl.vertex_attrib_pointer_i32(1, 1, glow::UNSIGNED_BYTE, 1, 0);

    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, index_buffer);
    gl.bind_vertex_array(None);
    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
    Ok(vao)
}

/// Ident layout: position + per-vertex ident
unsafe fn ident_vao(
    gl: &glow::Context,
    positions: glow::Buffer,
    idents: glow::Buffer,
    index_buffer: Option<glow::Buffer>,
) -> Result<glow::VertexArray> {
    let vao = gl.create_vertex_array().map_err(ViewError::gl)?;
    gl.bind_vertex_array(Some(vao));

    gl.bind_buffer(glow::ARRAY_BUFFER, Some(positions));
    gl.enable_vertex_attrib_array(0);
    gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, 12, 0);

    gl.bind_buffer(glow::ARRAY_BUFFER, Some(idents));
    gl.enable_vertex_attrib_array(1);
    gl.vertex_attrib_pointer_i32(1, 1, glow::UNSIGNED_INT, 4, 0);

    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, index_buffer);
    gl.bind_vertex_array(None);
    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
    Ok(vao)
}

unsafe fn upload_indices(gl: &glow::Context, indices: &[u32]) -> Result<glow::Buffer> {
    let buffer = gl.create_buffer().map_err(ViewError::gl)?;
    gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
    gl.buffer_data_u8_slice(
        glow::ARRAY_BUFFER,
        bytemuck::cast_slice(indices),
        glow::STATIC_DRAW,
    );
    gl.bind_buffer(glow::ARRAY_BUFFER, None);
    Ok(buffer)
}

// ── Faces ────────────────────────────────────────────────────

/// Filled triangles of a composite; the only sub-display a solid exposes to
/// the ident pass.
pub struct FacesDisplay {
    vertices: Vertices,
    color: Vec3,
    programs: Rc<SolidPrograms>,
    vao: glow::VertexArray,
    vao_ident: glow::VertexArray,
    normals: glow::Buffer,
    ibo: glow::Buffer,
    index_count: i32,
}

impl FacesDisplay {
    pub fn new(
        scene: &mut Scene,
        vertices: Vertices,
        normals: &[[f32; 3]],
        faces: &[[u32; 3]],
        color: Vec3,
    ) -> Result<Self> {
        let programs = scene.solid_programs()?;
        let gl = scene.gl_handle();
        vertices.borrow_mut().upload(&gl)?;

        unsafe {
            let normal_buffer = gl.create_buffer().map_err(ViewError::gl)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(normal_buffer));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(normals),
                glow::STATIC_DRAW,
            );
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            let flat: Vec<u32> = faces.iter().flatten().copied().collect();
            let ibo = upload_indices(&gl, &flat)?;

            let (vao, vao_ident) = {
                let verts = vertices.borrow();
                let gpu = verts
                    .gpu()
                    .ok_or_else(|| ViewError::invariant("vertex store not uploaded"))?;
                (
                    solid_vao(&gl, gpu.positions, normal_buffer, gpu.flags, Some(ibo))?,
                    ident_vao(&gl, gpu.positions, gpu.idents, Some(ibo))?,
                )
            };

            Ok(Self {
                vertices,
                color,
                programs,
                vao,
                vao_ident,
                normals: normal_buffer,
                ibo,
                index_count: flat.len() as i32,
            })
        }
    }

    pub fn render(&self, frame: &Frame) {
        let gl = &frame.gl;
        let verts = self.vertices.borrow();
        let program = self.programs.solid;
        unsafe {
            gl.use_program(Some(program));
        }
        shaders::set_mat4(gl, program, "u_pose", &verts.transform);
        shaders::set_mat4(gl, program, "u_view", &frame.camera.view);
        shaders::set_mat4(gl, program, "u_proj", &frame.camera.proj);
        shaders::set_vec3(gl, program, "u_min_color", self.color * frame.palette.solid_color_side);
        shaders::set_vec3(gl, program, "u_max_color", self.color * frame.palette.solid_color_front);
        shaders::set_vec3(gl, program, "u_select_color", frame.palette.select_color_face);
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_elements(glow::TRIANGLES, self.index_count, glow::UNSIGNED_INT, 0);
            gl.bind_vertex_array(None);
        }
    }

    pub fn identify(&self, frame: &Frame, start_ident: u32) -> u32 {
        let gl = &frame.gl;
        let verts = self.vertices.borrow();
        let program = self.programs.ident;
        unsafe {
            gl.use_program(Some(program));
        }
        shaders::set_mat4(gl, program, "u_view", &(frame.camera.view * verts.transform));
        shaders::set_mat4(gl, program, "u_proj", &frame.camera.proj);
        shaders::set_u32(gl, program, "u_start_ident", start_ident);
        unsafe {
            gl.bind_vertex_array(Some(self.vao_ident));
            gl.draw_elements(glow::TRIANGLES, self.index_count, glow::UNSIGNED_INT, 0);
            gl.bind_vertex_array(None);
        }
        verts.nident()
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_vertex_array(self.vao_ident);
            gl.delete_buffer(self.normals);
            gl.delete_buffer(self.ibo);
        }
    }
}

// ── Lines ────────────────────────────────────────────────────

/// Line segments of a composite (group boundaries, wireframe overlay,
/// web edges)
pub struct LinesDisplay {
    vertices: Vertices,
    color: Vec3,
    programs: Rc<SolidPrograms>,
    vao: glow::VertexArray,
    vao_ident: glow::VertexArray,
    ibo: glow::Buffer,
    index_count: i32,
}

impl LinesDisplay {
    pub fn new(
        scene: &mut Scene,
        vertices: Vertices,
        lines: &[[u32; 2]],
        color: Vec3,
    ) -> Result<Self> {
        let programs = scene.solid_programs()?;
        let gl = scene.gl_handle();
        vertices.borrow_mut().upload(&gl)?;

        unsafe {
            let flat: Vec<u32> = lines.iter().flatten().copied().collect();
            let ibo = upload_indices(&gl, &flat)?;

            let (vao, vao_ident) = {
                let verts = vertices.borrow();
                let gpu = verts
                    .gpu()
                    .ok_or_else(|| ViewError::invariant("vertex store not uploaded"))?;
                (
                    wire_vao(&gl, gpu.positions, gpu.flags, Some(ibo))?,
                    ident_vao(&gl, gpu.positions, gpu.idents, Some(ibo))?,
                )
            };

            Ok(Self {
                vertices,
                color,
                programs,
                vao,
                vao_ident,
                ibo,
                index_count: flat.len() as i32,
            })
        }
    }

    pub fn render(&self, frame: &Frame) {
        let gl = &frame.gl;
        let verts = self.vertices.borrow();
        let program = self.programs.wire;
        unsafe {
            gl.use_program(Some(program));
        }
        shaders::set_mat4(gl, program, "u_view", &(frame.camera.view * verts.transform));
        shaders::set_mat4(gl, program, "u_proj", &frame.camera.proj);
        shaders::set_vec3(gl, program, "u_color", self.color);
        shaders::set_vec3(gl, program, "u_select_color", frame.palette.select_color_line);
        shaders::set_f32(gl, program, "u_point_size", 1.0);
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_elements(glow::LINES, self.index_count, glow::UNSIGNED_INT, 0);
            gl.bind_vertex_array(None);
        }
    }

    pub fn identify(&self, frame: &Frame, start_ident: u32) -> u32 {
        let gl = &frame.gl;
        let verts = self.vertices.borrow();
        let program = self.programs.ident;
        unsafe {
            gl.use_program(Some(program));
        }
        shaders::set_mat4(gl, program, "u_view", &(frame.camera.view * verts.transform));
        shaders::set_mat4(gl, program, "u_proj", &frame.camera.proj);
        shaders::set_u32(gl, program, "u_start_ident", start_ident);
        unsafe {
            gl.bind_vertex_array(Some(self.vao_ident));
            gl.draw_elements(glow::LINES, self.index_count, glow::UNSIGNED_INT, 0);
            gl.bind_vertex_array(None);
        }
        verts.nident()
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_vertex_array(self.vao_ident);
            gl.delete_buffer(self.ibo);
        }
    }
}

// ── Points ───────────────────────────────────────────────────

/// Vertex markers, either a subset (by index) or every vertex of the store
pub struct PointsDisplay {
    vertices: Vertices,
    color: Vec3,
    point_size: f32,
    programs: Rc<SolidPrograms>,
    vao: glow::VertexArray,
    vao_ident: glow::VertexArray,
    ibo: Option<glow::Buffer>,
    count: i32,
}

impl PointsDisplay {
    pub fn new(
        scene: &mut Scene,
        vertices: Vertices,
        indices: Option<&[u32]>,
        color: Vec3,
        point_size: f32,
    ) -> Result<Self> {
        let programs = scene.solid_programs()?;
        let gl = scene.gl_handle();
        vertices.borrow_mut().upload(&gl)?;

        unsafe {
            let ibo = match indices {
                Some(indices) => Some(upload_indices(&gl, indices)?),
                None => None,
            };
            let count = indices.map_or(vertices.borrow().len(), <[u32]>::len) as i32;

            let (vao, vao_ident) = {
                let verts = vertices.borrow();
                let gpu = verts
                    .gpu()
                    .ok_or_else(|| ViewError::invariant("vertex store not uploaded"))?;
                (
                    wire_vao(&gl, gpu.positions, gpu.flags, ibo)?,
                    ident_vao(&gl, gpu.positions, gpu.idents, ibo)?,
                )
            };

            Ok(Self {
                vertices,
                color,
                point_size,
                programs,
                vao,
                vao_ident,
                ibo,
                count,
            })
        }
    }

    pub fn render(&self, frame: &Frame) {
        let gl = &frame.gl;
        let verts = self.vertices.borrow();
        let program = self.programs.wire;
        unsafe {
            gl.use_program(Some(program));
            gl.enable(glow::PROGRAM_POINT_SIZE);
        }
        shaders::set_mat4(gl, program, "u_view", &(frame.camera.view * verts.transform));
        shaders::set_mat4(gl, program, "u_proj", &frame.camera.proj);
        shaders::set_vec3(gl, program, "u_color", self.color);
        shaders::set_vec3(gl, program, "u_select_color", frame.palette.select_color_line);
        shaders::set_f32(gl, program, "u_point_size", self.point_size);
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            self.draw(gl);
            gl.bind_vertex_array(None);
        }
    }

    pub fn identify(&self, frame: &Frame, start_ident: u32) -> u32 {
        let gl = &frame.gl;
        let verts = self.vertices.borrow();
        let program = self.programs.ident;
        unsafe {
            gl.use_program(Some(program));
            gl.enable(glow::PROGRAM_POINT_SIZE);
        }
        shaders::set_mat4(gl, program, "u_view", &(frame.camera.view * verts.transform));
        shaders::set_mat4(gl, program, "u_proj", &frame.camera.proj);
        shaders::set_u32(gl, program, "u_start_ident", start_ident);
        shaders::set_f32(gl, program, "u_point_size", self.point_size);
        unsafe {
            gl.bind_vertex_array(Some(self.vao_ident));
            self.draw(gl);
            gl.bind_vertex_array(None);
        }
        verts.nident()
    }

    unsafe fn draw(&self, gl: &glow::Context) {
        if self.ibo.is_some() {
            gl.draw_elements(glow::POINTS, self.count, glow::UNSIGNED_INT, 0);
        } else {
            gl.draw_arrays(glow::POINTS, 0, self.count);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_vertex_array(self.vao_ident);
            if let Some(ibo) = self.ibo {
                gl.delete_buffer(ibo);
            }
        }
    }
}
