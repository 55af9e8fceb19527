//! Embedded shader sources, program compilation and uniform helpers.
//!
//! All programs live in the scene's resource cache under fixed keys, so
//! displays sharing one context never compile the same pair twice.

use glow::HasContext;

use crate::error::{Result, ViewError};

// ── Topology table ───────────────────────────────────────────

/// Primitive topology drawn by one index batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topology {
    Triangles,
    Lines,
    Points,
}

impl Topology {
    pub fn gl_mode(self) -> u32 {
        match self {
            Topology::Triangles => glow::TRIANGLES,
            Topology::Lines => glow::LINES,
            Topology::Points => glow::POINTS,
        }
    }

    /// Indices per primitive, used to validate batches
    pub fn arity(self) -> usize {
        match self {
            Topology::Triangles => 3,
            Topology::Lines => 2,
            Topology::Points => 1,
        }
    }
}

/// The known draw-program table for scheme batches. A shader name outside
/// this table is a configuration error at compile time.
pub fn shader_topology(name: &str) -> Option<Topology> {
    match name {
        "fill" => Some(Topology::Triangles),
        "line" => Some(Topology::Lines),
        "point" => Some(Topology::Points),
        _ => None,
    }
}

// ── Program bundles ──────────────────────────────────────────

/// Programs for solid/web composite displays
pub struct SolidPrograms {
    pub solid: glow::Program,
    pub wire: glow::Program,
    pub ident: glow::Program,
}

impl SolidPrograms {
    pub const CACHE_KEY: &'static str = "shader_solid";

    pub fn load(gl: &glow::Context) -> Result<Self> {
        Ok(Self {
            solid: compile_program(gl, SOLID_VERT, SOLID_FRAG)?,
            wire: compile_program(gl, WIRE_VERT, WIRE_FRAG)?,
            ident: compile_program(gl, IDENT_VERT, IDENT_FRAG)?,
        })
    }
}

/// Programs for scheme displays (one color program drawn with several
/// topologies, plus the ident variant)
pub struct SchemePrograms {
    pub color: glow::Program,
    pub ident: glow::Program,
}

impl SchemePrograms {
    pub const CACHE_KEY: &'static str = "shader_scheme";

    pub fn load(gl: &glow::Context) -> Result<Self> {
        Ok(Self {
            color: compile_program(gl, SCHEME_VERT, SCHEME_FRAG)?,
            ident: compile_program(gl, SCHEME_VERT, SCHEME_IDENT_FRAG)?,
        })
    }
}

/// Programs for dashed axis markers
pub struct AxisPrograms {
    pub color: glow::Program,
    pub ident: glow::Program,
}

impl AxisPrograms {
    pub const CACHE_KEY: &'static str = "shader_axis";

    pub fn load(gl: &glow::Context) -> Result<Self> {
        Ok(Self {
            color: compile_program(gl, AXIS_VERT, AXIS_FRAG)?,
            ident: compile_program(gl, AXIS_VERT, AXIS_IDENT_FRAG)?,
        })
    }
}

// ── Shader compilation ───────────────────────────────────────

pub fn compile_program(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
) -> Result<glow::Program> {
    unsafe {
        let program = gl.create_program().map_err(ViewError::gl)?;

        let vert = compile_stage(gl, glow::VERTEX_SHADER, vert_src)?;
        let frag = match compile_stage(gl, glow::FRAGMENT_SHADER, frag_src) {
            Ok(frag) => frag,
            Err(e) => {
                gl.delete_shader(vert);
                gl.delete_program(program);
                return Err(e);
            }
        };

        gl.attach_shader(program, vert);
        gl.attach_shader(program, frag);
        gl.link_program(program);
        gl.delete_shader(vert);
        gl.delete_shader(frag);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            tracing::error!("Program link error: {log}");
            gl.delete_program(program);
            return Err(ViewError::gl(format!("program link: {log}")));
        }

        Ok(program)
    }
}

unsafe fn compile_stage(gl: &glow::Context, kind: u32, src: &str) -> Result<glow::Shader> {
    let shader = gl.create_shader(kind).map_err(ViewError::gl)?;
    gl.shader_source(shader, src);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        tracing::error!("Shader compile error: {log}");
        gl.delete_shader(shader);
        return Err(ViewError::gl(format!("shader compile: {log}")));
    }
    Ok(shader)
}

// ── Uniform setters ──────────────────────────────────────────

pub fn set_mat4(gl: &glow::Context, program: glow::Program, name: &str, mat: &glam::Mat4) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, &mat.to_cols_array());
    }
}

/// Upload a contiguous mat4 array uniform (e.g. `u_spaces[32]`)
pub fn set_mat4_array(gl: &glow::Context, program: glow::Program, name: &str, mats: &[glam::Mat4]) {
    let mut flat = Vec::with_capacity(mats.len() * 16);
    for m in mats {
        flat.extend_from_slice(&m.to_cols_array());
    }
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, &flat);
    }
}

pub fn set_vec2(gl: &glow::Context, program: glow::Program, name: &str, v: glam::Vec2) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_2_f32(loc.as_ref(), v.x, v.y);
    }
}

pub fn set_vec3(gl: &glow::Context, program: glow::Program, name: &str, v: glam::Vec3) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_3_f32(loc.as_ref(), v.x, v.y, v.z);
    }
}

pub fn set_vec4(gl: &glow::Context, program: glow::Program, name: &str, v: glam::Vec4) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_4_f32(loc.as_ref(), v.x, v.y, v.z, v.w);
    }
}

pub fn set_f32(gl: &glow::Context, program: glow::Program, name: &str, v: f32) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_1_f32(loc.as_ref(), v);
    }
}

pub fn set_u32(gl: &glow::Context, program: glow::Program, name: &str, v: u32) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_1_u32(loc.as_ref(), v);
    }
}

// ── Solid shaders ────────────────────────────────────────────

const SOLID_VERT: &str = r#"#version 330 core
uniform mat4 u_pose;
uniform mat4 u_view;
uniform mat4 u_proj;

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in uint a_flags;

out vec3 v_normal;
flat out uint v_flags;

void main() {
    gl_Position = u_proj * u_view * u_pose * vec4(a_position, 1.0);
    v_normal = mat3(u_view * u_pose) * a_normal;
    v_flags = a_flags;
}
"#;

const SOLID_FRAG: &str = r#"#version 330 core
uniform vec3 u_min_color;
uniform vec3 u_max_color;
uniform vec3 u_select_color;

in vec3 v_normal;
flat in uint v_flags;

out vec4 frag_color;

void main() {
    float facing = abs(normalize(v_normal).z);
    vec3 color = mix(u_min_color, u_max_color, facing);
    if ((v_flags & 1u) != 0u) {
        color = mix(color, u_select_color, 0.6);
    }
    frag_color = vec4(color, 1.0);
}
"#;

// ── Wire shaders (lines and point markers over shared vertices) ──

const WIRE_VERT: &str = r#"#version 330 core
uniform mat4 u_view;
uniform mat4 u_proj;
uniform float u_point_size;

layout(location = 0) in vec3 a_position;
layout(location = 1) in uint a_flags;

flat out uint v_flags;

void main() {
    gl_Position = u_proj * u_view * vec4(a_position, 1.0);
    gl_PointSize = u_point_size;
    v_flags = a_flags;
}
"#;

const WIRE_FRAG: &str = r#"#version 330 core
uniform vec3 u_color;
uniform vec3 u_select_color;

flat in uint v_flags;

out vec4 frag_color;

void main() {
    vec3 color = ((v_flags & 1u) != 0u) ? u_select_color : u_color;
    frag_color = vec4(color, 1.0);
}
"#;

// ── Ident shaders ────────────────────────────────────────────
// The ident is written into an RGBA8 target as (ident + 1) little-endian;
// 0 decodes as background. See `crate::ident`.

const IDENT_VERT: &str = r#"#version 330 core
uniform mat4 u_view;
uniform mat4 u_proj;
uniform uint u_start_ident;
uniform float u_point_size;

layout(location = 0) in vec3 a_position;
layout(location = 1) in uint a_ident;

flat out uint v_ident;

void main() {
    gl_Position = u_proj * u_view * vec4(a_position, 1.0);
    gl_PointSize = u_point_size;
    v_ident = u_start_ident + a_ident;
}
"#;

const IDENT_FRAG: &str = r#"#version 330 core
flat in uint v_ident;

out vec4 frag_color;

void main() {
    uint v = v_ident + 1u;
    frag_color = vec4(
        float(v & 255u),
        float((v >> 8u) & 255u),
        float((v >> 16u) & 255u),
        float((v >> 24u) & 255u)) / 255.0;
}
"#;

// ── Scheme shaders ───────────────────────────────────────────

const SCHEME_VERT: &str = r#"#version 330 core
uniform mat4 u_proj;
uniform mat4 u_spaces[32];
uniform vec3 u_select_color;
uniform uint u_start_ident;

layout(location = 0) in uint a_space;
layout(location = 1) in vec3 a_position;
layout(location = 2) in vec3 a_normal;
layout(location = 3) in vec4 a_color;
layout(location = 4) in float a_layer;
layout(location = 5) in uint a_track;
layout(location = 6) in uint a_flags;

out vec4 v_color;
flat out uint v_ident;

void main() {
    vec4 p = u_spaces[a_space] * vec4(a_position, 1.0);
    gl_Position = u_proj * p;
    // layer is a depth bias: more negative draws nearer
    gl_Position.z += a_layer * gl_Position.w;
    v_color = ((a_flags & 1u) != 0u) ? vec4(u_select_color, a_color.a) : a_color;
    v_ident = u_start_ident + a_track;
}
"#;

const SCHEME_FRAG: &str = r#"#version 330 core
in vec4 v_color;
flat in uint v_ident;

out vec4 frag_color;

void main() {
    // premultiplied alpha
    frag_color = vec4(v_color.rgb * v_color.a, v_color.a);
}
"#;

const SCHEME_IDENT_FRAG: &str = r#"#version 330 core
in vec4 v_color;
flat in uint v_ident;

out vec4 frag_color;

void main() {
    uint v = v_ident + 1u;
    frag_color = vec4(
        float(v & 255u),
        float((v >> 8u) & 255u),
        float((v >> 16u) & 255u),
        float((v >> 24u) & 255u)) / 255.0;
}
"#;

// ── Axis shaders ─────────────────────────────────────────────

const AXIS_VERT: &str = r#"#version 330 core
uniform mat4 u_view;
uniform mat4 u_proj;
uniform vec3 u_origin;
uniform vec3 u_direction;
uniform vec2 u_interval;

layout(location = 0) in float a_absciss;
layout(location = 1) in float a_alpha;

out float v_alpha;

void main() {
    vec3 p = u_origin + u_direction * mix(u_interval.x, u_interval.y, a_absciss);
    gl_Position = u_proj * u_view * vec4(p, 1.0);
    v_alpha = a_alpha;
}
"#;

const AXIS_FRAG: &str = r#"#version 330 core
uniform vec3 u_color;

in float v_alpha;

out vec4 frag_color;

void main() {
    frag_color = vec4(u_color * v_alpha, v_alpha);
}
"#;

const AXIS_IDENT_FRAG: &str = r#"#version 330 core
uniform uint u_start_ident;

in float v_alpha;

out vec4 frag_color;

void main() {
    uint v = u_start_ident + 1u;
    frag_color = vec4(
        float(v & 255u),
        float((v >> 8u) & 255u),
        float((v >> 16u) & 255u),
        float((v >> 24u) & 255u)) / 255.0;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_table_covers_known_names() {
        assert_eq!(shader_topology("fill"), Some(Topology::Triangles));
        assert_eq!(shader_topology("line"), Some(Topology::Lines));
        assert_eq!(shader_topology("point"), Some(Topology::Points));
        assert_eq!(shader_topology("ghost"), None);
    }

    #[test]
    fn arity_matches_mode() {
        assert_eq!(Topology::Triangles.arity(), 3);
        assert_eq!(Topology::Lines.arity(), 2);
        assert_eq!(Topology::Points.arity(), 1);
    }
}
