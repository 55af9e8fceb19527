//! Display settings evaluated per frame, not baked into displays.

use glam::{Vec3, Vec4};

/// Which sub-displays of a composite are drawn this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Filled surfaces
    pub display_faces: bool,
    /// Group boundary lines
    pub display_groups: bool,
    /// Vertex markers
    pub display_points: bool,
    /// Wireframe overlay over filled surfaces
    pub display_wire: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            display_faces: true,
            display_groups: true,
            display_points: false,
            display_wire: false,
        }
    }
}

/// Default colors shared by every display of a scene
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub solid_color: Vec3,
    pub line_color: Vec3,
    pub select_color_face: Vec3,
    pub select_color_line: Vec3,
    pub annotation_color: Vec4,
    /// Attenuation of a face turned away from the camera
    pub solid_color_side: f32,
    /// Intensity of a face turned toward the camera
    pub solid_color_front: f32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            solid_color: Vec3::new(0.65, 0.65, 0.68),
            line_color: Vec3::new(0.9, 0.9, 0.9),
            select_color_face: Vec3::new(1.0, 0.45, 0.1),
            select_color_line: Vec3::new(1.0, 0.6, 0.2),
            annotation_color: Vec4::new(0.2, 0.7, 1.0, 1.0),
            solid_color_side: 0.4,
            solid_color_front: 1.0,
        }
    }
}
