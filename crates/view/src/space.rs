//! Coordinate spaces for annotation placement.
//!
//! A space is a per-frame 4x4 transform from a vertex's local coordinates to
//! camera space; the projection is applied afterwards by the shader. Each
//! variant captures its construction parameters and exposes one pure
//! evaluation over the current camera state, so all spaces of a scene can be
//! recomputed once per frame.

use glam::{Mat4, Vec3, Vec4};

use crate::camera::CameraState;

/// Hard limit on distinct spaces per scheme display, matching the uniform
/// array in the scheme shader. Overflow clamps, see `clamp_index`.
pub const MAX_SPACES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Space {
    /// Ordinary geometry: camera view composed with the object pose
    World,
    /// Cancels the projection's field-of-view scaling
    View,
    /// Pixel coordinates over the viewport
    Screen,
    /// Translate-only, anchored to a world point, facing the camera
    HaloWorld(Vec3),
    /// Like `HaloWorld`, scaled to stay constant in view units
    HaloView(Vec3),
    /// Like `HaloWorld`, scaled to stay constant in pixels
    HaloScreen(Vec3),
    /// Anchored to a world point, constant pixel size, rotates with the object
    ScaleScreen(Vec3),
    /// Anchored to a world point, constant view-space size
    ScaleView(Vec3),
}

impl Space {
    /// Evaluate this space for the frame. `world` is the pose of the display
    /// that owns the vertices.
    pub fn matrix(&self, cam: &CameraState, world: Mat4) -> Mat4 {
        match *self {
            Space::World => cam.view * world,
            Space::View => Mat4::from_diagonal(Vec4::new(
                1.0 / cam.proj.x_axis.x,
                1.0 / cam.proj.y_axis.y,
                1.0,
                1.0,
            )),
            Space::Screen => Mat4::from_diagonal(Vec4::new(
                cam.width / 2.0,
                cam.height / 2.0,
                1.0,
                1.0,
            )),
            Space::HaloWorld(p) => {
                let center = cam.view * (world * p.extend(1.0));
                let mut m = Mat4::IDENTITY;
                m.w_axis = center;
                m
            }
            Space::HaloView(p) => {
                let center = cam.view * (world * p.extend(1.0));
                let mut m = Mat4::IDENTITY;
                m.w_axis = center;
                m.x_axis.x = center.z / cam.proj.x_axis.x;
                m.y_axis.y = center.z / cam.proj.y_axis.y;
                m
            }
            Space::HaloScreen(p) => {
                let center = cam.view * (world * p.extend(1.0));
                let d = center.z / cam.height;
                let mut m = Mat4::IDENTITY;
                m.w_axis = center;
                m.x_axis.x = d;
                m.y_axis.y = d;
                m
            }
            Space::ScaleScreen(p) => {
                let m = cam.view * world;
                let d = (m * p.extend(1.0)).z / cam.height;
                m * Mat4::from_translation(p) * Mat4::from_scale(Vec3::splat(d))
            }
            Space::ScaleView(p) => {
                let m = cam.view * world;
                let d = (m * p.extend(1.0)).z;
                m * Mat4::from_translation(-p) * Mat4::from_scale(Vec3::splat(d))
            }
        }
    }
}

/// Clamp a space index into the addressable uniform range.
pub fn clamp_index(index: usize) -> usize {
    index.min(MAX_SPACES - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> CameraState {
        CameraState {
            view: Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y),
            proj: Mat4::perspective_rh_gl(45.0_f32.to_radians(), 4.0 / 3.0, 0.1, 100.0),
            width: 800.0,
            height: 600.0,
        }
    }

    #[test]
    fn world_composes_view_and_pose() {
        let cam = camera();
        let pose = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let m = Space::World.matrix(&cam, pose);
        assert!((m * Vec4::new(0.0, 0.0, 0.0, 1.0) - cam.view * Vec4::new(1.0, 2.0, 3.0, 1.0))
            .length()
            < 1e-5);
    }

    #[test]
    fn screen_scales_to_pixels() {
        let cam = camera();
        let m = Space::Screen.matrix(&cam, Mat4::IDENTITY);
        let p = m * Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert_eq!(p.x, 400.0);
        assert_eq!(p.y, 300.0);
    }

    #[test]
    fn view_cancels_projection_scaling() {
        let cam = camera();
        let m = Space::View.matrix(&cam, Mat4::IDENTITY);
        // projecting a unit step of this space yields a unit clip step
        let projected = cam.proj * m * Vec4::new(1.0, 1.0, 0.0, 0.0);
        assert!((projected.x - 1.0).abs() < 1e-5);
        assert!((projected.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn halo_world_pins_origin() {
        let cam = camera();
        let anchor = Vec3::new(1.0, -1.0, 0.5);
        let m = Space::HaloWorld(anchor).matrix(&cam, Mat4::IDENTITY);
        let origin = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let expected = cam.view * anchor.extend(1.0);
        assert!((origin - expected).length() < 1e-5);
        // camera rotation does not leak into the local axes
        assert!((m * Vec4::new(1.0, 0.0, 0.0, 0.0) - Vec4::new(1.0, 0.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn halo_screen_scale_follows_depth() {
        let cam = camera();
        let anchor = Vec3::ZERO;
        let m = Space::HaloScreen(anchor).matrix(&cam, Mat4::IDENTITY);
        let center = cam.view * anchor.extend(1.0);
        assert!((m.x_axis.x - center.z / cam.height).abs() < 1e-6);
        assert_eq!(m.x_axis.x, m.y_axis.y);
    }

    #[test]
    fn scale_screen_subtends_constant_pixels() {
        // the pixel extent of a unit offset must not change with distance
        let anchor = Vec3::ZERO;
        let pixel_extent = |dist: f32| {
            let cam = CameraState {
                view: Mat4::look_at_rh(Vec3::new(0.0, 0.0, dist), Vec3::ZERO, Vec3::Y),
                ..camera()
            };
            let m = Space::ScaleScreen(anchor).matrix(&cam, Mat4::IDENTITY);
            let a = cam.proj * m * Vec4::new(0.0, 0.0, 0.0, 1.0);
            let b = cam.proj * m * Vec4::new(0.0, 1.0, 0.0, 1.0);
            ((b.y / b.w - a.y / a.w) * cam.height / 2.0).abs()
        };
        let near = pixel_extent(2.0);
        let far = pixel_extent(20.0);
        assert!((near - far).abs() < near * 0.01, "near {near} far {far}");
    }

    #[test]
    fn clamp_index_limits() {
        assert_eq!(clamp_index(0), 0);
        assert_eq!(clamp_index(MAX_SPACES - 1), MAX_SPACES - 1);
        assert_eq!(clamp_index(MAX_SPACES + 10), MAX_SPACES - 1);
    }
}
