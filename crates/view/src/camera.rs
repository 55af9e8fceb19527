use glam::{Mat4, Vec3};

/// Camera matrices and viewport size for one frame.
///
/// Supplied by the host before each pass; spaces and displays only ever read
/// it, so one value is shared by the screen and ident passes of a frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraState {
    /// World -> camera
    pub view: Mat4,
    /// Camera -> clip
    pub proj: Mat4,
    /// Viewport width in pixels
    pub width: f32,
    /// Viewport height in pixels
    pub height: f32,
}

impl CameraState {
    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

/// Arc-ball camera for a 3D viewport
#[derive(Debug, Clone)]
pub struct ArcBallCamera {
    /// Horizontal rotation angle (radians)
    pub yaw: f32,
    /// Vertical rotation angle (radians)
    pub pitch: f32,
    /// Distance from target
    pub distance: f32,
    /// Camera target point
    pub target: Vec3,
    /// Vertical field of view (radians)
    pub fov: f32,
}

impl Default for ArcBallCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl ArcBallCamera {
    pub fn new() -> Self {
        Self {
            yaw: 0.6,
            pitch: 0.4,
            distance: 6.0,
            target: Vec3::ZERO,
            fov: 45.0_f32.to_radians(),
        }
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx.to_radians();
        self.pitch = (self.pitch + dy.to_radians()).clamp(-1.5, 1.5);
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance * (1.0 - delta)).clamp(0.5, 100.0);
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        let right = self.right_vector();
        let up = self.up_vector();
        self.target += right * dx + up * dy;
    }

    /// Camera position in world space
    pub fn eye_position(&self) -> Vec3 {
        let cy = self.yaw.cos();
        let sy = self.yaw.sin();
        let cp = self.pitch.cos();
        let sp = self.pitch.sin();

        self.target
            + Vec3::new(
                self.distance * cp * sy,
                self.distance * sp,
                self.distance * cp * cy,
            )
    }

    /// View matrix (world -> camera)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    /// Projection matrix (camera -> clip)
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, aspect, 0.1, 200.0)
    }

    /// Per-frame camera state for the given viewport
    pub fn state(&self, width: f32, height: f32) -> CameraState {
        CameraState {
            view: self.view_matrix(),
            proj: self.projection_matrix(width / height),
            width,
            height,
        }
    }

    fn right_vector(&self) -> Vec3 {
        let fwd = (self.target - self.eye_position()).normalize_or_zero();
        fwd.cross(Vec3::Y).normalize_or_zero()
    }

    fn up_vector(&self) -> Vec3 {
        let fwd = (self.target - self.eye_position()).normalize_or_zero();
        self.right_vector().cross(fwd).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_distance_matches() {
        let cam = ArcBallCamera::new();
        let eye = cam.eye_position();
        assert!(((eye - cam.target).length() - cam.distance).abs() < 1e-4);
    }

    #[test]
    fn view_maps_eye_to_origin() {
        let cam = ArcBallCamera::new();
        let eye = cam.eye_position();
        let at_origin = cam.view_matrix() * eye.extend(1.0);
        assert!(at_origin.truncate().length() < 1e-4);
    }

    #[test]
    fn state_carries_viewport() {
        let cam = ArcBallCamera::new();
        let state = cam.state(800.0, 600.0);
        assert_eq!(state.width, 800.0);
        assert!((state.aspect() - 800.0 / 600.0).abs() < 1e-6);
    }
}
