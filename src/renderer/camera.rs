//! Orbit camera

use glam::{EulerRot, Mat4, Vec3};

/// Default near clipping plane
pub const DEFAULT_NEAR: f32 = 0.01;
/// Default far clipping plane
pub const DEFAULT_FAR: f32 = 100.0;

/// Perspective camera orbiting a target point.
///
/// The eye sits `distance` units from `target` along +Z, rotated by the Euler
/// angles in `rotation` (applied Y, then X, then Z). Matrices are computed on
/// demand; the dirty flag tells consumers that the view inputs changed since they
/// last cleared it.
#[derive(Debug, Clone)]
pub struct Camera {
    aspect: f32,
    /// Vertical field of view in radians
    fov: f32,
    near: f32,
    far: f32,

    distance: f32,
    target: Vec3,
    rotation: Vec3,
    up: Vec3,

    dirty: bool,
}

impl Camera {
    /// Create a camera looking at `target` from `distance` units away.
    ///
    /// A new camera starts dirty so the first frame pushes its matrices.
    #[must_use]
    pub fn new(aspect: f32, fov: f32, distance: f32, target: Vec3) -> Self {
        Self {
            aspect,
            fov,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            distance,
            target,
            rotation: Vec3::ZERO,
            up: Vec3::Y,
            dirty: true,
        }
    }

    /// Set the initial orbit rotation
    #[must_use]
    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the up vector
    #[must_use]
    pub fn with_up(mut self, up: Vec3) -> Self {
        self.up = up;
        self
    }

    /// Set the clipping planes
    #[must_use]
    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Right-handed perspective projection
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    /// Look-at view matrix from the orbit position to the target
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        let orbit = self.orbit_rotation();
        let eye = self.target + orbit.transform_vector3(Vec3::new(0.0, 0.0, self.distance));
        // Up rotates with the orbit, so it is never parallel to the view direction
        let up = orbit.transform_vector3(self.up);
        Mat4::look_at_rh(eye, self.target, up)
    }

    /// World-space eye position
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.target
            + self
                .orbit_rotation()
                .transform_vector3(Vec3::new(0.0, 0.0, self.distance))
    }

    fn orbit_rotation(&self) -> Mat4 {
        Mat4::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z)
    }

    /// Accumulate a rotation delta
    pub fn add_rotation(&mut self, delta: Vec3) {
        self.rotation += delta;
        self.dirty = true;
    }

    /// Replace the orbit rotation
    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.dirty = true;
    }

    /// Replace the orbit distance
    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance;
        self.dirty = true;
    }

    #[must_use]
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    #[must_use]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Whether the view inputs changed since the flag was last cleared
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}
