use crate::vec3::Vec3;

/// World up is +z.
pub const WORLD_UP: Vec3 = Vec3::Z;

/// Pitch limit applied by the interactive controls.
pub const MAX_PITCH: f32 = 1.5;

// Camera struct to hold position, orientation and the derived ray basis
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    theta: f32,
    phi: f32,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
}

impl Camera {
    // Create a new camera with a position and orientation (radians)
    pub fn new(position: Vec3, theta: f32, phi: f32) -> Self {
        let mut camera = Self {
            position,
            theta,
            phi,
            forward: Vec3::X,
            right: -Vec3::Y,
            up: WORLD_UP,
        };
        camera.recalculate_basis();
        camera
    }

    pub fn theta(&self) -> f32 {
        self.theta
    }

    pub fn phi(&self) -> f32 {
        self.phi
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn set_angles(&mut self, theta: f32, phi: f32) {
        self.theta = theta;
        self.phi = phi;
        self.recalculate_basis();
    }

    /// Rebuild forward/right/up from theta (yaw around +z) and phi (pitch).
    pub fn recalculate_basis(&mut self) {
        let (sin_t, cos_t) = self.theta.sin_cos();
        let (sin_p, cos_p) = self.phi.sin_cos();

        self.forward = Vec3::new(cos_t * cos_p, sin_t * cos_p, sin_p).normalize();

        let right = self.forward.cross(&WORLD_UP);
        self.right = if right.length_squared() > 1e-12 {
            right.normalize()
        } else {
            // Looking straight up or down: use the limit of the cross product.
            Vec3::new(sin_t, -cos_t, 0.0)
        };
        self.up = self.right.cross(&self.forward).normalize();
    }

    pub fn move_forward(&mut self, distance: f32) {
        self.position += self.forward * distance;
    }

    pub fn strafe(&mut self, distance: f32) {
        self.position += self.right * distance;
    }

    pub fn turn(&mut self, delta_theta: f32) {
        self.set_angles(self.theta + delta_theta, self.phi);
    }

    pub fn tilt(&mut self, delta_phi: f32) {
        let phi = (self.phi + delta_phi).clamp(-MAX_PITCH, MAX_PITCH);
        self.set_angles(self.theta, phi);
    }
}
