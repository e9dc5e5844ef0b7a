use glam::Vec3;

/// Pinhole camera with look-at parameterization. The ray-generation kernel
/// derives the view basis on the GPU, so the uniform block only carries
/// position, target and lens parameters. Any edit requires a renderer
/// restart to reset accumulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub look_at: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub focal_dist: f32,
    pub aperture: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(2.0, 1.0, -2.0),
            look_at: Vec3::ZERO,
            fov: 80.0,
            focal_dist: 0.1,
            aperture: 0.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }
}
