//! `#[repr(C)]` records shared with the WGSL kernels. Field order and padding
//! must match the shader-side struct declarations exactly.

/// Per-frame uniform block, written into one ring slot per admitted frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub camera_position: [f32; 3],
    pub fov: f32,
    pub camera_look_at: [f32; 3],
    pub focal_dist: f32,
    pub random_seed: [f32; 3],
    pub aperture: f32,
    pub width: u32,
    pub height: u32,
    pub frame_index: u32,
    pub light_count: u32,
}

/// One ray per pixel. `throughput` carries the path attenuation across
/// bounces, `radiance` the pending direct-light contribution resolved by the
/// shadow pass. A terminated ray has `max_distance < 0`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Ray {
    pub origin: [f32; 3],
    pub min_distance: f32,
    pub direction: [f32; 3],
    pub max_distance: f32,
    pub throughput: [f32; 4],
    pub radiance: [f32; 4],
}

/// Intersection result written by the intersection service. Nearest mode
/// fills all fields; any mode only guarantees the sign of `distance`
/// (negative means unoccluded).
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Intersection {
    pub distance: f32,
    pub primitive_index: u32,
    pub coordinates: [f32; 2],
}

pub const LIGHT_KIND_SPHERE: f32 = 0.0;
pub const LIGHT_KIND_RECT: f32 = 1.0;

/// Packed light source. One fixed-size record per light entity:
///
/// ```text
/// position.xyz  kind        (0 = sphere, 1 = rect)
/// emission.rgb  0
/// v1.xyz        0           (rect edge vector, zero for spheres)
/// v2.xyz        0           (rect edge vector, zero for spheres)
/// radius  area  sampleable  0
/// ```
///
/// Sphere lights store `area = 4πr²`; rect lights store `area = |v1 × v2|`
/// and a zero radius. The shading kernel switches on `kind` only.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightRecord {
    pub position: [f32; 3],
    pub kind: f32,
    pub emission: [f32; 3],
    pub _pad0: f32,
    pub v1: [f32; 3],
    pub _pad1: f32,
    pub v2: [f32; 3],
    pub _pad2: f32,
    pub radius: f32,
    pub area: f32,
    pub sampleable: f32,
    pub _pad3: f32,
}

impl LightRecord {
    pub fn sphere(position: [f32; 3], emission: [f32; 3], radius: f32) -> Self {
        Self {
            position,
            kind: LIGHT_KIND_SPHERE,
            emission,
            _pad0: 0.0,
            v1: [0.0; 3],
            _pad1: 0.0,
            v2: [0.0; 3],
            _pad2: 0.0,
            radius,
            area: 4.0 * std::f32::consts::PI * radius * radius,
            sampleable: 1.0,
            _pad3: 0.0,
        }
    }

    pub fn rect(position: [f32; 3], emission: [f32; 3], v1: [f32; 3], v2: [f32; 3]) -> Self {
        let area = glam::Vec3::from_array(v1)
            .cross(glam::Vec3::from_array(v2))
            .length();
        Self {
            position,
            kind: LIGHT_KIND_RECT,
            emission,
            _pad0: 0.0,
            v1,
            _pad1: 0.0,
            v2,
            _pad2: 0.0,
            radius: 0.0,
            area,
            sampleable: 1.0,
            _pad3: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes_match_shader_strides() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 64);
        assert_eq!(std::mem::size_of::<Ray>(), 64);
        assert_eq!(std::mem::size_of::<Intersection>(), 16);
        assert_eq!(std::mem::size_of::<LightRecord>(), 80);
    }

    #[test]
    fn test_sphere_light_area() {
        let light = LightRecord::sphere([0.0; 3], [4.0, 4.0, 4.0], 1.0);
        assert!((light.area - 12.566_37).abs() < 1e-3);
        assert_eq!(light.kind, LIGHT_KIND_SPHERE);
        assert_eq!(light.sampleable, 1.0);
    }

    #[test]
    fn test_rect_light_area_is_edge_cross_product() {
        let light = LightRecord::rect(
            [0.0; 3],
            [1.0, 1.0, 1.0],
            [2.0, 0.0, 0.0],
            [0.0, 0.0, 3.0],
        );
        assert_eq!(light.kind, LIGHT_KIND_RECT);
        assert_eq!(light.radius, 0.0);
        assert!((light.area - 6.0).abs() < 1e-6);
    }
}
