//! Triangulated primitive meshes. The scene builder consumes this through
//! the [`MeshGenerator`] trait and treats it as an external service: a
//! generation failure is reported, never a panic.

use crate::scene::PrimitiveShape;
use glam::{vec3, UVec3, Vec3};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("degenerate parameters for {shape:?}: size and segments must be positive")]
    Degenerate { shape: PrimitiveShape },
}

/// Indexed triangle mesh in local space. `indices` is a triangle list,
/// three entries per triangle.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Mesh-generation service boundary. `size` and `segments` are interpreted
/// per shape: planes use the x/y components, cubes and spheres all three
/// (spheres ignore `segments.z`).
pub trait MeshGenerator {
    fn generate(
        &self,
        shape: PrimitiveShape,
        size: Vec3,
        segments: UVec3,
    ) -> Result<MeshData, MeshError>;
}

/// Built-in generator for the three editor primitives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProceduralMesher;

impl MeshGenerator for ProceduralMesher {
    fn generate(
        &self,
        shape: PrimitiveShape,
        size: Vec3,
        segments: UVec3,
    ) -> Result<MeshData, MeshError> {
        let degenerate = || MeshError::Degenerate { shape };
        match shape {
            PrimitiveShape::Plane => {
                if size.x <= 0.0 || size.y <= 0.0 || segments.x == 0 || segments.y == 0 {
                    return Err(degenerate());
                }
                Ok(plane(size.x, size.y, segments.x, segments.y))
            }
            PrimitiveShape::Cube => {
                if size.min_element() <= 0.0 || segments.min_element() == 0 {
                    return Err(degenerate());
                }
                Ok(cube(size, segments))
            }
            PrimitiveShape::Sphere => {
                // A closed UV sphere needs at least 3 slices and 2 stacks.
                if size.min_element() <= 0.0 || segments.x < 3 || segments.y < 2 {
                    return Err(degenerate());
                }
                Ok(sphere(size * 0.5, segments.x, segments.y))
            }
        }
    }
}

/// Grid on the XZ plane centered at the origin, normal +Y. `width` maps to
/// X and `depth` to Z.
fn plane(width: f32, depth: f32, sx: u32, sz: u32) -> MeshData {
    let mut mesh = MeshData::default();
    for z in 0..=sz {
        for x in 0..=sx {
            let fx = (x as f32 / sx as f32 - 0.5) * width;
            let fz = (z as f32 / sz as f32 - 0.5) * depth;
            mesh.positions.push(vec3(fx, 0.0, fz));
            mesh.normals.push(Vec3::Y);
        }
    }
    let stride = sx + 1;
    for z in 0..sz {
        for x in 0..sx {
            let i = z * stride + x;
            mesh.indices
                .extend_from_slice(&[i, i + stride, i + 1, i + 1, i + stride, i + stride + 1]);
        }
    }
    mesh
}

/// Axis-aligned box built as six subdivided faces with outward normals.
fn cube(size: Vec3, segments: UVec3) -> MeshData {
    let half = size * 0.5;
    let mut mesh = MeshData::default();

    // (normal, tangent u, tangent v, segments u, segments v)
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y, segments.z, segments.y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y, segments.z, segments.y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z, segments.x, segments.z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z, segments.x, segments.z),
        (Vec3::Z, Vec3::X, Vec3::Y, segments.x, segments.y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y, segments.x, segments.y),
    ];

    for (normal, tangent_u, tangent_v, su, sv) in faces {
        let base = mesh.positions.len() as u32;
        for v in 0..=sv {
            for u in 0..=su {
                let fu = u as f32 / su as f32 - 0.5;
                let fv = v as f32 / sv as f32 - 0.5;
                let point =
                    (normal * 0.5 + tangent_u * fu + tangent_v * fv) * 2.0 * half;
                mesh.positions.push(point);
                mesh.normals.push(normal);
            }
        }
        let stride = su + 1;
        for v in 0..sv {
            for u in 0..su {
                let i = base + v * stride + u;
                mesh.indices.extend_from_slice(&[
                    i,
                    i + 1,
                    i + stride,
                    i + 1,
                    i + stride + 1,
                    i + stride,
                ]);
            }
        }
    }
    mesh
}

/// UV sphere with per-axis radii. Normals are the unit direction from the
/// center, which is exact for uniform radii.
fn sphere(radii: Vec3, slices: u32, stacks: u32) -> MeshData {
    let mut mesh = MeshData::default();
    for stack in 0..=stacks {
        let phi = std::f32::consts::PI * stack as f32 / stacks as f32;
        for slice in 0..=slices {
            let theta = std::f32::consts::TAU * slice as f32 / slices as f32;
            let dir = vec3(
                phi.sin() * theta.cos(),
                phi.cos(),
                phi.sin() * theta.sin(),
            );
            mesh.positions.push(dir * radii);
            mesh.normals.push(dir.normalize_or_zero());
        }
    }
    let stride = slices + 1;
    for stack in 0..stacks {
        for slice in 0..slices {
            let i = stack * stride + slice;
            if stack > 0 {
                mesh.indices.extend_from_slice(&[i, i + 1, i + stride]);
            }
            if stack + 1 < stacks {
                mesh.indices
                    .extend_from_slice(&[i + 1, i + stride + 1, i + stride]);
            }
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_single_segment_is_two_triangles() {
        let mesh = ProceduralMesher
            .generate(PrimitiveShape::Plane, vec3(100.0, 100.0, 0.0), UVec3::ONE)
            .unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.positions.len(), 4);
        assert!(mesh.normals.iter().all(|n| *n == Vec3::Y));
    }

    #[test]
    fn test_cube_single_segment_is_twelve_triangles() {
        let mesh = ProceduralMesher
            .generate(PrimitiveShape::Cube, Vec3::ONE, UVec3::ONE)
            .unwrap();
        assert_eq!(mesh.triangle_count(), 12);
        // Every vertex of a unit cube lies on the half-extent shell.
        for p in &mesh.positions {
            assert!((p.abs().max_element() - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sphere_normals_are_unit_length() {
        let mesh = ProceduralMesher
            .generate(PrimitiveShape::Sphere, Vec3::ONE, UVec3::new(8, 6, 0))
            .unwrap();
        assert!(!mesh.indices.is_empty());
        for n in &mesh.normals {
            assert!((n.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_zero_segments_is_an_error() {
        let result =
            ProceduralMesher.generate(PrimitiveShape::Cube, Vec3::ONE, UVec3::new(0, 1, 1));
        assert_eq!(
            result.unwrap_err(),
            MeshError::Degenerate {
                shape: PrimitiveShape::Cube
            }
        );
    }

    #[test]
    fn test_nonpositive_size_is_an_error() {
        assert!(ProceduralMesher
            .generate(PrimitiveShape::Plane, vec3(0.0, 1.0, 0.0), UVec3::ONE)
            .is_err());
    }

    #[test]
    fn test_indices_stay_in_bounds() {
        for (shape, segments) in [
            (PrimitiveShape::Plane, UVec3::new(3, 2, 1)),
            (PrimitiveShape::Cube, UVec3::new(2, 3, 4)),
            (PrimitiveShape::Sphere, UVec3::new(12, 7, 0)),
        ] {
            let mesh = ProceduralMesher.generate(shape, Vec3::ONE, segments).unwrap();
            assert_eq!(mesh.positions.len(), mesh.normals.len());
            assert_eq!(mesh.indices.len() % 3, 0);
            let max = *mesh.indices.iter().max().unwrap() as usize;
            assert!(max < mesh.positions.len());
        }
    }
}
