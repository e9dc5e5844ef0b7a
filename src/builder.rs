//! Scene builder: walks the entity list and flattens it into the
//! device-ready arrays the renderer uploads wholesale on every restart.

use crate::material::Bsdf;
use crate::mesh::MeshGenerator;
use crate::scene::{Entity, EntityKind, LightShape, PrimitiveShape, Scene};
use crate::types::LightRecord;
use glam::{vec3, UVec3};

/// Flat triangle-list arrays plus packed material and light records.
/// No shared-vertex indexing: three entries per triangle, and one
/// material-slot index per vertex.
#[derive(Debug, Clone, Default)]
pub struct RenderData {
    pub vertices: Vec<[f32; 4]>,
    pub normals: Vec<[f32; 4]>,
    pub material_indices: Vec<u32>,
    pub materials: Vec<Bsdf>,
    pub lights: Vec<LightRecord>,
}

impl RenderData {
    pub fn triangle_count(&self) -> u32 {
        (self.vertices.len() / 3) as u32
    }

    pub fn light_count(&self) -> u32 {
        self.lights.len() as u32
    }
}

/// Builds the flattened render data for a scene. Material slots and light
/// records follow entity order; a primitive whose mesh cannot be generated
/// is skipped without aborting the build.
pub fn build(scene: &Scene, mesher: &dyn MeshGenerator) -> RenderData {
    let mut data = RenderData::default();

    for entity in scene.entities() {
        match entity.kind {
            EntityKind::Primitive(shape) => append_primitive(&mut data, entity, shape, mesher),
            EntityKind::Light(shape) => data.lights.push(pack_light(entity, shape)),
        }
    }

    debug_assert_eq!(data.vertices.len(), data.normals.len());
    debug_assert_eq!(data.vertices.len(), data.material_indices.len());
    debug_assert_eq!(data.vertices.len() % 3, 0);
    data
}

fn append_primitive(
    data: &mut RenderData,
    entity: &Entity,
    shape: PrimitiveShape,
    mesher: &dyn MeshGenerator,
) {
    let size = entity.read_vec3("size");
    let segments = entity.read_vec3("segments");
    let segments = UVec3::new(segments.x as u32, segments.y as u32, segments.z as u32);

    let mesh = match mesher.generate(shape, size, segments) {
        Ok(mesh) => mesh,
        Err(err) => {
            log::warn!("skipping primitive '{}': {err}", entity.name);
            return;
        }
    };

    let slot = data.materials.len() as u32;
    data.materials.push(Bsdf::pack(entity));

    let position = entity.read_vec3("position");
    let scale = entity.read_or("scale", 1.0);

    for &index in &mesh.indices {
        let p = mesh.positions[index as usize] * scale + position;
        let n = mesh.normals[index as usize];
        data.vertices.push([p.x, p.y, p.z, 0.0]);
        data.normals.push([n.x, n.y, n.z, 0.0]);
        data.material_indices.push(slot);
    }
}

fn pack_light(entity: &Entity, shape: LightShape) -> LightRecord {
    let position = entity.read_vec3("position").to_array();
    let emission = entity.read_vec3("emission").to_array();
    match shape {
        LightShape::Sphere => LightRecord::sphere(position, emission, entity.read("radius")),
        LightShape::Rect => {
            // Rect lights span size_x along X and size_y along Z.
            let v1 = vec3(entity.read("size_x"), 0.0, 0.0);
            let v2 = vec3(0.0, 0.0, entity.read("size_y"));
            LightRecord::rect(position, emission, v1.to_array(), v2.to_array())
        }
    }
}

/// Convenience for callers that only need the default mesher.
pub fn build_default(scene: &Scene) -> RenderData {
    build(scene, &crate::mesh::ProceduralMesher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneEvents;
    use crate::types::LIGHT_KIND_SPHERE;
    use glam::Vec3;

    fn fixture_scene() -> Scene {
        // One 100x100 plane (1x1 segments), one unit cube (1x1x1 segments),
        // one sphere light with radius 1 and emission (4,4,4) at the origin.
        let mut scene = Scene::new();
        let plane = scene.add_plane();
        {
            let plane = scene.entity_mut(plane).unwrap();
            plane.set("segments_x", 1.0);
            plane.set("segments_y", 1.0);
        }
        let cube = scene.add_cube();
        {
            let cube = scene.entity_mut(cube).unwrap();
            cube.set("segments_x", 1.0);
            cube.set("segments_y", 1.0);
            cube.set("segments_z", 1.0);
        }
        let light = scene.add_sphere_light();
        {
            let light = scene.entity_mut(light).unwrap();
            light.set("position_y", 0.0);
            light.set("radius", 1.0);
        }
        scene
    }

    #[test]
    fn test_build_invariants_hold() {
        let data = build_default(&fixture_scene());
        assert_eq!(data.vertices.len(), data.normals.len());
        assert_eq!(data.vertices.len(), data.material_indices.len());
        assert_eq!(data.vertices.len() % 3, 0);
    }

    #[test]
    fn test_fixture_scene_packing() {
        let data = build_default(&fixture_scene());

        assert_eq!(data.materials.len(), 2, "one material slot per primitive");
        assert_eq!(data.lights.len(), 1);
        // Plane (2 triangles) + cube (12 triangles), 3 vertices each.
        assert_eq!(data.vertices.len(), (2 + 12) * 3);

        let light = &data.lights[0];
        assert_eq!(light.kind, LIGHT_KIND_SPHERE);
        assert_eq!(light.emission, [4.0, 4.0, 4.0]);
        assert_eq!(light.position, [0.0, 0.0, 0.0]);
        assert_eq!(light.radius, 1.0);
        assert!((light.area - 12.566).abs() < 1e-2);
    }

    #[test]
    fn test_material_slots_follow_entity_order() {
        let data = build_default(&fixture_scene());
        // Plane vertices first (slot 0), cube vertices after (slot 1).
        assert!(data.material_indices[..6].iter().all(|&i| i == 0));
        assert!(data.material_indices[6..].iter().all(|&i| i == 1));
    }

    #[test]
    fn test_degenerate_primitive_is_skipped_not_fatal() {
        let mut scene = fixture_scene();
        // Break the plane: zero segments can't be meshed.
        let plane_id = scene.entities()[0].id;
        scene.entity_mut(plane_id).unwrap().set("segments_x", 0.0);

        let data = build_default(&scene);
        assert_eq!(data.materials.len(), 1, "only the cube gets a slot");
        assert_eq!(data.vertices.len(), 12 * 3);
        assert!(data.material_indices.iter().all(|&i| i == 0));
        assert_eq!(data.lights.len(), 1, "lights are unaffected");
    }

    #[test]
    fn test_light_count_matches_light_entities_in_order() {
        let mut scene = Scene::new();
        scene.add_sphere_light();
        let rect = scene.add_entity("Panel", EntityKind::Light(LightShape::Rect));
        {
            let rect = scene.entity_mut(rect).unwrap();
            rect.set("size_x", 2.0);
            rect.set("size_y", 3.0);
            rect.set("emission_x", 1.0);
        }
        scene.add_cube();
        scene.add_sphere_light();

        let data = build_default(&scene);
        assert_eq!(data.light_count(), 3);
        assert_eq!(data.lights[0].kind, LIGHT_KIND_SPHERE);
        assert_eq!(data.lights[1].v1, [2.0, 0.0, 0.0]);
        assert_eq!(data.lights[1].v2, [0.0, 0.0, 3.0]);
        assert!((data.lights[1].area - 6.0).abs() < 1e-6);
        assert_eq!(data.lights[2].kind, LIGHT_KIND_SPHERE);
    }

    #[test]
    fn test_vertices_are_transformed_by_scale_then_position() {
        let mut scene = Scene::new();
        let mut events = SceneEvents::default();
        let cube = scene.add_cube();
        {
            let cube = scene.entity_mut(cube).unwrap();
            cube.set("segments_x", 1.0);
            cube.set("segments_y", 1.0);
            cube.set("segments_z", 1.0);
            cube.set("scale", 2.0);
            cube.set("position_x", 10.0);
            cube.set("position_y", 0.0);
        }
        scene.set_selected(Some(cube), &mut events);

        let data = build_default(&scene);
        for v in &data.vertices {
            let local = Vec3::new(v[0] - 10.0, v[1], v[2]);
            assert!((local.abs().max_element() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_empty_scene_builds_empty_arrays() {
        let data = build_default(&Scene::new());
        assert!(data.vertices.is_empty());
        assert_eq!(data.triangle_count(), 0);
        assert_eq!(data.light_count(), 0);
    }
}
