use raytraced::builder;
use raytraced::mesh::ProceduralMesher;
use raytraced::scene::{EntityKind, Scene, SceneEvents};

#[cfg(test)]
mod scene_build_tests {
    use super::*;

    #[test]
    fn test_default_document_builds_render_data() {
        let (scene, _) = Scene::default_document();
        let data = builder::build(&scene, &ProceduralMesher);

        assert_eq!(data.materials.len(), 2, "cube and plane each take a material slot");
        assert_eq!(data.light_count(), 1);
        assert!(data.triangle_count() > 0);
        assert_eq!(data.vertices.len(), data.normals.len());
        assert_eq!(data.vertices.len(), data.material_indices.len());
    }

    #[test]
    fn test_parameter_edit_changes_rebuilt_geometry() {
        let (mut scene, _) = Scene::default_document();
        let before = builder::build(&scene, &ProceduralMesher);

        let cube = scene
            .entities()
            .iter()
            .find(|e| matches!(e.kind, EntityKind::Primitive(_)))
            .unwrap()
            .id;
        scene.entity_mut(cube).unwrap().set("position_y", 5.0);
        let after = builder::build(&scene, &ProceduralMesher);

        assert_eq!(
            before.triangle_count(),
            after.triangle_count(),
            "moving an entity must not change its triangulation"
        );
        assert_ne!(before.vertices, after.vertices);
    }

    #[test]
    fn test_degenerate_primitive_is_skipped_not_fatal() {
        let (mut scene, _) = Scene::default_document();
        let cube = scene
            .entities()
            .iter()
            .find(|e| e.name == "Cube")
            .unwrap()
            .id;
        scene.entity_mut(cube).unwrap().set("segments_x", 0.0);

        let data = builder::build(&scene, &ProceduralMesher);
        assert_eq!(data.materials.len(), 1, "only the plane should get a slot");
        assert_eq!(data.light_count(), 1, "lights are unaffected by mesh failures");
    }

    #[test]
    fn test_saved_document_rebuilds_identical_render_data() {
        let (mut scene, mut events) = Scene::default_document();
        let light = scene.add_rect_light();
        scene.set_selected(Some(light), &mut events);

        let json = serde_json::to_string(&scene).unwrap();
        let loaded: Scene = serde_json::from_str(&json).unwrap();

        let original = builder::build(&scene, &ProceduralMesher);
        let reloaded = builder::build(&loaded, &ProceduralMesher);

        assert_eq!(original.vertices, reloaded.vertices);
        assert_eq!(original.materials, reloaded.materials);
        assert_eq!(original.lights, reloaded.lights);
    }

    #[test]
    fn test_entity_removal_drops_its_light() {
        let mut events = SceneEvents::default();
        let (mut scene, _) = Scene::default_document();
        let extra = scene.add_rect_light();
        assert_eq!(builder::build(&scene, &ProceduralMesher).light_count(), 2);

        scene.remove_entity(extra, &mut events);
        assert_eq!(builder::build(&scene, &ProceduralMesher).light_count(), 1);
    }
}
