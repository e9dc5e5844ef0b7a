use crate::scene::Scene;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

pub fn save_scene_to_file(scene: &Scene, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(scene)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_scene_from_file(path: &Path) -> Result<Scene> {
    let json = std::fs::read_to_string(path)?;
    let scene: Scene = serde_json::from_str(&json)?;
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use crate::scene::{EntityKind, LightShape, Scene, SceneEvents};

    #[test]
    fn test_empty_scene_round_trip() {
        let scene = Scene::new();
        let json = serde_json::to_string_pretty(&scene).unwrap();
        let loaded: Scene = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.entities().len(), 0);
        assert_eq!(loaded.selected(), None);
    }

    #[test]
    fn test_round_trip_preserves_order_parameters_and_selection() {
        let mut events = SceneEvents::default();
        let mut scene = Scene::new();
        scene.add_plane();
        let cube = scene.add_cube();
        scene.add_sphere_light();
        scene.set_selected(Some(cube), &mut events);

        let json = serde_json::to_string_pretty(&scene).unwrap();
        let loaded: Scene = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.entities().len(), scene.entities().len());
        for (a, b) in scene.entities().iter().zip(loaded.entities()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.name, b.name);
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.values, b.values);
        }
        assert_eq!(loaded.selected(), Some(cube));
    }

    #[test]
    fn test_unknown_parameter_keys_survive() {
        let mut scene = Scene::new();
        let id = scene.add_entity("Panel", EntityKind::Light(LightShape::Rect));
        scene
            .entity_mut(id)
            .unwrap()
            .set("future_parameter", 42.0);

        let json = serde_json::to_string(&scene).unwrap();
        let loaded: Scene = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.entities()[0].read("future_parameter"), 42.0);
    }

    #[test]
    fn test_save_load_via_file() {
        let (scene, _) = Scene::default_document();

        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!("raytraced_scene_{}_{}.json", std::process::id(), nonce));

        super::save_scene_to_file(&scene, &path).unwrap();
        let loaded = super::load_scene_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.entities().len(), 3);
        assert_eq!(loaded.selected(), scene.selected());
    }
}
