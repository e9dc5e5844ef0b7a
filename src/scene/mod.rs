pub mod serialization;

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Stable entity identity. Selection and editor signals refer to entities by
/// id so a deleted entity can never dangle a reference.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, PartialOrd, Ord,
)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PrimitiveShape {
    Plane,
    Cube,
    Sphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LightShape {
    Sphere,
    Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EntityKind {
    Primitive(PrimitiveShape),
    Light(LightShape),
}

/// One editable scene entity: a typed tag plus an open parameter map.
/// Parameter reads never fail; a missing key reads as zero so the editor can
/// probe any field without seeding it first.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub values: HashMap<String, f32>,
}

impl Entity {
    pub fn new(id: EntityId, name: &str, kind: EntityKind) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            values: HashMap::new(),
        }
    }

    pub fn read(&self, key: &str) -> f32 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    pub fn read_or(&self, key: &str, default: f32) -> f32 {
        self.values.get(key).copied().unwrap_or(default)
    }

    /// Reads `prefix_x`, `prefix_y`, `prefix_z` as a vector.
    pub fn read_vec3(&self, prefix: &str) -> glam::Vec3 {
        glam::Vec3::new(
            self.read(&format!("{prefix}_x")),
            self.read(&format!("{prefix}_y")),
            self.read(&format!("{prefix}_z")),
        )
    }

    pub fn set(&mut self, key: &str, value: f32) {
        self.values.insert(key.to_string(), value);
    }
}

/// Signals published by the core towards an editor front end. The core never
/// requires a subscriber to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    /// Parameters changed outside the UI; re-read the model.
    ModelChanged,
    /// Current selection changed; carries the new id or `None`.
    SelectionChanged(Option<EntityId>),
}

/// Fan-out channel for [`SceneEvent`]s. Disconnected receivers are dropped
/// lazily on the next emit.
#[derive(Default)]
pub struct SceneEvents {
    subscribers: Vec<Sender<SceneEvent>>,
}

impl SceneEvents {
    pub fn subscribe(&mut self) -> Receiver<SceneEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: SceneEvent) {
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Ordered entity collection plus the editor-facing selection. Exactly one
/// scene exists per open document; entity order determines material slot and
/// light packing order.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    entities: Vec<Entity>,
    selected: Option<EntityId>,
    pub custom_size: Option<(u32, u32)>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// The startup document: a unit cube resting on a large ground plane,
    /// lit by one sphere light, with the plane selected.
    pub fn default_document() -> (Self, SceneEvents) {
        let mut scene = Self::new();
        let mut events = SceneEvents::default();
        scene.add_cube();
        let plane = scene.add_plane();
        scene.add_sphere_light();
        scene.set_selected(Some(plane), &mut events);
        (scene, events)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    pub fn set_selected(&mut self, id: Option<EntityId>, events: &mut SceneEvents) {
        self.selected = id.filter(|id| self.entity(*id).is_some());
        events.emit(SceneEvent::SelectionChanged(self.selected));
    }

    fn alloc_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add_entity(&mut self, name: &str, kind: EntityKind) -> EntityId {
        let id = self.alloc_id();
        self.entities.push(Entity::new(id, name, kind));
        id
    }

    pub fn remove_entity(&mut self, id: EntityId, events: &mut SceneEvents) {
        self.entities.retain(|e| e.id != id);
        if self.selected == Some(id) {
            self.selected = None;
            events.emit(SceneEvent::SelectionChanged(None));
        }
    }

    pub fn add_cube(&mut self) -> EntityId {
        let id = self.add_entity("Cube", EntityKind::Primitive(PrimitiveShape::Cube));
        let cube = self.entity_mut(id).unwrap();
        for (key, value) in [
            ("position_x", 0.0),
            ("position_y", 0.5),
            ("position_z", 0.0),
            ("scale", 1.0),
            ("size_x", 1.0),
            ("size_y", 1.0),
            ("size_z", 1.0),
            ("segments_x", 10.0),
            ("segments_y", 10.0),
            ("segments_z", 10.0),
            ("albedo_x", 0.8),
            ("albedo_y", 0.8),
            ("albedo_z", 0.8),
            ("roughness", 0.5),
        ] {
            cube.set(key, value);
        }
        id
    }

    pub fn add_plane(&mut self) -> EntityId {
        let id = self.add_entity("Plane", EntityKind::Primitive(PrimitiveShape::Plane));
        let plane = self.entity_mut(id).unwrap();
        for (key, value) in [
            ("position_x", 0.0),
            ("position_y", 0.0),
            ("position_z", 0.0),
            ("scale", 1.0),
            ("size_x", 100.0),
            ("size_y", 100.0),
            ("segments_x", 10.0),
            ("segments_y", 10.0),
            ("albedo_x", 0.5),
            ("albedo_y", 0.5),
            ("albedo_z", 0.5),
            ("roughness", 0.8),
        ] {
            plane.set(key, value);
        }
        id
    }

    pub fn add_sphere(&mut self) -> EntityId {
        let id = self.add_entity("Sphere", EntityKind::Primitive(PrimitiveShape::Sphere));
        let sphere = self.entity_mut(id).unwrap();
        for (key, value) in [
            ("position_x", 0.0),
            ("position_y", 0.5),
            ("position_z", 0.0),
            ("scale", 1.0),
            ("size_x", 1.0),
            ("size_y", 1.0),
            ("size_z", 1.0),
            ("segments_x", 32.0),
            ("segments_y", 16.0),
            ("albedo_x", 0.8),
            ("albedo_y", 0.8),
            ("albedo_z", 0.8),
            ("roughness", 0.5),
        ] {
            sphere.set(key, value);
        }
        id
    }

    pub fn add_sphere_light(&mut self) -> EntityId {
        let id = self.add_entity("Light", EntityKind::Light(LightShape::Sphere));
        let light = self.entity_mut(id).unwrap();
        for (key, value) in [
            ("position_x", 0.0),
            ("position_y", 3.0),
            ("position_z", 0.0),
            ("radius", 1.0),
            ("emission_x", 4.0),
            ("emission_y", 4.0),
            ("emission_z", 4.0),
        ] {
            light.set(key, value);
        }
        id
    }

    pub fn add_rect_light(&mut self) -> EntityId {
        let id = self.add_entity("Rect Light", EntityKind::Light(LightShape::Rect));
        let light = self.entity_mut(id).unwrap();
        for (key, value) in [
            ("position_x", 0.0),
            ("position_y", 3.0),
            ("position_z", 0.0),
            ("size_x", 1.0),
            ("size_y", 1.0),
            ("emission_x", 4.0),
            ("emission_y", 4.0),
            ("emission_z", 4.0),
        ] {
            light.set(key, value);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_reads_as_zero() {
        let entity = Entity::new(
            EntityId(0),
            "Cube",
            EntityKind::Primitive(PrimitiveShape::Cube),
        );
        assert_eq!(entity.read("does_not_exist"), 0.0);
        assert_eq!(entity.read_or("ior", 1.45), 1.45);
        assert_eq!(entity.read_vec3("position"), glam::Vec3::ZERO);
    }

    #[test]
    fn test_entity_ids_are_stable_and_unique() {
        let mut scene = Scene::new();
        let a = scene.add_cube();
        let b = scene.add_plane();
        assert_ne!(a, b);

        let mut events = SceneEvents::default();
        scene.remove_entity(a, &mut events);
        let c = scene.add_sphere_light();
        assert_ne!(b, c, "freed ids must not be reused");
    }

    #[test]
    fn test_selection_is_a_lookup_not_a_reference() {
        let mut events = SceneEvents::default();
        let rx = events.subscribe();

        let mut scene = Scene::new();
        let cube = scene.add_cube();
        scene.set_selected(Some(cube), &mut events);
        assert_eq!(scene.selected(), Some(cube));
        assert_eq!(rx.recv().unwrap(), SceneEvent::SelectionChanged(Some(cube)));

        scene.remove_entity(cube, &mut events);
        assert_eq!(scene.selected(), None);
        assert_eq!(rx.recv().unwrap(), SceneEvent::SelectionChanged(None));
    }

    #[test]
    fn test_selecting_unknown_id_clears_selection() {
        let mut events = SceneEvents::default();
        let mut scene = Scene::new();
        scene.add_cube();
        scene.set_selected(Some(EntityId(999)), &mut events);
        assert_eq!(scene.selected(), None);
    }

    #[test]
    fn test_events_tolerate_missing_subscribers() {
        let mut events = SceneEvents::default();
        events.emit(SceneEvent::ModelChanged);

        let rx = events.subscribe();
        drop(rx);
        events.emit(SceneEvent::ModelChanged);
    }

    #[test]
    fn test_default_document_contents() {
        let (scene, _) = Scene::default_document();
        assert_eq!(scene.entities().len(), 3);
        let lights = scene
            .entities()
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Light(_)))
            .count();
        assert_eq!(lights, 1);
        assert!(scene.selected().is_some());
    }
}
