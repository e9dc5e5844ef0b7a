use clap::Parser;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use raytraced::cli::Cli;
use raytraced::scene::serialization::{load_scene_from_file, save_scene_to_file};
use raytraced::scene::{EntityKind, LightShape, PrimitiveShape, SceneEvent};
use raytraced::{Camera, EntityId, Renderer, Scene, SceneEvents};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Edits staged by the UI during a frame and applied afterwards, once the
/// renderer borrow is released.
#[derive(Default)]
struct UiActions {
    model_changed: bool,
    select: Option<Option<EntityId>>,
    add: Option<EntityKind>,
    remove: Option<EntityId>,
    edited_entity: Option<raytraced::Entity>,
    save: bool,
}

struct App {
    cli: Cli,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    scene: Scene,
    events: SceneEvents,
    event_rx: Receiver<SceneEvent>,
}

impl App {
    fn new(cli: Cli) -> Result<Self> {
        let (scene, mut events) = match &cli.scene {
            Some(path) => {
                let scene = load_scene_from_file(path)?;
                log::info!("loaded scene from {}", path.display());
                (scene, SceneEvents::default())
            }
            None => Scene::default_document(),
        };
        let event_rx = events.subscribe();

        Ok(Self {
            cli,
            window: None,
            renderer: None,
            scene,
            events,
            event_rx,
        })
    }

    fn apply_actions(&mut self, actions: UiActions) {
        if let Some(selection) = actions.select {
            self.scene.set_selected(selection, &mut self.events);
        }
        if let Some(kind) = actions.add {
            let id = match kind {
                EntityKind::Primitive(PrimitiveShape::Cube) => self.scene.add_cube(),
                EntityKind::Primitive(PrimitiveShape::Plane) => self.scene.add_plane(),
                EntityKind::Primitive(PrimitiveShape::Sphere) => self.scene.add_sphere(),
                EntityKind::Light(LightShape::Sphere) => self.scene.add_sphere_light(),
                EntityKind::Light(LightShape::Rect) => self.scene.add_rect_light(),
            };
            self.scene.set_selected(Some(id), &mut self.events);
            self.events.emit(SceneEvent::ModelChanged);
        }
        if let Some(id) = actions.remove {
            self.scene.remove_entity(id, &mut self.events);
            self.events.emit(SceneEvent::ModelChanged);
        }
        if let Some(edited) = actions.edited_entity {
            if let Some(entity) = self.scene.entity_mut(edited.id) {
                entity.values = edited.values;
            }
        }
        if actions.model_changed {
            self.events.emit(SceneEvent::ModelChanged);
        }
        if actions.save {
            match &self.cli.scene {
                Some(path) => match save_scene_to_file(&self.scene, path) {
                    Ok(()) => log::info!("saved scene to {}", path.display()),
                    Err(err) => log::error!("save failed: {err}"),
                },
                None => log::warn!("no scene path given; run with --scene to save"),
            }
        }
    }

    /// Drains pending scene signals; a model change means the GPU geometry
    /// is stale and the renderer must restart.
    fn drain_events(&mut self) -> bool {
        let mut restart = false;
        while let Ok(event) = self.event_rx.try_recv() {
            if event == SceneEvent::ModelChanged {
                restart = true;
            }
        }
        restart
    }

    fn redraw(&mut self) {
        let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) else {
            return;
        };
        let window = window.clone();

        let scene = &self.scene;
        let mut camera = renderer.camera;
        let frame_index = renderer.frame_index();
        let mut actions = UiActions::default();

        let result = renderer.render(&window, |ctx| {
            editor_panel(ctx, scene, &mut camera, frame_index, &mut actions);
        });
        if let Err(err) = result {
            log::error!("render error: {err}");
        }

        let renderer = self.renderer.as_mut().unwrap();
        if camera != renderer.camera {
            renderer.camera = camera;
            actions.model_changed = true;
        }

        self.apply_actions(actions);
        if self.drain_events() {
            let renderer = self.renderer.as_mut().unwrap();
            if let Err(err) = renderer.restart(&self.scene) {
                log::error!("scene rebuild failed: {err}");
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let (width, height) = self
                .scene
                .custom_size
                .unwrap_or((self.cli.width, self.cli.height));
            let window = match event_loop.create_window(
                Window::default_attributes()
                    .with_title("Raytraced")
                    .with_inner_size(winit::dpi::LogicalSize::new(width, height)),
            ) {
                Ok(w) => Arc::new(w),
                Err(e) => {
                    log::error!("failed to create window: {e}");
                    event_loop.exit();
                    return;
                }
            };

            let renderer = match pollster::block_on(Renderer::new(window.clone(), &self.scene)) {
                Ok(r) => r,
                Err(e) => {
                    log::error!("failed to initialize renderer: {e}");
                    event_loop.exit();
                    return;
                }
            };

            self.window = Some(window);
            self.renderer = Some(renderer);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Let egui handle the event first
        if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) {
            if renderer.handle_event(window, &event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn editor_panel(
    ctx: &egui::Context,
    scene: &Scene,
    camera: &mut Camera,
    frame_index: u32,
    actions: &mut UiActions,
) {
    egui::SidePanel::left("scene_panel")
        .default_width(260.0)
        .show(ctx, |ui| {
            ui.heading("Scene");
            ui.horizontal_wrapped(|ui| {
                if ui.button("+ Cube").clicked() {
                    actions.add = Some(EntityKind::Primitive(PrimitiveShape::Cube));
                }
                if ui.button("+ Sphere").clicked() {
                    actions.add = Some(EntityKind::Primitive(PrimitiveShape::Sphere));
                }
                if ui.button("+ Plane").clicked() {
                    actions.add = Some(EntityKind::Primitive(PrimitiveShape::Plane));
                }
                if ui.button("+ Light").clicked() {
                    actions.add = Some(EntityKind::Light(LightShape::Sphere));
                }
                if ui.button("+ Rect Light").clicked() {
                    actions.add = Some(EntityKind::Light(LightShape::Rect));
                }
            });
            ui.separator();

            for entity in scene.entities() {
                let selected = scene.selected() == Some(entity.id);
                if ui.selectable_label(selected, &entity.name).clicked() {
                    actions.select = Some(Some(entity.id));
                }
            }
            ui.separator();

            if let Some(id) = scene.selected() {
                if let Some(entity) = scene.entity(id) {
                    ui.heading(&entity.name);
                    entity_editor(ui, entity, actions);
                    if ui.button("Remove").clicked() {
                        actions.remove = Some(id);
                    }
                    ui.separator();
                }
            }

            // Camera edits are detected by the caller diffing the staged copy.
            ui.heading("Camera");
            vec3_editor(ui, "Position", &mut camera.position);
            vec3_editor(ui, "Look At", &mut camera.look_at);
            ui.horizontal(|ui| {
                ui.label("Fov");
                ui.add(egui::DragValue::new(&mut camera.fov).speed(0.5).range(10.0..=160.0));
            });
            ui.horizontal(|ui| {
                ui.label("Aperture");
                ui.add(egui::DragValue::new(&mut camera.aperture).speed(0.001));
            });
            ui.separator();

            if ui.button("Save").clicked() {
                actions.save = true;
            }
            ui.label(format!("frame {frame_index}"));
        });
}

/// Parameter editing works on a staged copy: the entity itself is only
/// mutated after the frame, through `UiActions`.
fn entity_editor(ui: &mut egui::Ui, entity: &raytraced::Entity, actions: &mut UiActions) {
    let mut edited = entity.clone();
    let mut changed = false;

    let keys: Vec<String> = {
        let mut keys: Vec<String> = edited.values.keys().cloned().collect();
        keys.sort();
        keys
    };
    for key in keys {
        let mut value = edited.read(&key);
        ui.horizontal(|ui| {
            ui.label(&key);
            if ui
                .add(egui::DragValue::new(&mut value).speed(0.05))
                .changed()
            {
                edited.set(&key, value);
                changed = true;
            }
        });
    }

    if changed {
        actions.model_changed = true;
        actions.edited_entity = Some(edited);
    }
}

fn vec3_editor(ui: &mut egui::Ui, label: &str, value: &mut glam::Vec3) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        changed |= ui.add(egui::DragValue::new(&mut value.x).speed(0.05)).changed();
        changed |= ui.add(egui::DragValue::new(&mut value.y).speed(0.05)).changed();
        changed |= ui.add(egui::DragValue::new(&mut value.z).speed(0.05)).changed();
    });
    changed
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let event_loop = EventLoop::new()?;
    let mut app = App::new(cli)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
