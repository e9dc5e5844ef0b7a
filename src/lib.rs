//! Interactive scene editor core with a progressive multi-pass GPU path
//! tracer. The scene model, geometry builder and material packer are pure
//! CPU code; the resource manager and frame pipeline own the GPU side.

pub mod builder;
pub mod camera;
pub mod cli;
pub mod context;
pub mod intersect;
pub mod material;
pub mod mesh;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod slots;
pub mod types;

pub use builder::RenderData;
pub use camera::Camera;
pub use context::GpuContext;
pub use intersect::{GpuIntersector, IntersectionMode, RayIntersector};
pub use material::Bsdf;
pub use mesh::{MeshData, MeshGenerator, ProceduralMesher};
pub use pipeline::Renderer;
pub use resources::ResourceManager;
pub use scene::{Entity, EntityId, EntityKind, Scene, SceneEvent, SceneEvents};
pub use slots::FrameSlots;
