use crate::scene::Entity;

/// Index of refraction used when an entity does not specify one. Matches the
/// common dielectric default.
pub const DEFAULT_IOR: f32 = 1.45;

/// Fixed-layout BSDF record consumed by the shading kernel. Six vec4 groups,
/// addressed by flat offset on the GPU:
///
/// ```text
/// 0: albedo.rgb,      specular
/// 1: emission.rgb,    anisotropic
/// 2: metallic, roughness, subsurface, specular_tint
/// 3: sheen, sheen_tint, clearcoat, clearcoat_gloss
/// 4: transmission, 0, 0, 0
/// 5: extinction.rgb,  ior
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Bsdf {
    pub albedo_specular: [f32; 4],
    pub emission_anisotropic: [f32; 4],
    pub metallic_roughness_subsurface_tint: [f32; 4],
    pub sheen_tint_clearcoat_gloss: [f32; 4],
    pub transmission: [f32; 4],
    pub extinction_ior: [f32; 4],
}

impl Bsdf {
    /// Packs an entity's parameter map into the fixed record. Total and
    /// pure: absent keys resolve to 0, absent `ior` to [`DEFAULT_IOR`].
    pub fn pack(entity: &Entity) -> Self {
        let albedo = entity.read_vec3("albedo");
        let emission = entity.read_vec3("emission");
        let extinction = entity.read_vec3("extinction");
        Self {
            albedo_specular: [albedo.x, albedo.y, albedo.z, entity.read("specular")],
            emission_anisotropic: [
                emission.x,
                emission.y,
                emission.z,
                entity.read("anisotropic"),
            ],
            metallic_roughness_subsurface_tint: [
                entity.read("metallic"),
                entity.read("roughness"),
                entity.read("subsurface"),
                entity.read("specularTint"),
            ],
            sheen_tint_clearcoat_gloss: [
                entity.read("sheen"),
                entity.read("sheenTint"),
                entity.read("clearcoat"),
                entity.read("clearcoatGloss"),
            ],
            transmission: [entity.read("transmission"), 0.0, 0.0, 0.0],
            extinction_ior: [
                extinction.x,
                extinction.y,
                extinction.z,
                entity.read_or("ior", DEFAULT_IOR),
            ],
        }
    }
}
