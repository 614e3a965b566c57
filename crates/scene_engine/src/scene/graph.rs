//! The scene: entity arenas plus the per-frame evaluation passes.
//!
//! Three recursive pre-order walks run over the root set each frame, all
//! carrying accumulated transforms:
//!
//! 1. [`Scene::propagate_transforms`] writes world transforms into cameras
//!    and environments.
//! 2. [`Scene::collect_lights`] flattens lights into the shader-visible
//!    array and, on the first pass only, allocates shadow-map slots.
//! 3. [`Scene::emit_draws`] culls and draws meshes.
//!
//! The walks never mutate the tree shape; the document is immutable after
//! linking, which is what keeps shadow-map discovery order stable across
//! frames.

use slotmap::SlotMap;

use crate::foundation::math::{DVec3, DVec4, Mat4, Vec3, Vec4};
use crate::render::backend::{PushConstants, RenderBackend};
use crate::render::culling::CullingVolume;
use crate::render::frame::FrameContext;

use super::animation::Driver;
use super::camera::Camera;
use super::environment::Environment;
use super::light::{Light, ShaderLight, ShadowMapSlot};
use super::material::{Material, MaterialTypeTag};
use super::mesh::Mesh;
use super::node::Node;
use super::{
    CameraKey, EnvironmentKey, LightKey, MaterialKey, MeshKey, NodeKey, RotationDriverKey,
    ScaleDriverKey, TranslationDriverKey,
};

/// A linked scene: owns every entity and the per-frame light state.
pub struct Scene {
    /// Scene name from the document
    pub name: String,
    /// Root nodes, in document order
    pub roots: Vec<NodeKey>,

    /// All nodes
    pub nodes: SlotMap<NodeKey, Node>,
    /// All meshes
    pub meshes: SlotMap<MeshKey, Mesh>,
    /// All cameras, including the built-in detached and debug cameras
    pub cameras: SlotMap<CameraKey, Camera>,
    /// Translation animation channels
    pub translation_drivers: SlotMap<TranslationDriverKey, Driver<DVec3>>,
    /// Rotation animation channels
    pub rotation_drivers: SlotMap<RotationDriverKey, Driver<DVec4>>,
    /// Scale animation channels
    pub scale_drivers: SlotMap<ScaleDriverKey, Driver<DVec3>>,
    /// All environments, including the built-in black fallback
    pub environments: SlotMap<EnvironmentKey, Environment>,
    /// All materials, including the built-in default
    pub materials: SlotMap<MaterialKey, Material>,
    /// All lights
    pub lights: SlotMap<LightKey, Light>,

    /// Frame-local flattened light array, shadow casters first after
    /// [`Scene::reorder_shader_lights`]
    pub shader_lights: Vec<ShaderLight>,
    /// Shadow-map slots in discovery order; allocated once at first
    /// collection and stable thereafter
    pub shadow_maps: Vec<ShadowMapSlot>,

    /// The material used by meshes without one
    pub default_material: MaterialKey,
    /// The black fallback environment
    pub default_environment: EnvironmentKey,
    /// The active environment (the document's, or the fallback)
    pub environment: EnvironmentKey,

    /// The always-present free-flying camera
    pub detached_camera: CameraKey,
    /// The always-present debug camera
    pub debug_camera: CameraKey,
    /// Cameras in cycling order; index 0 is the detached camera
    pub cameras_enumerated: Vec<CameraKey>,
    /// Index of the current camera in [`Scene::cameras_enumerated`]
    pub current_camera_index: usize,
    /// The camera frames are rendered from (unless debugging)
    pub current_camera: CameraKey,
    /// Whether the debug camera overrides the current camera
    pub debug_camera_mode: bool,

    /// Set once the initial light collection has allocated shadow slots
    pub initialized: bool,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("roots", &self.roots.len())
            .field("nodes", &self.nodes.len())
            .field("meshes", &self.meshes.len())
            .field("cameras", &self.cameras.len())
            .field("environments", &self.environments.len())
            .field("materials", &self.materials.len())
            .field("lights", &self.lights.len())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// Create an empty scene with the built-in cameras, environment and
    /// material.
    pub fn new(name: impl Into<String>) -> Self {
        let mut cameras = SlotMap::with_key();
        let detached_camera = cameras.insert(Camera::new(
            "default",
            1.5,
            std::f32::consts::FRAC_PI_2,
            0.1,
            f32::INFINITY,
        ));
        let debug_camera = cameras.insert(Camera::new(
            "debug",
            1.5,
            std::f32::consts::FRAC_PI_2,
            0.1,
            f32::INFINITY,
        ));

        let mut environments = SlotMap::with_key();
        let default_environment = environments.insert(Environment::default_black());

        let mut materials = SlotMap::with_key();
        let default_material = materials.insert(Material::default_simple());

        Self {
            name: name.into(),
            roots: Vec::new(),
            nodes: SlotMap::with_key(),
            meshes: SlotMap::with_key(),
            cameras,
            translation_drivers: SlotMap::with_key(),
            rotation_drivers: SlotMap::with_key(),
            scale_drivers: SlotMap::with_key(),
            environments,
            materials,
            lights: SlotMap::with_key(),
            shader_lights: Vec::new(),
            shadow_maps: Vec::new(),
            default_material,
            default_environment,
            environment: default_environment,
            detached_camera,
            debug_camera,
            cameras_enumerated: vec![detached_camera],
            current_camera_index: 0,
            current_camera: detached_camera,
            debug_camera_mode: false,
            initialized: false,
        }
    }

    /// The camera the next frame renders from
    pub fn active_camera(&self) -> CameraKey {
        if self.debug_camera_mode {
            self.debug_camera
        } else {
            self.current_camera
        }
    }

    /// Number of shadow-casting entries in the shader light array
    pub fn shadow_caster_count(&self) -> usize {
        self.shader_lights
            .iter()
            .filter(|l| l.shadow_res > 0)
            .count()
    }

    /// Re-sample every animated node's TRS at `time` and rebuild its local
    /// transform pair. Nodes without drivers are untouched.
    pub fn apply_animation(&mut self, time: f32) {
        let time = f64::from(time);

        for node in self.nodes.values_mut() {
            if !node.has_drivers() {
                continue;
            }

            if let Some(driver) = node
                .translation_driver
                .and_then(|k| self.translation_drivers.get(k))
            {
                let v = driver.sample(time);
                node.translation = Vec3::new(v.x as f32, v.y as f32, v.z as f32);
            }

            if let Some(driver) = node
                .rotation_driver
                .and_then(|k| self.rotation_drivers.get(k))
            {
                let v = driver.sample(time);
                node.rotation = Vec4::new(v.x as f32, v.y as f32, v.z as f32, v.w as f32);
            }

            if let Some(driver) = node.scale_driver.and_then(|k| self.scale_drivers.get(k)) {
                let v = driver.sample(time);
                node.scale = Vec3::new(v.x as f32, v.y as f32, v.z as f32);
            }

            node.compute_transform();
        }
    }

    /// Walk the tree and write accumulated world transforms into every
    /// attached camera and environment.
    ///
    /// Two accumulators travel together: the world matrix composes local
    /// transforms left-to-right down the tree, the inverse composes in the
    /// opposite order (the inverse of a product reverses its factors).
    pub fn propagate_transforms(&mut self) {
        for &root in &self.roots {
            Self::propagate_node(
                &self.nodes,
                &mut self.cameras,
                &mut self.environments,
                root,
                Mat4::identity(),
                Mat4::identity(),
            );
        }
    }

    fn propagate_node(
        nodes: &SlotMap<NodeKey, Node>,
        cameras: &mut SlotMap<CameraKey, Camera>,
        environments: &mut SlotMap<EnvironmentKey, Environment>,
        key: NodeKey,
        world: Mat4,
        world_inverse: Mat4,
    ) {
        let Some(node) = nodes.get(key) else {
            return;
        };

        let world = world * node.transform;
        let world_inverse = node.inv_transform * world_inverse;

        if let Some(camera) = node.camera.and_then(|k| cameras.get_mut(k)) {
            camera.base_to_world = world;
            camera.world_to_base = world_inverse;
            camera.update_transform();
        }

        if let Some(environment) = node.environment.and_then(|k| environments.get_mut(k)) {
            environment.world_to_environment = world_inverse;
        }

        for &child in &node.children {
            Self::propagate_node(nodes, cameras, environments, child, world, world_inverse);
        }
    }

    /// Rebuild the shader light array from the tree.
    ///
    /// On the first collection (before `initialized` is set) every
    /// shadow-casting light also pushes a shadow-map slot; the slot index
    /// is the light's discovery order, which later frames reproduce because
    /// the tree shape is immutable.
    pub fn collect_lights(&mut self) {
        self.shader_lights.clear();

        for &root in &self.roots {
            Self::collect_node(
                &self.nodes,
                &self.lights,
                &mut self.shader_lights,
                &mut self.shadow_maps,
                self.initialized,
                root,
                Mat4::identity(),
                Mat4::identity(),
            );
        }
    }

    fn collect_node(
        nodes: &SlotMap<NodeKey, Node>,
        lights: &SlotMap<LightKey, Light>,
        shader_lights: &mut Vec<ShaderLight>,
        shadow_maps: &mut Vec<ShadowMapSlot>,
        initialized: bool,
        key: NodeKey,
        world: Mat4,
        world_inverse: Mat4,
    ) {
        let Some(node) = nodes.get(key) else {
            return;
        };

        let world = world * node.transform;
        let world_inverse = node.inv_transform * world_inverse;

        if let Some(light) = node.light.and_then(|k| lights.get(k)) {
            let shader_light = ShaderLight::from_light(light, &world_inverse);

            if shader_light.shadow_res > 0 && !initialized {
                shadow_maps.push(ShadowMapSlot::new(shader_light.shadow_res as u32));
            }

            shader_lights.push(shader_light);
        }

        for &child in &node.children {
            Self::collect_node(
                nodes,
                lights,
                shader_lights,
                shadow_maps,
                initialized,
                child,
                world,
                world_inverse,
            );
        }
    }

    /// Stably partition the shader light array so every shadow-casting
    /// light precedes every non-casting one.
    ///
    /// The shader sizes its shadow-map array by a single count, so casters
    /// must be contiguous at the front; stability keeps the caster order
    /// equal to shadow-map discovery order.
    pub fn reorder_shader_lights(&mut self) {
        let mut ordered = Vec::with_capacity(self.shader_lights.len());
        ordered.extend(self.shader_lights.iter().filter(|l| l.shadow_res > 0).copied());
        ordered.extend(self.shader_lights.iter().filter(|l| l.shadow_res <= 0).copied());
        self.shader_lights = ordered;
    }

    /// Walk the tree emitting one draw per visible mesh.
    ///
    /// Culling is per mesh, not per subtree: a culled parent still recurses
    /// into its children, since child bounds are independent of the
    /// parent's.
    pub fn emit_draws<B: RenderBackend>(
        &self,
        ctx: &mut FrameContext<'_, B>,
        volume: &CullingVolume,
    ) {
        for &root in &self.roots {
            self.draw_node(ctx, volume, root, Mat4::identity());
        }
    }

    fn draw_node<B: RenderBackend>(
        &self,
        ctx: &mut FrameContext<'_, B>,
        volume: &CullingVolume,
        key: NodeKey,
        world: Mat4,
    ) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };

        let world = world * node.transform;

        if let Some(mesh) = node.mesh.and_then(|k| self.meshes.get(k)) {
            let culled = ctx.culling_enabled && volume.culls(&world, &mesh.corners);

            if culled {
                ctx.stats.meshes_culled += 1;
            } else {
                ctx.stats.meshes_drawn += 1;
                self.draw_mesh(ctx, mesh, &world);
            }
        }

        for &child in &node.children {
            self.draw_node(ctx, volume, child, world);
        }
    }

    fn draw_mesh<B: RenderBackend>(
        &self,
        ctx: &mut FrameContext<'_, B>,
        mesh: &Mesh,
        world: &Mat4,
    ) {
        let material = mesh
            .material
            .and_then(|k| self.materials.get(k))
            .unwrap_or(&self.materials[self.default_material]);

        // Shadow passes render depth only; every mesh goes through the
        // simple geometry pipeline there, whatever its material.
        let tag = if ctx.drawing_shadow {
            MaterialTypeTag::Simple
        } else {
            material.type_tag()
        };

        let pipeline = ctx.registry.pipeline(tag, ctx.drawing_shadow);
        if ctx.current_pipeline != Some(pipeline) {
            ctx.current_pipeline = Some(pipeline);
            ctx.backend.bind_pipeline(pipeline);
        }

        if let Some(buffer) = mesh.buffer {
            ctx.backend.bind_vertex_buffer(buffer);
        }
        if let Some(binding) = material.binding {
            ctx.backend.bind_material(binding);
        }

        ctx.backend.push_constants(&PushConstants {
            model_view: (*world).into(),
            shadow_map_index: ctx.shadow_map_index,
            _pad: [0; 3],
        });
        ctx.backend.draw(mesh.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use crate::scene::light::LightKind;
    use approx::relative_eq;

    fn add_node(scene: &mut Scene, name: &str, translation: Vec3, scale: Vec3) -> NodeKey {
        scene.nodes.insert(Node::new(
            name.to_string(),
            translation,
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            scale,
        ))
    }

    #[test]
    fn test_world_inverse_consistency_through_hierarchy() {
        let mut scene = Scene::new("s");

        let child = scene.nodes.insert(Node::new(
            "child".to_string(),
            Vec3::new(0.5, 0.0, -2.0),
            Vec4::new(0.3, -0.1, 0.2, 0.92).normalize(),
            Vec3::new(2.0, 0.5, 1.5),
        ));
        let camera = scene.cameras.insert(Camera::new("c", 1.0, 1.0, 0.1, 100.0));
        scene.nodes[child].camera = Some(camera);

        let root = scene.nodes.insert(Node::new(
            "root".to_string(),
            Vec3::new(1.0, 2.0, 3.0),
            Vec4::new(-0.2, 0.4, 0.1, 0.89).normalize(),
            Vec3::new(0.5, 3.0, 1.0),
        ));
        scene.nodes[root].children.push(child);
        scene.roots.push(root);

        scene.propagate_transforms();

        let cam = &scene.cameras[camera];
        let product = cam.base_to_world * cam.world_to_base;
        assert!(relative_eq!(product, Mat4::identity(), epsilon = 1e-3));
    }

    #[test]
    fn test_environment_receives_inverse_accumulator() {
        let mut scene = Scene::new("s");

        let env = scene
            .environments
            .insert(Environment::default_black());
        let root = add_node(&mut scene, "root", Vec3::new(4.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        scene.nodes[root].environment = Some(env);
        scene.roots.push(root);

        scene.propagate_transforms();

        let expected = Mat4::translation(Vec3::new(-4.0, 0.0, 0.0));
        assert!(relative_eq!(
            scene.environments[env].world_to_environment,
            expected,
            epsilon = 1e-5
        ));
    }

    fn add_light_node(scene: &mut Scene, name: &str, kind: LightKind) -> NodeKey {
        let light = scene.lights.insert(Light {
            name: name.to_string(),
            tint: Vec3::new(1.0, 1.0, 1.0),
            power: 1.0,
            kind,
        });
        let node = add_node(scene, name, Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        scene.nodes[node].light = Some(light);
        node
    }

    fn spot(shadow_resolution: u32) -> LightKind {
        LightKind::Spot {
            radius: 0.1,
            limit: 20.0,
            fov: 1.0,
            blend: 0.1,
            shadow_resolution,
        }
    }

    #[test]
    fn test_shadow_casters_sort_before_other_lights() {
        let mut scene = Scene::new("s");

        for kind in [
            spot(0),
            spot(512),
            LightKind::Sun { angle: 0.02 },
            spot(1024),
        ] {
            let node = add_light_node(&mut scene, "l", kind);
            scene.roots.push(node);
        }

        scene.collect_lights();
        scene.initialized = true;
        scene.reorder_shader_lights();

        let lights = &scene.shader_lights;
        assert_eq!(lights.len(), 4);
        for i in 1..lights.len() {
            // Once a non-caster appears, no caster may follow.
            if lights[i].shadow_res > 0 {
                assert!(lights[i - 1].shadow_res > 0);
            }
        }

        // Stable: the 512 map was discovered before the 1024 one.
        assert_eq!(lights[0].shadow_res, 512);
        assert_eq!(lights[1].shadow_res, 1024);
        assert_eq!(scene.shadow_caster_count(), 2);
    }

    #[test]
    fn test_shadow_slots_allocated_only_on_first_collection() {
        let mut scene = Scene::new("s");
        let node = add_light_node(&mut scene, "l", spot(256));
        scene.roots.push(node);

        scene.collect_lights();
        scene.initialized = true;
        assert_eq!(scene.shadow_maps.len(), 1);
        assert_eq!(scene.shadow_maps[0].resolution, 256);

        scene.collect_lights();
        scene.collect_lights();
        assert_eq!(scene.shadow_maps.len(), 1);
    }

    #[test]
    fn test_animation_updates_local_transform() {
        use crate::scene::animation::{Driver, Interpolation};

        let mut scene = Scene::new("s");
        let node = add_node(&mut scene, "n", Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        let driver = scene.translation_drivers.insert(Driver::new(
            "t".to_string(),
            vec![0.0, 2.0],
            vec![DVec3::new(0.0, 0.0, 0.0), DVec3::new(4.0, 0.0, 0.0)],
            Interpolation::Linear,
        ));
        scene.nodes[node].translation_driver = Some(driver);
        scene.roots.push(node);

        scene.apply_animation(1.0);
        assert!(relative_eq!(
            scene.nodes[node].transform,
            Mat4::translation(Vec3::new(2.0, 0.0, 0.0)),
            epsilon = 1e-6
        ));
    }
}
