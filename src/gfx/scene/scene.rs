//! # Scene
//!
//! Owns every node, mesh, camera and light of the viewer and drives the
//! per-frame cycle:
//!
//! 1. input actions and mouse picks mutate cameras and objects
//! 2. [`Scene::update`] steps the animated actor and the timed effects
//! 3. [`Scene::render`] issues the four passes in a fixed order
//!
//! ## Render passes
//!
//! - skybox, depth test off, view rotation only
//! - animated actor, own program, stencil tag [`PickId::Eagle`]
//! - muzzle flash billboard, alpha blended, only while the flash plays
//! - opaque pass over every other visible object, pickable objects tagged
//!
//! The stencil tags written here are what [`Scene::process_mouse_click`]
//! reads back on the next click.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cgmath::{Deg, InnerSpace, Matrix, Matrix3, Matrix4, One, Quaternion, Vector2, Vector3};

use crate::error::Result;
use crate::gfx::camera::Camera;
use crate::gfx::geometry::generate_cube;
use crate::gfx::picking::PickId;
use crate::gfx::rendering::sink::{
    set, MeshHandle, PickBuffer, ProgramHandle, RenderSink, TextureHandle,
};
use crate::gfx::resources::material::Material;
use crate::gfx::resources::mesh::{KeyframeMesh, MeshLibrary, MeshLoader, TextureKind};
use crate::gfx::scene::actor::AnimatedActor;
use crate::gfx::scene::effects::{ChestLid, DayNightCycle, FogParams, MuzzleFlash};
use crate::gfx::scene::graph::{NodeId, SceneGraph, SceneObject};
use crate::gfx::scene::lights::{upload_fog, Lighting};
use crate::gfx::scene::loader::{read_scene_file, SceneEntry};
use crate::gfx::scene::object::{GameObject, ObjectRole};
use crate::gfx::transform::{quat_from_euler_degrees, Transform};
use crate::time::Clock;

pub const LIGHT_PROGRAM: &str = "light";
pub const MUZZLE_FLASH_PROGRAM: &str = "muzzle_flash";
pub const SKYBOX_PROGRAM: &str = "skybox";
pub const ACTOR_PROGRAM: &str = "Eagle";

/// Cameras may not leave this box.
pub const WORLD_HALF_EXTENT: f32 = 20.0;
pub const WORLD_FLOOR: f32 = 0.1;
pub const WORLD_CEILING: f32 = 35.0;
/// Cameras may not come closer than this to the animated actor.
pub const ACTOR_CLEARANCE: f32 = 0.5;

/// Local offset of a picked-up revolver relative to the camera.
pub const HELD_ITEM_OFFSET: [f32; 3] = [-0.1, -0.2, 0.4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    Fire,
}

/// Files the scene loads besides the objects listed in the scene file.
#[derive(Debug, Clone)]
pub struct SceneAssets {
    pub shader_dir: PathBuf,
    pub muzzle_flash_texture: PathBuf,
    pub box_diffuse: PathBuf,
    pub box_specular: PathBuf,
    /// +X, -X, +Y, -Y, +Z, -Z
    pub skybox_faces: [PathBuf; 6],
    pub actor_frames: Vec<PathBuf>,
}

impl Default for SceneAssets {
    fn default() -> Self {
        let skybox = |side: &str| PathBuf::from(format!("resources/textures/skybox/sk{side}.jpg"));
        Self {
            shader_dir: PathBuf::from("src/shaders"),
            muzzle_flash_texture: PathBuf::from("resources/textures/muzzle_flash.png"),
            box_diffuse: PathBuf::from("resources/textures/box_diffuse.png"),
            box_specular: PathBuf::from("resources/textures/box_specular.png"),
            skybox_faces: [
                skybox("right"),
                skybox("left"),
                skybox("top"),
                skybox("bottom"),
                skybox("front"),
                skybox("back"),
            ],
            actor_frames: (0..7).map(|i| PathBuf::from(format!("Eagle{i}.obj"))).collect(),
        }
    }
}

impl SceneAssets {
    /// Program name with its vertex and fragment shader files.
    pub fn programs(&self) -> [(&'static str, PathBuf, PathBuf); 4] {
        let pair = |stem: &str| {
            (
                self.shader_dir.join(format!("{stem}vertex.wgsl")),
                self.shader_dir.join(format!("{stem}fragment.wgsl")),
            )
        };
        let (lv, lf) = pair("");
        let (mv, mf) = pair("muzzle_flash_");
        let (sv, sf) = pair("skybox_");
        let (ev, ef) = pair("eagle_");
        [
            (LIGHT_PROGRAM, lv, lf),
            (MUZZLE_FLASH_PROGRAM, mv, mf),
            (SKYBOX_PROGRAM, sv, sf),
            (ACTOR_PROGRAM, ev, ef),
        ]
    }
}

#[derive(Debug, Clone)]
struct ActorMesh {
    handle: MeshHandle,
    texture: Option<TextureHandle>,
    keyframes: KeyframeMesh,
}

struct FrameContext {
    camera: NodeId,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
    fog: FogParams,
    now: f32,
}

pub struct Scene {
    graph: SceneGraph,
    objects: Vec<GameObject>,
    meshes: MeshLibrary,
    cameras: Vec<Camera>,
    active_camera: usize,
    actor: Option<AnimatedActor>,
    actor_mesh: Option<ActorMesh>,
    lighting: Lighting,
    programs: HashMap<String, ProgramHandle>,
    skybox_texture: Option<TextureHandle>,
    muzzle_flash_texture: Option<TextureHandle>,
    muzzle_flash: MuzzleFlash,
    chest: ChestLid,
    day_night: DayNightCycle,
    clock: Rc<dyn Clock>,
}

impl Scene {
    /// Reads a scene file and loads it. See [`Scene::load`].
    pub fn load_file(
        path: &Path,
        assets: &SceneAssets,
        loader: &dyn MeshLoader,
        sink: &mut dyn RenderSink,
        clock: Rc<dyn Clock>,
    ) -> Result<Self> {
        let entries = read_scene_file(path)
            .inspect_err(|e| log::error!("Failed to read scene '{}': {}", path.display(), e))?;
        Self::load(&entries, assets, loader, sink, clock)
    }

    /// Loads every listed object, the programs, textures, the procedural box
    /// and the animated actor, then sets up cameras and lights. Any failure
    /// aborts the whole load.
    pub fn load(
        entries: &[SceneEntry],
        assets: &SceneAssets,
        loader: &dyn MeshLoader,
        sink: &mut dyn RenderSink,
        clock: Rc<dyn Clock>,
    ) -> Result<Self> {
        let now = clock.now();
        let mut scene = Scene {
            graph: SceneGraph::new(),
            objects: Vec::new(),
            meshes: MeshLibrary::new(),
            cameras: Vec::new(),
            active_camera: 0,
            actor: None,
            actor_mesh: None,
            lighting: Lighting::default(),
            programs: HashMap::new(),
            skybox_texture: None,
            muzzle_flash_texture: None,
            muzzle_flash: MuzzleFlash::default(),
            chest: ChestLid::default(),
            day_night: DayNightCycle::new(now),
            clock,
        };

        for entry in entries {
            scene.load_object(entry, loader)?;
        }
        scene.load_programs(assets, sink)?;
        scene.load_textures(assets, sink)?;
        scene.load_box(assets);
        scene.load_actor(assets, loader, sink)?;
        scene
            .meshes
            .upload_pending(sink)
            .inspect_err(|e| log::error!("Failed to upload meshes: {}", e))?;
        scene.setup_cameras()?;
        scene.setup_lights(sink);

        if let (Some(flash), Some(actor)) =
            (scene.node_of_role(ObjectRole::MuzzleFlash), &scene.actor)
        {
            scene.graph.attach(flash, actor.node)?;
        }

        scene.day_night = DayNightCycle::new(scene.clock.now());
        log::info!(
            "Scene loaded: {} objects, {} meshes, {} cameras",
            scene.objects.len(),
            scene.meshes.len(),
            scene.cameras.len()
        );
        Ok(scene)
    }

    fn load_object(&mut self, entry: &SceneEntry, loader: &dyn MeshLoader) -> Result<()> {
        let role = ObjectRole::from_name(&entry.name);
        let mesh = self
            .meshes
            .load(&entry.model_path, Material::for_role(role), loader)
            .inspect_err(|e| log::error!("Failed to load mesh of '{}': {}", entry.name, e))?;
        let node = self
            .graph
            .insert(SceneObject::new(entry.name.clone(), entry.transform()));
        self.objects.push(GameObject::new(node, role, Some(mesh)));
        log::info!("Loaded object '{}'", entry.name);
        Ok(())
    }

    fn load_programs(&mut self, assets: &SceneAssets, sink: &mut dyn RenderSink) -> Result<()> {
        for (name, vertex, fragment) in assets.programs() {
            let program = sink
                .create_program(name, &vertex, &fragment)
                .inspect_err(|e| log::error!("{}", e))?;
            self.programs.insert(name.to_string(), program);
        }
        Ok(())
    }

    fn load_textures(&mut self, assets: &SceneAssets, sink: &mut dyn RenderSink) -> Result<()> {
        self.muzzle_flash_texture = Some(
            sink.load_texture(&assets.muzzle_flash_texture)
                .inspect_err(|e| log::error!("{}", e))?,
        );
        let faces: [&Path; 6] = std::array::from_fn(|i| assets.skybox_faces[i].as_path());
        self.skybox_texture = Some(
            sink.load_cubemap(&faces)
                .inspect_err(|e| log::error!("Failed to load skybox: {}", e))?,
        );
        Ok(())
    }

    fn load_box(&mut self, assets: &SceneAssets) {
        let geometry = generate_cube()
            .into_mesh()
            .with_texture(TextureKind::Diffuse, assets.box_diffuse.clone())
            .with_texture(TextureKind::Specular, assets.box_specular.clone());
        let mesh = self
            .meshes
            .insert(PathBuf::from("procedural/box"), geometry, Material::default());
        let node = self.graph.insert(SceneObject::new(
            "Box",
            Transform::from_euler_degrees(
                Vector3::new(2.75, 0.3, -0.5),
                Vector3::new(0.0, 30.0, 0.0),
                Vector3::new(0.5, 0.5, 0.5),
            ),
        ));
        self.objects
            .push(GameObject::new(node, ObjectRole::Prop, Some(mesh)));
    }

    fn load_actor(
        &mut self,
        assets: &SceneAssets,
        loader: &dyn MeshLoader,
        sink: &mut dyn RenderSink,
    ) -> Result<()> {
        let keyframes = KeyframeMesh::load(&assets.actor_frames, loader)
            .inspect_err(|e| log::error!("Failed to load animated actor: {}", e))?;
        let handle = sink.upload_mesh(&keyframes.geometry)?;
        let texture = keyframes
            .geometry
            .textures
            .iter()
            .find(|t| t.kind == TextureKind::Diffuse)
            .map(|t| sink.load_texture(&t.path))
            .transpose()?;

        let actor = AnimatedActor::new(
            &mut self.graph,
            "Eagle",
            keyframes.frame_count(),
            self.clock.now(),
        );
        self.objects
            .push(GameObject::new(actor.node, ObjectRole::Eagle, None));
        log::info!("Loaded animated actor ({} frames)", keyframes.frame_count());
        self.actor_mesh = Some(ActorMesh {
            handle,
            texture,
            keyframes,
        });
        self.actor = Some(actor);
        Ok(())
    }

    fn setup_cameras(&mut self) -> Result<()> {
        let graph = &mut self.graph;
        let camera0 = Camera::new(graph, "Camera0", Vector3::new(3.0, 1.0, -5.0), 0.0, 0.0);
        let mut camera1 = Camera::new(graph, "Camera1", Vector3::new(3.41, 6.9, 9.8), 29.4, -180.5);
        let mut camera2 = Camera::new(graph, "Camera2", Vector3::new(4.44, 1.7, -13.0), 2.8, -1.9);
        let mut camera_actor =
            Camera::new(graph, "CameraEagle", Vector3::new(0.0, -0.2, 0.0), 45.0, 0.0);
        if let Some(actor) = &self.actor {
            graph.attach(camera_actor.node, actor.node)?;
        }
        camera1.movable = false;
        camera2.movable = false;
        camera_actor.movable = false;

        self.cameras = vec![camera0, camera1, camera2, camera_actor];
        self.active_camera = 0;
        Ok(())
    }

    fn setup_lights(&mut self, sink: &mut dyn RenderSink) {
        if let Some(program) = self.program(LIGHT_PROGRAM) {
            sink.use_program(program);
            self.lighting.upload_defaults(sink);
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn objects(&self) -> &[GameObject] {
        &self.objects
    }

    pub fn meshes(&self) -> &MeshLibrary {
        &self.meshes
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn active_camera_index(&self) -> usize {
        self.active_camera
    }

    pub fn active_camera(&self) -> Option<&Camera> {
        self.cameras.get(self.active_camera)
    }

    pub fn set_active_camera(&mut self, index: usize) {
        if index < self.cameras.len() {
            self.active_camera = index;
            log::debug!("Active camera: {}", self.graph.name(self.cameras[index].node));
        } else {
            log::warn!("No camera with index {}", index);
        }
    }

    pub fn actor(&self) -> Option<&AnimatedActor> {
        self.actor.as_ref()
    }

    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    pub fn muzzle_flash(&self) -> &MuzzleFlash {
        &self.muzzle_flash
    }

    pub fn chest(&self) -> &ChestLid {
        &self.chest
    }

    pub fn is_night(&self) -> bool {
        self.day_night.is_night()
    }

    pub fn fog(&self) -> FogParams {
        self.day_night.fog()
    }

    /// First object whose name starts with `prefix`.
    pub fn find_object_by_name(&self, prefix: &str) -> Option<&GameObject> {
        self.objects
            .iter()
            .find(|o| self.graph.name(o.node).starts_with(prefix))
    }

    pub fn object_by_role(&self, role: ObjectRole) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.role == role)
    }

    fn node_of_role(&self, role: ObjectRole) -> Option<NodeId> {
        self.object_by_role(role).map(|o| o.node)
    }

    fn is_visible(&self, role: ObjectRole) -> bool {
        self.object_by_role(role).is_some_and(|o| o.visible)
    }

    fn program(&self, name: &str) -> Option<ProgramHandle> {
        let program = self.programs.get(name).copied();
        if program.is_none() {
            log::warn!("Program '{}' not found", name);
        }
        program
    }

    pub fn toggle_spotlight(&mut self) {
        self.lighting.toggle_spotlight();
    }

    pub fn toggle_point_lights(&mut self) {
        self.lighting.toggle_point_lights();
    }

    pub fn toggle_camera_movement(&mut self) {
        if let Some(camera) = self.cameras.get_mut(self.active_camera) {
            camera.movable = !camera.movable;
            log::info!("Camera movement {}", if camera.movable { "on" } else { "off" });
        }
    }

    pub fn set_cameras_aspect_ratio(&mut self, aspect: f32) {
        for camera in &mut self.cameras {
            camera.set_aspect_ratio(aspect);
        }
    }

    /// Steps the animated actor and the timed effects.
    pub fn update(&mut self, dt: f32) {
        let now = self.clock.now();

        if let Some(actor) = self.actor.as_mut() {
            actor.update(&mut self.graph, dt, now);
        }

        self.muzzle_flash.update(now);

        if let Some(rotation) = self.chest.update(now) {
            match self.node_of_role(ObjectRole::ChestTop) {
                Some(chest) => self.graph.set_world_rotation(chest, rotation),
                None => log::warn!("Chest lid animating without a chest object"),
            }
        }

        self.day_night.update(now);
    }

    /// Reads the stencil tag under `position` (window space, origin bottom
    /// left) and runs the action bound to it. Returns what was hit.
    pub fn process_mouse_click(
        &mut self,
        position: Vector2<f32>,
        picks: &dyn PickBuffer,
    ) -> Option<PickId> {
        let raw = picks.read_pick_id(position.x.max(0.0) as u32, position.y.max(0.0) as u32);
        let pick = PickId::from_raw(raw)?;
        log::debug!("Picked {:?} at ({}, {})", pick, position.x, position.y);

        match pick {
            PickId::ChestTop => self.start_chest_animation(),
            PickId::Revolver => self.pick_up_revolver(),
            PickId::Eagle => self.shoot_actor(),
        }
        Some(pick)
    }

    fn start_chest_animation(&mut self) {
        if self.chest.is_active() {
            return;
        }
        let Some(chest) = self.node_of_role(ObjectRole::ChestTop) else {
            log::warn!("Chest object not found");
            return;
        };
        let current = self.graph.world_rotation(chest);
        self.chest.trigger(self.clock.now(), current);
    }

    fn pick_up_revolver(&mut self) {
        let Some(revolver) = self.node_of_role(ObjectRole::Revolver) else {
            log::warn!("Revolver object not found");
            return;
        };
        if self.graph.parent(revolver).is_some() {
            return;
        }
        let Some(camera) = self.active_camera().map(|c| c.node) else {
            log::warn!("No active camera to hold the revolver");
            return;
        };
        if let Err(e) = self.graph.attach(revolver, camera) {
            log::warn!("Cannot pick up revolver: {}", e);
            return;
        }
        self.graph
            .set_relative_location(revolver, Vector3::from(HELD_ITEM_OFFSET));
        self.graph
            .set_relative_rotation(revolver, quat_from_euler_degrees(Vector3::new(0.0, 180.0, 0.0)));
        log::info!("Revolver picked up");
    }

    fn shoot_actor(&mut self) {
        let armed = self
            .node_of_role(ObjectRole::Revolver)
            .is_some_and(|revolver| self.graph.parent(revolver).is_some());
        if !armed || !self.is_visible(ObjectRole::Eagle) {
            return;
        }
        self.muzzle_flash.trigger(self.clock.now());
        if let Some(actor) = self.objects.iter_mut().find(|o| o.role == ObjectRole::Eagle) {
            actor.visible = false;
        }
        log::info!("Animated actor shot");
    }

    /// Moves the active camera along its own axes. Moves that would leave
    /// the world box or get too close to the animated actor are dropped.
    pub fn process_input_action(&mut self, action: InputAction, dt: f32) {
        let Some(camera) = self.cameras.get(self.active_camera) else {
            log::warn!("No active camera");
            return;
        };
        if !camera.movable {
            return;
        }
        let node = camera.node;
        let direction = match action {
            InputAction::MoveForward => self.graph.front_vector(node),
            InputAction::MoveBackward => -self.graph.front_vector(node),
            InputAction::MoveLeft => self.graph.left_vector(node),
            InputAction::MoveRight => -self.graph.left_vector(node),
            InputAction::Fire => return,
        };

        let delta = direction * dt * camera.speed();
        let candidate = self.graph.world_location(node) + delta;
        if !within_world(candidate) {
            log::trace!("Move rejected: out of bounds");
            return;
        }
        if let Some(actor) = &self.actor {
            if (self.graph.world_location(actor.node) - candidate).magnitude() < ACTOR_CLEARANCE {
                log::trace!("Move rejected: too close to the actor");
                return;
            }
        }
        self.graph.add_delta_location(node, delta);
    }

    /// Turns the active camera by a mouse offset scaled by `dt`.
    pub fn process_mouse_movement(&mut self, offset: Vector2<f32>, dt: f32) {
        if let Some(camera) = self.cameras.get_mut(self.active_camera) {
            if camera.movable {
                camera.process_mouse_movement(&mut self.graph, offset * dt);
            }
        }
    }

    pub fn render(&self, sink: &mut dyn RenderSink) {
        let Some(camera) = self.active_camera() else {
            log::warn!("No active camera, frame skipped");
            return;
        };
        let frame = FrameContext {
            camera: camera.node,
            view: camera.view_matrix(&self.graph),
            projection: camera.projection_matrix(),
            fog: self.day_night.fog(),
            now: self.clock.now(),
        };

        self.render_skybox(sink, &frame);
        self.render_actor(sink, &frame);
        if self.muzzle_flash.is_active() {
            self.render_billboard(sink, &frame);
        }
        self.render_objects(sink, &frame);
    }

    fn gpu_mesh(&self, object: &GameObject) -> Option<MeshHandle> {
        object
            .mesh
            .and_then(|id| self.meshes.get(id))
            .and_then(|entry| entry.gpu)
    }

    fn render_skybox(&self, sink: &mut dyn RenderSink, frame: &FrameContext) {
        let Some(skybox) = self.object_by_role(ObjectRole::Skybox) else {
            return;
        };
        let (Some(mesh), Some(program)) = (self.gpu_mesh(skybox), self.program(SKYBOX_PROGRAM))
        else {
            return;
        };

        sink.set_depth_test(false);
        sink.use_program(program);
        set(sink, "PVM", frame.projection * rotation_part(frame.view));
        set(sink, "M", self.graph.world_model_matrix(skybox.node));
        set(sink, "V", frame.view);
        upload_fog(sink, &frame.fog);
        set(sink, "skyboxTexture", 0);
        if let Some(texture) = self.skybox_texture {
            sink.bind_texture(0, texture);
        }
        sink.draw_mesh(mesh);
        sink.set_depth_test(true);
    }

    fn render_actor(&self, sink: &mut dyn RenderSink, frame: &FrameContext) {
        let (Some(actor), Some(mesh)) = (&self.actor, &self.actor_mesh) else {
            return;
        };
        if !self.is_visible(ObjectRole::Eagle) {
            return;
        }
        let Some(program) = self.program(ACTOR_PROGRAM) else {
            return;
        };

        let model = self.graph.world_model_matrix(actor.node);
        sink.use_program(program);
        set(sink, "PVMMatrix", frame.projection * frame.view * model);
        set(sink, "MMatrix", model);
        set(sink, "VMatrix", frame.view);
        upload_fog(sink, &frame.fog);
        sink.set_stencil_tag(PickId::Eagle.tag());

        set(sink, "AnimationAlpha", actor.alpha());
        set(sink, "texture_diffuse1", 0);
        if let Some(texture) = mesh.texture {
            sink.bind_texture(0, texture);
        }
        sink.draw_keyframes(
            mesh.handle,
            mesh.keyframes.frame_offset(actor.current_frame()),
            mesh.keyframes.frame_offset(actor.next_frame()),
        );
        sink.clear_stencil_tag();
    }

    fn render_billboard(&self, sink: &mut dyn RenderSink, frame: &FrameContext) {
        let Some(flash) = self.object_by_role(ObjectRole::MuzzleFlash) else {
            log::warn!("Muzzle flash object not found");
            return;
        };
        let (Some(mesh), Some(program)) =
            (self.gpu_mesh(flash), self.program(MUZZLE_FLASH_PROGRAM))
        else {
            return;
        };

        sink.use_program(program);
        sink.set_blending(true);

        // Inverse view rotation, with the quad stood up to face the camera.
        let left = self.graph.left_vector(frame.camera);
        let facing =
            (rotation_part(frame.view) * Matrix4::from_axis_angle(left, Deg(90.0))).transpose();
        let scale = self.graph.world_transform(flash.node).scale;
        let model = Matrix4::from_translation(self.graph.world_location(flash.node))
            * Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z)
            * facing;

        set(sink, "PVMMatrix", frame.projection * frame.view * model);
        set(sink, "frame", self.muzzle_flash.frame());
        set(sink, "texSampler", 0);
        if let Some(texture) = self.muzzle_flash_texture {
            sink.bind_texture(0, texture);
        }
        sink.draw_mesh(mesh);
        sink.set_blending(false);
    }

    fn render_objects(&self, sink: &mut dyn RenderSink, frame: &FrameContext) {
        let Some(program) = self.program(LIGHT_PROGRAM) else {
            return;
        };
        sink.use_program(program);
        set(sink, "VMatrix", frame.view);
        self.lighting
            .upload_frame(sink, self.graph.front_vector(frame.camera));
        upload_fog(sink, &frame.fog);

        let view_projection = frame.projection * frame.view;
        for object in &self.objects {
            if !object.visible || object.role.has_own_pass() {
                continue;
            }
            let Some(entry) = object.mesh.and_then(|id| self.meshes.get(id)) else {
                continue;
            };
            let Some(mesh) = entry.gpu else {
                continue;
            };

            let tag = object.role.pick_id();
            if let Some(tag) = tag {
                sink.set_stencil_tag(tag.tag());
            }

            let model = self.graph.world_model_matrix(object.node);
            set(sink, "PVMMatrix", view_projection * model);
            set(sink, "MMatrix", model);
            if object.role == ObjectRole::Water {
                set(sink, "WaterTransform", water_uv_transform(frame.now));
                set(sink, "IsWater", true);
            }

            sink.bind_material(&entry.material);
            bind_textures(sink, &entry.textures);
            sink.draw_mesh(mesh);
            set(sink, "IsWater", false);

            if tag.is_some() {
                sink.clear_stencil_tag();
            }
        }
    }
}

pub fn within_world(location: Vector3<f32>) -> bool {
    let horizontal = -WORLD_HALF_EXTENT..=WORLD_HALF_EXTENT;
    horizontal.contains(&location.x)
        && horizontal.contains(&location.z)
        && (WORLD_FLOOR..=WORLD_CEILING).contains(&location.y)
}

/// Time-varying UV transform of water surfaces: a blend from identity
/// toward a 45/45 degree tilt and a one-unit shift, ping-ponged by
/// `|sin(0.1 t)|`.
pub fn water_uv_transform(now: f32) -> Matrix4<f32> {
    let alpha = (now * 0.1).sin().abs();
    let rotation = Quaternion::one().slerp(
        quat_from_euler_degrees(Vector3::new(45.0, 45.0, 0.0)),
        alpha,
    );
    Matrix4::from(rotation) * Matrix4::from_translation(Vector3::unit_x() * alpha)
}

/// Upper 3x3 of `m` widened back to a 4x4 with no translation.
fn rotation_part(m: Matrix4<f32>) -> Matrix4<f32> {
    Matrix4::from(Matrix3::from_cols(
        m.x.truncate(),
        m.y.truncate(),
        m.z.truncate(),
    ))
}

fn bind_textures(sink: &mut dyn RenderSink, textures: &[(TextureKind, TextureHandle)]) {
    let mut diffuse = 0;
    let mut specular = 0;
    for (unit, (kind, texture)) in textures.iter().enumerate() {
        let index = match kind {
            TextureKind::Diffuse => {
                diffuse += 1;
                diffuse
            }
            TextureKind::Specular => {
                specular += 1;
                specular
            }
        };
        set(
            sink,
            &format!("material.{}{}", kind.uniform_prefix(), index),
            unit as i32,
        );
        sink.bind_texture(unit as u32, *texture);
    }
    set(sink, "material.hasSpecular", specular > 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::gfx::rendering::recorder::{RecordingSink, RenderCommand};
    use crate::gfx::rendering::sink::UniformValue;
    use crate::gfx::resources::mesh::MeshGeometry;
    use crate::gfx::scene::vertex::Vertex3D;
    use crate::time::ManualClock;
    use cgmath::SquareMatrix;

    struct TriangleLoader {
        missing: Option<PathBuf>,
    }

    impl MeshLoader for TriangleLoader {
        fn load(&self, path: &Path) -> Result<MeshGeometry> {
            if self.missing.as_deref() == Some(path) {
                return Err(LoadError::Mesh {
                    path: path.to_path_buf(),
                    message: "not found".to_string(),
                });
            }
            Ok(MeshGeometry::new(
                vec![Vertex3D::default(); 3],
                vec![0, 1, 2],
            ))
        }
    }

    fn entry(name: &str, location: Vector3<f32>, model: &str) -> SceneEntry {
        SceneEntry {
            name: name.to_string(),
            location,
            rotation_degrees: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            model_path: PathBuf::from(model),
        }
    }

    fn default_entries() -> Vec<SceneEntry> {
        vec![
            entry("skybox", Vector3::new(0.0, 0.0, 0.0), "skybox.obj"),
            entry("House_01", Vector3::new(5.0, 0.0, 5.0), "house.obj"),
            entry("House_02", Vector3::new(-5.0, 0.0, 5.0), "house.obj"),
            entry("Water", Vector3::new(0.0, 0.0, 0.0), "water.obj"),
            entry("muzzle_flash", Vector3::new(0.0, 0.0, 0.0), "quad.obj"),
        ]
    }

    fn load(entries: &[SceneEntry]) -> (Scene, RecordingSink, ManualClock) {
        let clock = ManualClock::new(0.0);
        let mut sink = RecordingSink::new();
        let scene = Scene::load(
            entries,
            &SceneAssets::default(),
            &TriangleLoader { missing: None },
            &mut sink,
            Rc::new(clock.clone()),
        )
        .unwrap();
        (scene, sink, clock)
    }

    #[test]
    fn test_load_builds_full_scene() {
        let (scene, _, _) = load(&default_entries());

        // five listed objects, the box and the actor
        assert_eq!(scene.objects().len(), 7);
        // house.obj shared, plus the procedural box
        assert_eq!(scene.meshes().len(), 5);
        assert_eq!(scene.cameras().len(), 4);
        assert_eq!(scene.actor().unwrap().frame_count(), 7);

        let house = scene.find_object_by_name("House").unwrap();
        assert_eq!(scene.graph().name(house.node), "House_01");
        let entry = scene.meshes().get(house.mesh.unwrap()).unwrap();
        assert_eq!(entry.material, Material::for_role(ObjectRole::House));

        let boxed = scene.find_object_by_name("Box").unwrap();
        assert!(
            (scene.graph().world_location(boxed.node) - Vector3::new(2.75, 0.3, -0.5))
                .magnitude()
                < 1e-6
        );
    }

    #[test]
    fn test_load_attaches_to_actor() {
        let (scene, _, _) = load(&default_entries());
        let actor = scene.actor().unwrap().node;

        let flash = scene.object_by_role(ObjectRole::MuzzleFlash).unwrap();
        assert_eq!(scene.graph().parent(flash.node), Some(actor));
        assert_eq!(scene.graph().parent(scene.cameras()[3].node), Some(actor));
        assert_eq!(scene.graph().parent(scene.cameras()[0].node), None);
    }

    #[test]
    fn test_only_first_camera_is_movable() {
        let (scene, _, _) = load(&default_entries());
        let movable: Vec<bool> = scene.cameras().iter().map(|c| c.movable).collect();
        assert_eq!(movable, vec![true, false, false, false]);
        assert_eq!(scene.active_camera_index(), 0);
    }

    #[test]
    fn test_missing_mesh_aborts_load() {
        let mut sink = RecordingSink::new();
        let result = Scene::load(
            &default_entries(),
            &SceneAssets::default(),
            &TriangleLoader {
                missing: Some(PathBuf::from("water.obj")),
            },
            &mut sink,
            Rc::new(ManualClock::new(0.0)),
        );
        assert!(matches!(result, Err(LoadError::Mesh { .. })));
    }

    #[test]
    fn test_missing_texture_aborts_load() {
        let assets = SceneAssets::default();
        let mut sink = RecordingSink::new();
        sink.fail_on(assets.skybox_faces[2].clone());
        let result = Scene::load(
            &default_entries(),
            &assets,
            &TriangleLoader { missing: None },
            &mut sink,
            Rc::new(ManualClock::new(0.0)),
        );
        assert!(matches!(result, Err(LoadError::Texture { .. })));
    }

    #[test]
    fn test_light_defaults_uploaded_on_load() {
        let (_, sink, _) = load(&default_entries());
        assert_eq!(sink.program_sequence(), vec![LIGHT_PROGRAM]);
        assert_eq!(sink.last_uniform("nOfPointLights"), Some(UniformValue::Int(2)));
    }

    #[test]
    fn test_default_program_sources_exist() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        for (name, vertex, fragment) in SceneAssets::default().programs() {
            for stage in [vertex, fragment] {
                assert!(root.join(&stage).is_file(), "{name}: {}", stage.display());
            }
        }
    }

    #[test]
    fn test_world_bounds_are_inclusive() {
        assert!(within_world(Vector3::new(20.0, 35.0, -20.0)));
        assert!(within_world(Vector3::new(0.0, 0.1, 0.0)));
        assert!(!within_world(Vector3::new(20.01, 1.0, 0.0)));
        assert!(!within_world(Vector3::new(0.0, 0.05, 0.0)));
        assert!(!within_world(Vector3::new(0.0, 1.0, -20.5)));
    }

    #[test]
    fn test_water_transform_starts_at_identity() {
        let m = water_uv_transform(0.0);
        assert!((m - Matrix4::identity()).x.magnitude() < 1e-6);
        assert!((m - Matrix4::identity()).w.magnitude() < 1e-6);

        let later = water_uv_transform(5.0);
        assert_ne!(later, Matrix4::identity());
    }

    #[test]
    fn test_movement_follows_camera_axes() {
        let (mut scene, _, _) = load(&default_entries());
        let camera = scene.cameras()[0].node;
        let start = scene.graph().world_location(camera);

        scene.process_input_action(InputAction::MoveForward, 0.5);
        let moved = scene.graph().world_location(camera);
        assert!((moved - (start + Vector3::new(0.0, 0.0, 2.0))).magnitude() < 1e-5);

        scene.process_input_action(InputAction::MoveRight, 0.25);
        let moved = scene.graph().world_location(camera);
        assert!((moved - (start + Vector3::new(-1.0, 0.0, 2.0))).magnitude() < 1e-5);

        scene.process_input_action(InputAction::Fire, 1.0);
        assert_eq!(scene.graph().world_location(camera), moved);
    }

    #[test]
    fn test_immovable_camera_ignores_movement() {
        let (mut scene, _, _) = load(&default_entries());
        scene.set_active_camera(1);
        let camera = scene.cameras()[1].node;
        let start = scene.graph().world_location(camera);

        scene.process_input_action(InputAction::MoveForward, 0.05);
        scene.process_mouse_movement(Vector2::new(100.0, 100.0), 0.05);
        assert_eq!(scene.graph().world_location(camera), start);
        assert_eq!(scene.cameras()[1].pitch(), 29.4);
    }

    #[test]
    fn test_toggle_camera_movement() {
        let (mut scene, _, _) = load(&default_entries());
        scene.set_active_camera(2);
        scene.toggle_camera_movement();
        assert!(scene.cameras()[2].movable);

        scene.set_active_camera(9);
        assert_eq!(scene.active_camera_index(), 2);
    }

    #[test]
    fn test_movement_blocked_near_actor() {
        let (mut scene, _, _) = load(&default_entries());
        let camera = scene.cameras()[0].node;
        let actor = scene.actor().unwrap().node;
        let actor_location = scene.graph().world_location(actor);

        // Park the camera just behind the actor, looking at it.
        scene
            .graph_mut()
            .set_world_location(camera, actor_location - Vector3::new(0.0, 0.0, 0.8));
        let before = scene.graph().world_location(camera);
        scene.process_input_action(InputAction::MoveForward, 0.1);
        assert_eq!(scene.graph().world_location(camera), before);

        scene.process_input_action(InputAction::MoveBackward, 0.1);
        assert!(scene.graph().world_location(camera).z < before.z);
    }

    #[test]
    fn test_render_tags_pickable_objects() {
        let mut entries = default_entries();
        entries.push(entry("Revolver", Vector3::new(1.0, 0.5, 1.0), "revolver.obj"));
        entries.push(entry("Chest_Top", Vector3::new(2.0, 0.5, 1.0), "chest_top.obj"));
        let (scene, mut sink, _) = load(&entries);

        sink.clear_commands();
        scene.render(&mut sink);

        let tags: Vec<u8> = sink
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::StencilTag(t) => Some(*t),
                _ => None,
            })
            .collect();
        assert_eq!(tags, vec![3, 1, 2]);
        assert_eq!(
            sink.uniform_values("IsWater")
                .iter()
                .filter(|v| **v == UniformValue::Bool(true))
                .count(),
            1
        );
    }
}
