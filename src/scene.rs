//! The scene: an explicitly owned container for everything the court consists of.
//!
//! A [`Scene`] owns exactly one physics world, the world gravity, the lights, the
//! camera and the meshes. Meshes are only ever appended; ids stay valid for the whole
//! run.

use instant::Duration;

use crate::{
    camera::FreeCamera,
    collision::CollisionMesh,
    config::{PhysicsConfig, WorldGravity},
    data_structures::instance::Instance,
    error::StartupError,
    lights::Light,
    physics::{Impostor, ImpostorHandle, PhysicsWorld},
    resources::{
        level::{Environment, SurfaceMaterial},
        mesh::MeshData,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(usize);

impl MeshId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKind {
    Sphere,
    Ground,
    Level,
    Gizmo,
}

#[derive(Debug, Clone)]
pub struct SceneMesh {
    pub name: String,
    pub kind: MeshKind,
    pub mesh: MeshData,
    pub material: SurfaceMaterial,
    pub transform: Instance,
    pub visible: bool,
    collision: Option<CollisionMesh>,
    body: Option<(ImpostorHandle, Impostor)>,
}

impl SceneMesh {
    pub fn new(name: &str, kind: MeshKind, mesh: MeshData, material: SurfaceMaterial) -> Self {
        Self {
            name: name.to_string(),
            kind,
            mesh,
            material,
            transform: Instance::default(),
            visible: true,
            collision: None,
            body: None,
        }
    }

    /// Opt the mesh in or out of camera collisions. The current transform is baked in,
    /// so collidable meshes are expected to stay put.
    pub fn set_collidable(&mut self, collidable: bool) {
        self.collision = collidable.then(|| CollisionMesh::new(&self.mesh, &self.transform));
    }

    pub fn is_collidable(&self) -> bool {
        self.collision.is_some()
    }

    pub fn collision_mesh(&self) -> Option<&CollisionMesh> {
        self.collision.as_ref()
    }

    pub fn impostor(&self) -> Option<&Impostor> {
        self.body.as_ref().map(|(_, impostor)| impostor)
    }

    pub fn impostor_handle(&self) -> Option<ImpostorHandle> {
        self.body.as_ref().map(|(handle, _)| *handle)
    }
}

#[derive(Debug)]
pub struct Scene {
    physics: PhysicsWorld,
    gravity: WorldGravity,
    collisions_enabled: bool,
    lights: Vec<Light>,
    camera: Option<FreeCamera>,
    meshes: Vec<SceneMesh>,
    frames: u64,
}

impl Scene {
    pub fn new(gravity: WorldGravity, physics: &PhysicsConfig) -> Result<Self, StartupError> {
        Ok(Self {
            physics: PhysicsWorld::new(&gravity, physics)?,
            gravity,
            collisions_enabled: true,
            lights: Vec::new(),
            camera: None,
            meshes: Vec::new(),
            frames: 0,
        })
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn gravity(&self) -> WorldGravity {
        self.gravity
    }

    /// Gravity the camera sweep applies per frame.
    pub fn sweep_gravity(&self) -> cgmath::Vector3<f32> {
        self.gravity.per_frame_vector()
    }

    pub fn collisions_enabled(&self) -> bool {
        self.collisions_enabled
    }

    pub fn set_collisions_enabled(&mut self, enabled: bool) {
        self.collisions_enabled = enabled;
    }

    pub fn add_light(&mut self, light: Light) -> LightId {
        self.lights.push(light);
        LightId(self.lights.len() - 1)
    }

    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id.0)
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Install the scene camera. A scene has one camera; later calls are ignored.
    pub fn attach_camera(&mut self, camera: FreeCamera) -> bool {
        if self.camera.is_some() {
            log::warn!("Scene already has a camera, ignoring another one");
            return false;
        }
        self.camera = Some(camera);
        true
    }

    pub fn camera(&self) -> Option<&FreeCamera> {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> Option<&mut FreeCamera> {
        self.camera.as_mut()
    }

    pub fn add_mesh(&mut self, mesh: SceneMesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&SceneMesh> {
        self.meshes.get(id.0)
    }

    pub fn mesh_mut(&mut self, id: MeshId) -> Option<&mut SceneMesh> {
        self.meshes.get_mut(id.0)
    }

    pub fn meshes(&self) -> &[SceneMesh] {
        &self.meshes
    }

    pub fn iter_meshes(&self) -> impl Iterator<Item = (MeshId, &SceneMesh)> {
        self.meshes.iter().enumerate().map(|(i, m)| (MeshId(i), m))
    }

    pub fn meshes_of(&self, kind: MeshKind) -> impl Iterator<Item = (MeshId, &SceneMesh)> {
        self.iter_meshes().filter(move |(_, m)| m.kind == kind)
    }

    pub fn find_mesh(&self, name: &str) -> Option<(MeshId, &SceneMesh)> {
        self.iter_meshes().find(|(_, m)| m.name == name)
    }

    /// Give a mesh a rigid body. A mesh keeps its first impostor.
    pub fn set_impostor(&mut self, id: MeshId, impostor: Impostor) -> Option<ImpostorHandle> {
        let mesh = self.meshes.get_mut(id.0)?;
        if let Some((handle, _)) = mesh.body {
            log::warn!("{} already has an impostor", mesh.name);
            return Some(handle);
        }
        let handle = self.physics.add_body(&impostor, mesh.transform.position);
        mesh.body = Some((handle, impostor));
        Some(handle)
    }

    /// Add every surface of `environment` as a collidable level mesh.
    pub fn import_surfaces(&mut self, environment: Environment) -> Vec<MeshId> {
        environment
            .surfaces
            .into_iter()
            .map(|surface| {
                let mut mesh = SceneMesh::new(&surface.name, MeshKind::Level, surface.mesh, surface.material);
                mesh.set_collidable(true);
                self.add_mesh(mesh)
            })
            .collect()
    }

    /// Advance one rendered frame: step physics, follow the bodies with their meshes
    /// and move the camera.
    pub fn advance(&mut self, dt: Duration) {
        self.physics.step(dt);
        for mesh in &mut self.meshes {
            let Some((handle, impostor)) = mesh.body else {
                continue;
            };
            if impostor.is_static() {
                continue;
            }
            if let Some(position) = self.physics.body_position(handle) {
                mesh.transform.position = position;
            }
            if let Some(rotation) = self.physics.body_rotation(handle) {
                mesh.transform.rotation = rotation;
            }
        }

        if let Some(camera) = self.camera.as_mut() {
            let gravity = self.gravity.per_frame_vector();
            let colliders = self.meshes.iter().filter_map(SceneMesh::collision_mesh);
            camera.update(dt, gravity, self.collisions_enabled, colliders);
        }
        self.frames += 1;
    }

    /// Frames advanced so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{camera::create_controller, config::CameraConfig, resources::mesh};

    fn scene() -> Scene {
        Scene::new(WorldGravity::default(), &PhysicsConfig::default()).unwrap()
    }

    fn plain(name: &str, kind: MeshKind, data: MeshData) -> SceneMesh {
        SceneMesh::new(name, kind, data, SurfaceMaterial::default())
    }

    #[test]
    fn new_scene_is_empty_with_collisions_on() {
        let scene = scene();
        assert!(scene.collisions_enabled());
        assert!(scene.camera().is_none());
        assert!(scene.meshes().is_empty());
        assert_eq!(scene.physics().body_count(), 0);
        assert_eq!(scene.sweep_gravity().y, -9.81 / 60.0);
    }

    #[test]
    fn second_camera_is_rejected() {
        let mut scene = scene();
        assert!(scene.attach_camera(create_controller(&CameraConfig::default())));
        assert!(!scene.attach_camera(create_controller(&CameraConfig::default())));
    }

    #[test]
    fn dynamic_meshes_follow_their_bodies() {
        let mut scene = scene();
        let mut ball = plain("ball", MeshKind::Sphere, mesh::sphere(0.24, 8));
        ball.transform.position = cgmath::Vector3::new(0.0, 5.0, 0.0);
        let ball = scene.add_mesh(ball);
        scene.set_impostor(ball, Impostor::sphere(0.12, 0.5, 0.8));

        for _ in 0..10 {
            scene.advance(Duration::from_millis(16));
        }
        assert!(scene.mesh(ball).unwrap().transform.position.y < 5.0);
        assert_eq!(scene.frames(), 10);
    }

    #[test]
    fn second_impostor_keeps_the_first() {
        let mut scene = scene();
        let id = scene.add_mesh(plain("ball", MeshKind::Sphere, mesh::sphere(0.24, 8)));
        let first = scene.set_impostor(id, Impostor::sphere(0.12, 0.5, 0.8));
        let second = scene.set_impostor(id, Impostor::sphere(0.12, 1.0, 0.1));
        assert_eq!(first, second);
        assert_eq!(scene.mesh(id).unwrap().impostor().unwrap().mass, 0.5);
        assert_eq!(scene.physics().body_count(), 1);
    }

    #[test]
    fn stalled_frames_do_not_carry_the_camera_through_a_wall() {
        let mut scene = scene();
        let mut wall = plain("wall", MeshKind::Level, mesh::ground(40.0, 40.0));
        wall.transform.position = cgmath::Vector3::new(13.6, 1.0, -4.0);
        wall.transform.rotation = cgmath::Quaternion::from(cgmath::Euler::new(
            cgmath::Deg(90.0),
            cgmath::Deg(0.0),
            cgmath::Deg(0.0),
        ));
        wall.set_collidable(true);
        scene.add_mesh(wall);
        scene.attach_camera(create_controller(&CameraConfig::default()));
        scene.camera_mut().unwrap().process_keyboard(winit::keyboard::KeyCode::KeyW, true);

        for _ in 0..3 {
            scene.advance(Duration::from_secs(10));
        }
        let z = scene.camera().unwrap().position.z;
        // ellipsoid radius short of the wall
        assert!((z - (-4.1)).abs() < 1e-2, "{}", z);
    }

    #[test]
    fn collidable_meshes_block_the_camera() {
        let mut scene = scene();
        let mut floor = plain("floor", MeshKind::Level, mesh::ground(40.0, 40.0));
        floor.set_collidable(true);
        scene.add_mesh(floor);
        let mut config = CameraConfig::default();
        config.apply_gravity = true;
        scene.attach_camera(create_controller(&config));

        for _ in 0..120 {
            scene.advance(Duration::from_secs_f32(1.0 / 60.0));
        }
        let camera = scene.camera().unwrap();
        // eye rests one vertical radius above the ellipsoid centre, which rests on the floor
        assert!((camera.position.y - 0.2).abs() < 1e-2, "{:?}", camera.position);
    }
}
