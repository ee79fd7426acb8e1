//! Scene setup sequence.
//!
//! [`SceneBootstrapper::new`] runs every synchronous step in order: it shows the
//! loading indicator, builds the world with its lights, camera and physics bodies. The
//! level import is the one asynchronous step. The caller runs
//! [`SceneBootstrapper::environment_task`] in the background and hands the outcome to
//! [`SceneBootstrapper::on_environment`], while frames keep being advanced.

use std::sync::Arc;

use instant::Duration;
use winit::keyboard::KeyCode;

use crate::{
    camera::create_controller,
    config::{AssetFailurePolicy, BallConfig, GroundConfig, SceneConfig},
    error::{AssetError, StartupError},
    flow::BoxedFuture,
    input::{PointerAction, PointerLock, PointerLockHandler},
    lights::{create_lights, DebugOverlay, LightGizmo},
    loading::LoadingIndicator,
    physics::Impostor,
    resources::{
        level::{Environment, SurfaceMaterial},
        load_environment, mesh,
        texture::load_image,
        AssetSource,
    },
    scene::{MeshId, MeshKind, Scene, SceneMesh},
};

/// Half thickness of the ground's physics box. Its top face is flush with the plane.
const GROUND_HALF_THICKNESS: f32 = 0.05;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentState {
    Pending,
    Loaded(Vec<MeshId>),
    Failed(String),
}

pub struct SceneBootstrapper {
    config: SceneConfig,
    source: Arc<dyn AssetSource>,
    scene: Scene,
    loading: LoadingIndicator,
    pointer: PointerLockHandler,
    gizmo: Option<LightGizmo>,
    ball: MeshId,
    ground: MeshId,
    environment: EnvironmentState,
}

impl std::fmt::Debug for SceneBootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneBootstrapper")
            .field("scene", &self.scene)
            .field("loading", &self.loading)
            .field("environment", &self.environment)
            .finish()
    }
}

impl SceneBootstrapper {
    pub fn new(config: SceneConfig, source: Arc<dyn AssetSource>) -> Result<Self, StartupError> {
        let mut loading = LoadingIndicator::default();
        loading.show();

        let mut scene = Scene::new(config.gravity, &config.physics)?;
        scene.set_collisions_enabled(true);

        let mut gizmo = LightGizmo::from_config(&config.debug);
        create_lights(
            &mut scene,
            &config.lights,
            gizmo.as_mut().map(|g| g as &mut dyn DebugOverlay),
        );

        scene.attach_camera(create_controller(&config.camera));

        let (ball, ground) = create_impostors(
            &mut scene,
            &config.ball,
            &config.ground,
            &config.assets.ball_texture,
            &config.assets.court_texture,
        );
        log::info!(
            "Scene ready: {} lights, {} meshes, waiting for {}",
            scene.lights().len(),
            scene.meshes().len(),
            config.assets.level
        );

        Ok(Self {
            config,
            source,
            scene,
            loading,
            pointer: PointerLockHandler::new(),
            gizmo,
            ball,
            ground,
            environment: EnvironmentState::Pending,
        })
    }

    /// The level import, to be polled off the frame loop.
    pub fn environment_task(&self) -> BoxedFuture<Result<Environment, AssetError>> {
        Box::pin(load_environment(
            self.source.clone(),
            self.config.assets.level.clone(),
            self.config.assets.on_failure,
        ))
    }

    /// Fetch and decode the image of every material that names one.
    pub fn texture_tasks(&self) -> Vec<(MeshId, BoxedFuture<Result<image::RgbaImage, AssetError>>)> {
        self.scene
            .iter_meshes()
            .filter_map(|(id, m)| {
                let path = m.material.texture_path.clone()?;
                let source = self.source.clone();
                let task: BoxedFuture<Result<image::RgbaImage, AssetError>> =
                    Box::pin(async move { load_image(source.as_ref(), &path).await });
                Some((id, task))
            })
            .collect()
    }

    /// Apply the outcome of [`Self::environment_task`].
    ///
    /// The loading indicator is hidden on success and on failure. Only a failure under
    /// the `fatal` policy is returned as an error.
    pub fn on_environment(&mut self, result: Result<Environment, AssetError>) -> Result<(), StartupError> {
        if self.environment != EnvironmentState::Pending {
            log::warn!("Ignoring a second level import result");
            return Ok(());
        }
        let outcome = match result {
            Ok(environment) => {
                let path = environment.path.clone();
                let ids = self.scene.import_surfaces(environment);
                log::info!("Imported {} surfaces from {}", ids.len(), path);
                self.environment = EnvironmentState::Loaded(ids);
                Ok(())
            }
            Err(e) => {
                self.environment = EnvironmentState::Failed(e.to_string());
                match self.config.assets.on_failure {
                    AssetFailurePolicy::Fatal => {
                        log::error!("Level import failed: {}", e);
                        Err(StartupError::Asset(e))
                    }
                    AssetFailurePolicy::EmptyLevel | AssetFailurePolicy::Retry { .. } => {
                        log::warn!("Level import failed, continuing without level geometry: {}", e);
                        Ok(())
                    }
                }
            }
        };
        self.loading.hide();
        outcome
    }

    /// Apply a decoded material image. Returns false when the mesh is unknown.
    pub fn on_texture(&mut self, mesh: MeshId, result: Result<image::RgbaImage, AssetError>) -> bool {
        let Some(target) = self.scene.mesh_mut(mesh) else {
            return false;
        };
        match result {
            Ok(image) => {
                target.material.texture = Some(Arc::new(image));
                target.material.texture_path = None;
                true
            }
            Err(e) => {
                log::warn!("{} stays untextured: {}", target.name, e);
                target.material.texture_path = None;
                false
            }
        }
    }

    pub fn on_pointer_down(&mut self, button: u16, lock: &mut dyn PointerLock) -> PointerAction {
        self.pointer.on_pointer_down(button, lock)
    }

    pub fn on_pointer_up(&mut self, button: u16) {
        self.pointer.on_pointer_up(button);
    }

    /// Rotate the camera by a pointer delta if the pointer is locked or dragging.
    pub fn on_pointer_motion(&mut self, dx: f64, dy: f64, lock: &dyn PointerLock) -> bool {
        if !self.pointer.should_rotate(lock) {
            return false;
        }
        match self.scene.camera_mut() {
            Some(camera) => {
                camera.process_pointer_delta(dx, dy);
                true
            }
            None => false,
        }
    }

    /// Drop held keys and buttons and release the pointer when the window loses focus.
    pub fn on_focus_lost(&mut self, lock: &mut dyn PointerLock) {
        self.pointer.on_focus_lost(lock);
        if let Some(camera) = self.scene.camera_mut() {
            camera.release_keys();
        }
    }

    pub fn on_key(&mut self, key: KeyCode, pressed: bool) -> bool {
        self.scene
            .camera_mut()
            .is_some_and(|camera| camera.process_keyboard(key, pressed))
    }

    pub fn advance(&mut self, dt: Duration) {
        self.scene.advance(dt);
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn loading(&self) -> &LoadingIndicator {
        &self.loading
    }

    pub fn loading_mut(&mut self) -> &mut LoadingIndicator {
        &mut self.loading
    }

    pub fn environment_state(&self) -> &EnvironmentState {
        &self.environment
    }

    pub fn ball(&self) -> MeshId {
        self.ball
    }

    pub fn ground(&self) -> MeshId {
        self.ground
    }

    pub fn gizmo(&self) -> Option<&LightGizmo> {
        self.gizmo.as_ref()
    }
}

/// The ball's material: its diffuse map, fetched later.
pub fn create_ball_material(texture: &str) -> SurfaceMaterial {
    SurfaceMaterial {
        name: "BallMat".to_string(),
        base_color: [1.0; 4],
        texture: None,
        texture_path: Some(texture.to_string()),
    }
}

/// The court floor material, used only when the ground is made visible.
pub fn create_ground_material(texture: &str) -> SurfaceMaterial {
    SurfaceMaterial {
        name: "GroundMat".to_string(),
        base_color: [1.0; 4],
        texture: None,
        texture_path: Some(texture.to_string()),
    }
}

/// Add the ball and the ground with their rigid bodies.
pub fn create_impostors(
    scene: &mut Scene,
    ball: &BallConfig,
    ground: &GroundConfig,
    ball_texture: &str,
    court_texture: &str,
) -> (MeshId, MeshId) {
    let mut sphere = SceneMesh::new(
        "sphere1",
        MeshKind::Sphere,
        mesh::sphere(ball.diameter, ball.segments),
        create_ball_material(ball_texture),
    );
    sphere.transform.position = cgmath::Vector3::from(ball.position);
    let sphere = scene.add_mesh(sphere);
    scene.set_impostor(
        sphere,
        Impostor::sphere(ball.diameter / 2.0, ball.mass, ball.restitution),
    );

    let mut plane = SceneMesh::new(
        "ground",
        MeshKind::Ground,
        mesh::ground(ground.width, ground.height),
        if ground.visible {
            create_ground_material(court_texture)
        } else {
            SurfaceMaterial {
                name: "ground".to_string(),
                base_color: [1.0; 4],
                ..SurfaceMaterial::default()
            }
        },
    );
    plane.visible = ground.visible;
    let plane = scene.add_mesh(plane);
    scene.set_impostor(
        plane,
        Impostor::cuboid(
            cgmath::Vector3::new(ground.width / 2.0, GROUND_HALF_THICKNESS, ground.height / 2.0),
            ground.mass,
            ground.restitution,
        )
        .with_offset(cgmath::Vector3::new(0.0, -GROUND_HALF_THICKNESS, 0.0)),
    );

    (sphere, plane)
}
