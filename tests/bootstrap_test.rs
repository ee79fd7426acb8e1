mod common;

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use hoop_scene::{
    bootstrap::{EnvironmentState, SceneBootstrapper},
    config::{AssetFailurePolicy, SceneConfig},
    lights::Light,
    physics::ImpostorShape,
    scene::MeshKind,
};
use instant::Duration;

use crate::common::test_utils::{level_glb, MockSource, LEVEL};

fn bootstrapper(source: MockSource, config: SceneConfig) -> SceneBootstrapper {
    SceneBootstrapper::new(config, Arc::new(source)).unwrap()
}

#[test]
fn fresh_scene_is_complete_before_the_level_arrives() {
    let boot = bootstrapper(MockSource::new(), SceneConfig::default());
    let scene = boot.scene();

    assert!(boot.loading().is_visible());
    assert_eq!(boot.loading().times_shown(), 1);
    assert_eq!(*boot.environment_state(), EnvironmentState::Pending);

    assert!(scene.collisions_enabled());
    assert_eq!(scene.physics().body_count(), 2);
    assert_eq!(scene.physics().solver_iterations(), 10);
    assert!(scene.physics().uses_frame_delta());
    assert_eq!(scene.meshes_of(MeshKind::Sphere).count(), 1);
    assert_eq!(scene.meshes_of(MeshKind::Ground).count(), 1);
    assert_eq!(scene.meshes_of(MeshKind::Level).count(), 0);
    assert_eq!(scene.meshes_of(MeshKind::Gizmo).count(), 0);

    let lights = scene.lights();
    assert_eq!(lights.len(), 2);
    assert!(matches!(lights[0], Light::Hemispheric { .. }));
    assert!(matches!(lights[1], Light::Directional { .. }));
    assert_eq!(lights[0].intensity(), 0.7);
    assert_eq!(lights[1].intensity(), 2.0);

    let camera = scene.camera().unwrap();
    assert_eq!(camera.position.x, 13.6);
    assert_eq!(camera.position.y, 1.0);
    assert_eq!(camera.position.z, -5.0);
    assert!(!camera.apply_gravity);
    assert!(camera.check_collisions);
}

#[test]
fn both_gravity_vectors_derive_from_one_constant() {
    let boot = bootstrapper(MockSource::new(), SceneConfig::default());
    let scene = boot.scene();
    let physics = scene.physics().gravity();
    let sweep = scene.sweep_gravity();

    assert_abs_diff_eq!(physics.x, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(physics.y, -9.81, epsilon = 1e-6);
    assert_abs_diff_eq!(physics.z, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(sweep.y, -9.81 / 60.0, epsilon = 1e-6);
    assert_abs_diff_eq!(sweep.y * 60.0, physics.y, epsilon = 1e-5);
}

#[test]
fn ball_and_ground_impostors() {
    let boot = bootstrapper(MockSource::new(), SceneConfig::default());
    let scene = boot.scene();

    let ball = scene.mesh(boot.ball()).unwrap();
    assert_eq!(ball.name, "sphere1");
    assert_eq!(ball.transform.position, cgmath::Vector3::new(13.6, 6.0, 0.0));
    let impostor = ball.impostor().unwrap();
    assert_eq!(impostor.mass, 0.5);
    assert_eq!(impostor.restitution, 0.8);
    assert_eq!(impostor.shape, ImpostorShape::Sphere { radius: 0.12 });
    let handle = ball.impostor_handle().unwrap();
    assert_eq!(scene.physics().collider_restitution(handle), Some(0.8));
    assert_abs_diff_eq!(scene.physics().collider_mass(handle).unwrap(), 0.5, epsilon = 1e-6);

    let ground = scene.mesh(boot.ground()).unwrap();
    assert_eq!(ground.name, "ground");
    assert!(!ground.visible);
    let impostor = ground.impostor().unwrap();
    assert_eq!(impostor.mass, 0.0);
    assert_eq!(impostor.restitution, 0.5);
    assert_eq!(scene.physics().is_fixed(ground.impostor_handle().unwrap()), Some(true));
}

#[test]
fn light_gizmos_can_be_switched_on() {
    let mut config = SceneConfig::default();
    config.debug.light_gizmos = true;
    let boot = bootstrapper(MockSource::new(), config);
    assert_eq!(boot.gizmo().unwrap().markers().len(), 2);
    assert_eq!(boot.scene().meshes_of(MeshKind::Gizmo).count(), 2);
}

#[tokio::test]
async fn imported_surfaces_are_all_collidable() {
    let source = MockSource::new().with_file(LEVEL, level_glb(3));
    let mut boot = bootstrapper(source, SceneConfig::default());

    let result = boot.environment_task().await;
    boot.on_environment(result).unwrap();

    let level: Vec<_> = boot.scene().meshes_of(MeshKind::Level).collect();
    assert_eq!(level.len(), 3);
    assert!(level.iter().all(|(_, mesh)| mesh.is_collidable()));
    assert!(matches!(boot.environment_state(), EnvironmentState::Loaded(ids) if ids.len() == 3));

    assert!(!boot.loading().is_visible());
    assert_eq!(boot.loading().times_shown(), 1);
    assert_eq!(boot.loading().times_hidden(), 1);
}

#[tokio::test]
async fn failing_level_keeps_frames_coming() {
    let mut boot = bootstrapper(MockSource::new(), SceneConfig::default());

    let result = boot.environment_task().await;
    assert!(result.is_err());
    boot.on_environment(result).unwrap();

    for _ in 0..10 {
        boot.advance(Duration::from_secs_f32(1.0 / 60.0));
    }
    assert_eq!(boot.scene().frames(), 10);
    assert!(matches!(boot.environment_state(), EnvironmentState::Failed(_)));
    assert_eq!(boot.scene().meshes_of(MeshKind::Level).count(), 0);
    assert!(!boot.loading().is_visible());
    assert_eq!(boot.loading().times_hidden(), 1);

    let ball = boot.scene().mesh(boot.ball()).unwrap();
    assert!(ball.transform.position.y < 6.0);
}

#[tokio::test]
async fn retry_policy_fetches_again() {
    let source = Arc::new(MockSource::new().with_file(LEVEL, level_glb(1)).failing_first(2));
    let mut config = SceneConfig::default();
    config.assets.on_failure = AssetFailurePolicy::Retry { attempts: 2 };
    let mut boot = SceneBootstrapper::new(config, source.clone()).unwrap();

    let result = boot.environment_task().await;
    boot.on_environment(result).unwrap();

    assert_eq!(source.calls(), 3);
    assert_eq!(boot.scene().meshes_of(MeshKind::Level).count(), 1);
}

#[tokio::test]
async fn fatal_policy_stops_the_scene() {
    let mut config = SceneConfig::default();
    config.assets.on_failure = AssetFailurePolicy::Fatal;
    let mut boot = bootstrapper(MockSource::new(), config);

    let result = boot.environment_task().await;
    assert!(boot.on_environment(result).is_err());
    assert!(!boot.loading().is_visible());
}
