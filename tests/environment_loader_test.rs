mod common;

use std::sync::Arc;

use hoop_scene::{
    config::AssetFailurePolicy,
    error::AssetError,
    resources::{load_environment, AssetSource},
};

use crate::common::test_utils::{level_glb, MockSource, LEVEL};

async fn load(source: MockSource, policy: AssetFailurePolicy) -> (Result<hoop_scene::resources::level::Environment, AssetError>, u32) {
    let source = Arc::new(source);
    let dyn_source: Arc<dyn AssetSource> = source.clone();
    let result = load_environment(dyn_source, LEVEL.to_string(), policy).await;
    (result, source.calls())
}

#[tokio::test]
async fn every_node_becomes_a_surface() {
    let (result, calls) = load(MockSource::new().with_file(LEVEL, level_glb(4)), AssetFailurePolicy::EmptyLevel).await;
    let environment = result.unwrap();

    assert_eq!(calls, 1);
    assert_eq!(environment.path, LEVEL);
    assert_eq!(environment.surfaces.len(), 4);
    assert_eq!(environment.triangle_count(), 8);
    let names: Vec<&str> = environment.surfaces.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["surface0", "surface1", "surface2", "surface3"]);
}

#[tokio::test]
async fn node_translation_is_baked_and_mirrored() {
    let (result, _) = load(MockSource::new().with_file(LEVEL, level_glb(2)), AssetFailurePolicy::EmptyLevel).await;
    let environment = result.unwrap();

    let second = &environment.surfaces[1];
    let (min_x, max_x) = second
        .mesh
        .vertices
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.position[0]), hi.max(v.position[0])));
    assert_eq!((min_x, max_x), (-3.0, -1.0));
    for vertex in &second.mesh.vertices {
        assert_eq!(vertex.position[1], 0.0);
        // computed normals of a floor point straight up or down
        assert!((vertex.normal[1].abs() - 1.0).abs() < 1e-6, "{:?}", vertex.normal);
    }
}

#[tokio::test]
async fn missing_level_is_an_io_error_naming_the_path() {
    let (result, calls) = load(MockSource::new(), AssetFailurePolicy::EmptyLevel).await;
    let err = result.unwrap_err();
    assert!(matches!(err, AssetError::Io { .. }));
    assert_eq!(err.path(), LEVEL);
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn corrupt_level_is_a_parse_error() {
    let (result, _) = load(
        MockSource::new().with_file(LEVEL, b"glTF but not really".to_vec()),
        AssetFailurePolicy::EmptyLevel,
    )
    .await;
    assert!(matches!(result, Err(AssetError::Gltf { .. })));
}

#[tokio::test]
async fn retries_stop_after_the_configured_attempts() {
    let (result, calls) = load(
        MockSource::new().with_file(LEVEL, level_glb(1)).failing_first(5),
        AssetFailurePolicy::Retry { attempts: 1 },
    )
    .await;
    assert!(result.is_err());
    assert_eq!(calls, 2);
}
