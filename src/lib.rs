//! hoop-scene
//!
//! A small interactive basketball court for native and WASM targets: a static glTF
//! level the camera collides with, a bouncing physics ball and a first-person free
//! camera with pointer lock.
//!
//! High-level modules
//! - `bootstrap`: the setup sequence that builds a [`scene::Scene`]
//! - `scene`: the explicitly owned scene with its meshes, lights, camera and physics
//! - `camera`: the free camera, its controller state and GPU uniforms
//! - `collision`: ellipsoid sweeps of the camera against collidable meshes
//! - `physics`: the rigid-body world and impostors
//! - `lights`: hemispheric and directional lights, light gizmos
//! - `input`: pointer lock handling
//! - `loading`: the loading indicator
//! - `resources`: asset sources, the level importer and procedural meshes
//! - `config`: `scene.toml` settings
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: GPU meshes, materials, textures and instances
//! - `pipelines`: the scene render pipeline and light uniforms
//! - `render`: render composition for the event loop
//! - `flow`: the event loop and the flow abstraction
//! - `court`: the flow that puts the scene on screen
//!

pub mod bootstrap;
pub mod camera;
pub mod collision;
pub mod config;
pub mod context;
pub mod court;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod input;
pub mod lights;
pub mod loading;
pub mod physics;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

use std::sync::Arc;

use crate::{config::SceneConfig, court::CourtFlow, resources::FileAssetSource};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Run the court with `config` until the window closes.
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    let source = Arc::new(FileAssetSource::new(config.assets.root.clone()));
    let engine = config.engine.clone();
    flow::run(engine, vec![CourtFlow::constructor(config, source)])
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    run(SceneConfig::default()).map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{:#}", e)))
}
