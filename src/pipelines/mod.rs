//! Render pipelines.
//!
//! - `basic` draws lit, textured, instanced meshes
//! - `light` holds the light uniform the basic pipeline shades with

pub mod basic;
pub mod light;

#[derive(Debug)]
pub struct Pipelines {
    pub basic: wgpu::RenderPipeline,
}
