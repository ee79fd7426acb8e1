//! Scene lights and the optional light gizmo overlay.

use cgmath::{InnerSpace, Vector3};

use crate::{
    config::{DebugConfig, LightsConfig},
    data_structures::instance::Instance,
    resources::{level::SurfaceMaterial, mesh},
    scene::{LightId, MeshId, MeshKind, Scene, SceneMesh},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    /// Ambient light blending from `ground` to `sky` depending on how much a surface
    /// faces `direction`.
    Hemispheric {
        name: String,
        direction: Vector3<f32>,
        intensity: f32,
        sky: [f32; 3],
        ground: [f32; 3],
    },
    Directional {
        name: String,
        direction: Vector3<f32>,
        intensity: f32,
        colour: [f32; 3],
    },
}

impl Light {
    pub fn hemispheric(name: &str, direction: Vector3<f32>, intensity: f32) -> Self {
        Light::Hemispheric {
            name: name.to_string(),
            direction: normalized(direction),
            intensity,
            sky: [1.0, 1.0, 1.0],
            ground: [0.0, 0.0, 0.0],
        }
    }

    pub fn directional(name: &str, direction: Vector3<f32>, intensity: f32) -> Self {
        Light::Directional {
            name: name.to_string(),
            direction: normalized(direction),
            intensity,
            colour: [1.0, 1.0, 1.0],
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Light::Hemispheric { name, .. } | Light::Directional { name, .. } => name,
        }
    }

    pub fn direction(&self) -> Vector3<f32> {
        match self {
            Light::Hemispheric { direction, .. } | Light::Directional { direction, .. } => *direction,
        }
    }

    pub fn intensity(&self) -> f32 {
        match self {
            Light::Hemispheric { intensity, .. } | Light::Directional { intensity, .. } => *intensity,
        }
    }
}

fn normalized(v: Vector3<f32>) -> Vector3<f32> {
    if v.magnitude2() > f32::EPSILON {
        v.normalize()
    } else {
        Vector3::new(0.0, -1.0, 0.0)
    }
}

/// Debug visualisation that can be attached to lights.
pub trait DebugOverlay {
    fn attach(&mut self, scene: &mut Scene, light: LightId);
}

/// Marks each attached light with a small cube, placed one unit against the light's
/// direction from the origin.
#[derive(Debug, Clone)]
pub struct LightGizmo {
    pub scale_ratio: f32,
    markers: Vec<MeshId>,
}

impl LightGizmo {
    const BASE_SIZE: f32 = 0.1;

    pub fn new(scale_ratio: f32) -> Self {
        Self {
            scale_ratio,
            markers: Vec::new(),
        }
    }

    /// The gizmo configured by `debug`, if any.
    pub fn from_config(debug: &DebugConfig) -> Option<Self> {
        debug.light_gizmos.then(|| Self::new(debug.gizmo_scale_ratio))
    }

    pub fn markers(&self) -> &[MeshId] {
        &self.markers
    }
}

impl DebugOverlay for LightGizmo {
    fn attach(&mut self, scene: &mut Scene, light: LightId) {
        let Some(light) = scene.light(light) else {
            log::warn!("Light gizmo attached to an unknown light");
            return;
        };
        let name = format!("{} gizmo", light.name());
        let mut marker = SceneMesh::new(
            &name,
            MeshKind::Gizmo,
            mesh::cube(Self::BASE_SIZE * self.scale_ratio),
            SurfaceMaterial {
                name: "gizmo".to_string(),
                base_color: [1.0, 0.85, 0.2, 1.0],
                texture: None,
                texture_path: None,
            },
        );
        marker.transform = Instance::from(-light.direction());
        self.markers.push(scene.add_mesh(marker));
    }
}

/// Add the hemispheric and the directional light, passing each to `overlay`.
pub fn create_lights(
    scene: &mut Scene,
    config: &LightsConfig,
    overlay: Option<&mut dyn DebugOverlay>,
) -> [LightId; 2] {
    let hemispheric = scene.add_light(Light::hemispheric(
        "light",
        Vector3::from(config.hemispheric_direction),
        config.hemispheric_intensity,
    ));
    let directional = scene.add_light(Light::directional(
        "light",
        Vector3::from(config.directional_direction),
        config.directional_intensity,
    ));
    if let Some(overlay) = overlay {
        overlay.attach(scene, hemispheric);
        overlay.attach(scene, directional);
    }
    [hemispheric, directional]
}
