//! The court as a [`GraphicsFlow`]: mirrors the headless scene onto the GPU.

use std::sync::Arc;

use futures::FutureExt;
use instant::Duration;
use wgpu::util::DeviceExt;
use winit::{
    event::{DeviceEvent, WindowEvent},
    keyboard::PhysicalKey,
};

use crate::{
    bootstrap::SceneBootstrapper,
    camera::{CameraUniform, Projection},
    config::SceneConfig,
    context::{Context, InitContext},
    data_structures::{
        instance::Instance,
        model::{Material, Mesh, Model},
        texture::Texture,
    },
    error::AssetError,
    flow::{BoxedFuture, FlowConstructor, GraphicsFlow, Out},
    input::{button_index, PointerAction, WindowPointerLock},
    render::{Instanced, Render},
    resources::{level::Environment, AssetSource},
    scene::{MeshId, SceneMesh},
};

/// Results of the background tasks the court starts.
#[derive(Debug)]
pub enum CourtEvent {
    Environment(Result<Environment, AssetError>),
    Texture {
        mesh: MeshId,
        result: Result<image::RgbaImage, AssetError>,
    },
}

struct GpuMesh {
    model: Model,
    instance_buffer: wgpu::Buffer,
    transform: Instance,
}

pub struct CourtFlow {
    boot: SceneBootstrapper,
    pointer_lock: Option<WindowPointerLock>,
    // Indexed like the scene's meshes; `None` for meshes that are never drawn.
    gpu: Vec<Option<GpuMesh>>,
    camera_uniform: CameraUniform,
    frames_at_last_tick: u64,
}

impl CourtFlow {
    pub fn new(boot: SceneBootstrapper, init: &InitContext) -> Self {
        let mut flow = Self {
            boot,
            pointer_lock: None,
            gpu: Vec::new(),
            camera_uniform: CameraUniform::new(),
            frames_at_last_tick: 0,
        };
        flow.sync_meshes(&init.device, &init.queue);
        flow
    }

    /// Flow constructor for [`crate::flow::run`].
    pub fn constructor(config: SceneConfig, source: Arc<dyn AssetSource>) -> FlowConstructor<(), CourtEvent> {
        Box::new(move |init: InitContext| {
            Box::pin(async move {
                let boot = SceneBootstrapper::new(config, source)?;
                let flow: Box<dyn GraphicsFlow<(), CourtEvent>> = Box::new(CourtFlow::new(boot, &init));
                Ok(flow)
            })
        })
    }

    pub fn bootstrapper(&self) -> &SceneBootstrapper {
        &self.boot
    }

    /// Upload every scene mesh added since the last call.
    fn sync_meshes(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let start = self.gpu.len();
        for (_, mesh) in self.boot.scene().iter_meshes().skip(start) {
            let uploaded = (mesh.visible && !mesh.mesh.indices.is_empty())
                .then(|| upload_mesh(device, queue, mesh));
            self.gpu.push(uploaded);
        }
        if self.gpu.len() > start {
            log::debug!("Uploaded {} meshes", self.gpu.len() - start);
        }
    }

    fn replace_material(&mut self, ctx: &Context, id: MeshId) {
        let (Some(Some(gpu)), Some(mesh)) = (self.gpu.get_mut(id.index()), self.boot.scene().mesh(id)) else {
            return;
        };
        gpu.model.materials = vec![upload_material(&ctx.device, &ctx.queue, mesh)];
    }

    fn refresh_title(&mut self, ctx: &Context) {
        if self.boot.loading_mut().take_changed() {
            ctx.set_title(&self.boot.loading().decorate_title(&ctx.title));
        }
    }
}

fn upload_material(device: &wgpu::Device, queue: &wgpu::Queue, mesh: &SceneMesh) -> Material {
    let material = &mesh.material;
    let texture = match &material.texture {
        Some(image) => Texture::from_rgba(device, queue, image, Some(&material.name)),
        None => Texture::solid_colour(device, queue, material.base_color, &material.name),
    };
    Material::new(device, &material.name, texture)
}

fn upload_mesh(device: &wgpu::Device, queue: &wgpu::Queue, mesh: &SceneMesh) -> GpuMesh {
    let model = Model {
        meshes: vec![Mesh::from_data(device, &mesh.name, &mesh.mesh, 0)],
        materials: vec![upload_material(device, queue, mesh)],
    };
    let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{} Instance Buffer", mesh.name)),
        contents: bytemuck::cast_slice(&[mesh.transform.to_raw()]),
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
    });
    GpuMesh {
        model,
        instance_buffer,
        transform: mesh.transform,
    }
}

impl GraphicsFlow<(), CourtEvent> for CourtFlow {
    fn on_init(&mut self, ctx: &mut Context, _: &mut ()) -> Out<CourtEvent> {
        if let Some(camera) = self.boot.scene().camera() {
            ctx.projection = Projection::for_camera(ctx.config.width, ctx.config.height, camera);
        }
        ctx.light.write(&ctx.queue, self.boot.scene().lights());
        self.pointer_lock = Some(WindowPointerLock::new(ctx.window().clone()));
        self.refresh_title(ctx);

        let mut tasks: Vec<BoxedFuture<CourtEvent>> = Vec::new();
        tasks.push(Box::pin(self.boot.environment_task().map(CourtEvent::Environment)));
        for (mesh, task) in self.boot.texture_tasks() {
            tasks.push(Box::pin(task.map(move |result| CourtEvent::Texture { mesh, result })));
        }
        Out::FutEvent(tasks)
    }

    fn on_update(&mut self, ctx: &Context, _: &mut (), dt: Duration) -> Out<CourtEvent> {
        self.boot.advance(dt);

        for (id, mesh) in self.boot.scene().iter_meshes() {
            let Some(Some(gpu)) = self.gpu.get_mut(id.index()) else {
                continue;
            };
            if gpu.transform != mesh.transform {
                gpu.transform = mesh.transform;
                ctx.queue
                    .write_buffer(&gpu.instance_buffer, 0, bytemuck::cast_slice(&[gpu.transform.to_raw()]));
            }
        }

        if let Some(camera) = self.boot.scene().camera() {
            self.camera_uniform.update_view_proj(camera, &ctx.projection);
            ctx.camera.write(&ctx.queue, &self.camera_uniform);
        }
        self.refresh_title(ctx);
        Out::Empty
    }

    fn on_tick(&mut self, ctx: &Context, _: &mut ()) -> Out<CourtEvent> {
        let scene = self.boot.scene();
        let frames = scene.frames();
        let ball = scene.mesh(self.boot.ball());
        let position = ball
            .map(|m| m.transform.position)
            .unwrap_or(cgmath::Vector3::new(0.0, 0.0, 0.0));
        let speed = ball
            .and_then(|m| m.impostor_handle())
            .and_then(|h| scene.physics().body_velocity(h))
            .map(cgmath::InnerSpace::magnitude)
            .unwrap_or(0.0);
        log::debug!(
            "{} frames in {} ms, {} meshes, {} physics steps, ball at ({:.2}, {:.2}, {:.2}) moving {:.2} u/s",
            frames - self.frames_at_last_tick,
            ctx.tick_duration_millis,
            scene.meshes().len(),
            scene.physics().steps(),
            position.x,
            position.y,
            position.z,
            speed
        );
        self.frames_at_last_tick = frames;
        Out::Empty
    }

    fn on_device_events(&mut self, _: &Context, _: &mut (), event: &DeviceEvent) -> Out<CourtEvent> {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if let Some(lock) = &self.pointer_lock {
                self.boot.on_pointer_motion(*dx, *dy, lock);
            }
        }
        Out::Empty
    }

    fn on_window_events(&mut self, _: &Context, _: &mut (), event: &WindowEvent) -> Out<CourtEvent> {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                let button = button_index(*button);
                if state.is_pressed() {
                    if let Some(lock) = self.pointer_lock.as_mut() {
                        match self.boot.on_pointer_down(button, lock) {
                            PointerAction::Engaged => log::debug!("Pointer locked"),
                            PointerAction::Released => log::debug!("Pointer released"),
                            PointerAction::Ignored => (),
                        }
                    }
                } else {
                    self.boot.on_pointer_up(button);
                }
            }
            WindowEvent::Focused(false) => {
                if let Some(lock) = self.pointer_lock.as_mut() {
                    self.boot.on_focus_lost(lock);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.boot.on_key(code, event.state.is_pressed());
                }
            }
            _ => (),
        }
        Out::Empty
    }

    fn on_custom_events(&mut self, ctx: &Context, _: &mut (), event: CourtEvent) -> anyhow::Result<Option<CourtEvent>> {
        match event {
            CourtEvent::Environment(result) => {
                self.boot.on_environment(result)?;
                self.sync_meshes(&ctx.device, &ctx.queue);
            }
            CourtEvent::Texture { mesh, result } => {
                if self.boot.on_texture(mesh, result) {
                    self.replace_material(ctx, mesh);
                }
            }
        }
        self.refresh_title(ctx);
        Ok(None)
    }

    fn on_render(&self) -> Render<'_> {
        self.gpu
            .iter()
            .flatten()
            .map(|gpu| Instanced {
                instance: &gpu.instance_buffer,
                model: &gpu.model,
                amount: 1,
            })
            .collect::<Vec<_>>()
            .into()
    }
}
