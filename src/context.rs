use std::sync::Arc;

use winit::window::Window;

use crate::{
    camera::{CameraResources, CameraUniform, Projection},
    config::EngineConfig,
    data_structures::texture::Texture,
    error::StartupError,
    pipelines::{
        basic::mk_basic_pipeline,
        light::{LightResources, LightUniform},
        Pipelines,
    },
};

/// GPU and window state shared by every flow.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: Texture,
    pub(crate) msaa_target: Option<Texture>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub sample_count: u32,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub pipelines: Pipelines,
    pub clear_colour: wgpu::Color,
    pub tick_duration_millis: u64,
    pub title: String,
}

/// The handles a flow constructor gets to upload its resources.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
        }
    }
}

impl Context {
    pub async fn new(window: Arc<Window>, engine: &EngineConfig) -> Result<Self, StartupError> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour and relies on an sRGB target for the encoding
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Rgba8UnormSrgb);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let sample_count = pick_sample_count(&adapter, surface_format, engine);

        let projection = Projection::new(config.width, config.height, cgmath::Rad(0.8), 0.1, 1000.0);
        let camera = CameraResources::new(&device, CameraUniform::new());
        let light = LightResources::new(&device, LightUniform::from_lights(&[]));

        let pipelines = Pipelines {
            basic: mk_basic_pipeline(
                &device,
                &config,
                sample_count,
                &light.bind_group_layout,
                &camera.bind_group_layout,
            ),
        };

        let depth_texture = Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            sample_count,
            "depth_texture",
        );
        let msaa_target = (sample_count > 1).then(|| {
            Texture::create_msaa_target(&device, [config.width, config.height], config.format, sample_count)
        });

        let [r, g, b, a] = engine.clear_colour;
        Ok(Self {
            window,
            depth_texture,
            msaa_target,
            surface,
            device,
            queue,
            config,
            sample_count,
            camera,
            projection,
            light,
            pipelines,
            clear_colour: wgpu::Color { r, g, b, a },
            tick_duration_millis: engine.tick_duration_millis,
            title: engine.title.clone(),
        })
    }

    /// Reconfigure the surface and every size-dependent target.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.projection.resize(width, height);
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [width, height], self.sample_count, "depth_texture");
        if self.sample_count > 1 {
            self.msaa_target = Some(Texture::create_msaa_target(
                &self.device,
                [width, height],
                self.config.format,
                self.sample_count,
            ));
        }
        true
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
}

fn pick_sample_count(adapter: &wgpu::Adapter, format: wgpu::TextureFormat, engine: &EngineConfig) -> u32 {
    if !engine.antialias || engine.msaa_samples <= 1 {
        return 1;
    }
    let flags = adapter.get_texture_format_features(format).flags;
    if flags.sample_count_supported(engine.msaa_samples) {
        engine.msaa_samples
    } else {
        log::warn!(
            "{}x MSAA is not supported for {:?}, rendering without anti-aliasing",
            engine.msaa_samples,
            format
        );
        1
    }
}
