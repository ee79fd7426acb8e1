use wgpu::util::DeviceExt;

use crate::lights::Light;

#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

/// Both scene lights, packed for the shader.
///
/// Every vec3 is followed by a scalar so each row fills 16 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    hemi_direction: [f32; 3],
    hemi_intensity: f32,
    hemi_sky: [f32; 3],
    _padding: f32,
    hemi_ground: [f32; 3],
    _padding2: f32,
    dir_direction: [f32; 3],
    dir_intensity: f32,
    dir_colour: [f32; 3],
    _padding3: f32,
}

impl LightUniform {
    /// Pack the first hemispheric and the first directional light of `lights`.
    /// A missing light contributes nothing.
    pub fn from_lights(lights: &[Light]) -> Self {
        let mut uniform = Self::zeroed_down();
        for light in lights {
            match light {
                Light::Hemispheric {
                    direction,
                    intensity,
                    sky,
                    ground,
                    ..
                } if uniform.hemi_intensity == 0.0 => {
                    uniform.hemi_direction = (*direction).into();
                    uniform.hemi_intensity = *intensity;
                    uniform.hemi_sky = *sky;
                    uniform.hemi_ground = *ground;
                }
                Light::Directional {
                    direction,
                    intensity,
                    colour,
                    ..
                } if uniform.dir_intensity == 0.0 => {
                    uniform.dir_direction = (*direction).into();
                    uniform.dir_intensity = *intensity;
                    uniform.dir_colour = *colour;
                }
                _ => log::warn!("Only one light of each kind is shaded, skipping {}", light.name()),
            }
        }
        uniform
    }

    fn zeroed_down() -> Self {
        Self {
            hemi_direction: [0.0, -1.0, 0.0],
            hemi_intensity: 0.0,
            hemi_sky: [0.0; 3],
            _padding: 0.0,
            hemi_ground: [0.0; 3],
            _padding2: 0.0,
            dir_direction: [0.0, -1.0, 0.0],
            dir_intensity: 0.0,
            dir_colour: [0.0; 3],
            _padding3: 0.0,
        }
    }

    pub fn hemispheric_intensity(&self) -> f32 {
        self.hemi_intensity
    }

    pub fn directional_intensity(&self) -> f32 {
        self.dir_intensity
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

impl LightResources {
    pub fn new(device: &wgpu::Device, uniform: LightUniform) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("light_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Upload `lights` if they differ from what the GPU has.
    pub fn write(&mut self, queue: &wgpu::Queue, lights: &[Light]) {
        let uniform = LightUniform::from_lights(lights);
        if uniform != self.uniform {
            self.uniform = uniform;
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    #[test]
    fn uniform_rows_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 80);
    }

    #[test]
    fn both_light_kinds_are_packed() {
        let lights = [
            Light::hemispheric("light", Vector3::new(0.0, -1.0, 0.0), 0.7),
            Light::directional("light", Vector3::new(0.0, -1.0, 0.0), 2.0),
        ];
        let uniform = LightUniform::from_lights(&lights);
        assert_eq!(uniform.hemispheric_intensity(), 0.7);
        assert_eq!(uniform.directional_intensity(), 2.0);
        assert_eq!(uniform.hemi_sky, [1.0; 3]);
        assert_eq!(uniform.hemi_ground, [0.0; 3]);
    }

    #[test]
    fn no_lights_means_dark() {
        let uniform = LightUniform::from_lights(&[]);
        assert_eq!(uniform.hemispheric_intensity(), 0.0);
        assert_eq!(uniform.directional_intensity(), 0.0);
    }
}
