use crate::{error::AssetError, resources::AssetSource};

/// Layout of a material bind group: a diffuse texture and its sampler.
pub fn diffuse_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("Material texture_bind_group_layout"),
    })
}

/// Fetch an image file and decode it to RGBA8.
pub async fn load_image(
    source: &dyn AssetSource,
    file_name: &str,
) -> Result<image::RgbaImage, AssetError> {
    let data = source.fetch(file_name).await?;
    image::load_from_memory(&data)
        .map(|img| img.to_rgba8())
        .map_err(|source| AssetError::Image {
            path: file_name.to_string(),
            source,
        })
}
