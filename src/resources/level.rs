//! Decoding of the level asset (`.glb` / `.gltf`) into flat, world-space surfaces.
//!
//! The node hierarchy is not kept: every primitive becomes one [`Surface`] with its
//! node transforms baked into the vertices. Positions and normals are mirrored on X
//! so the right-handed glTF data lands in the scene's left-handed world.

use std::{collections::HashMap, sync::Arc};

use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3, Vector4};

use crate::{
    data_structures::model::ModelVertex,
    error::AssetError,
    resources::{
        mesh::{compute_normals, MeshData},
        AssetSource,
    },
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMaterial {
    pub name: String,
    pub base_color: [f32; 4],
    pub texture: Option<Arc<image::RgbaImage>>,
    /// Image file still to be fetched for `texture`.
    pub texture_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub name: String,
    pub mesh: MeshData,
    pub material: SurfaceMaterial,
}

/// Everything the level file contributed to the scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    pub path: String,
    pub surfaces: Vec<Surface>,
}

impl Environment {
    pub fn triangle_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.mesh.triangle_count()).sum()
    }
}

/// Fetch a buffer or image referenced from the level at `path`.
async fn fetch_sibling(source: &dyn AssetSource, path: &str, uri: &str) -> Result<Vec<u8>, AssetError> {
    if uri.starts_with("data:") {
        return Err(AssetError::DataUri {
            path: path.to_string(),
        });
    }
    source.fetch(&sibling_path(path, uri)).await
}

/// Resolve `uri` relative to the directory `path` lives in.
pub fn sibling_path(path: &str, uri: &str) -> String {
    match path.rfind('/') {
        Some(idx) => format!("{}/{}", &path[..idx], uri),
        None => uri.to_string(),
    }
}

pub async fn parse_environment(
    bytes: &[u8],
    path: &str,
    source: &dyn AssetSource,
) -> Result<Environment, AssetError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|source| AssetError::Gltf {
        path: path.to_string(),
        source,
    })?;

    let mut buffers: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => match gltf.blob.as_deref() {
                Some(blob) => buffers.push(blob.to_vec()),
                None => {
                    return Err(AssetError::MissingBlob {
                        path: path.to_string(),
                    })
                }
            },
            gltf::buffer::Source::Uri(uri) => {
                buffers.push(fetch_sibling(source, path, uri).await?);
            }
        }
    }

    let mut images: HashMap<usize, Arc<image::RgbaImage>> = HashMap::new();
    let mut materials: Vec<SurfaceMaterial> = Vec::new();
    for material in gltf.materials() {
        let pbr = material.pbr_metallic_roughness();
        let texture = match pbr.base_color_texture() {
            Some(info) => {
                let image = info.texture().source();
                match images.get(&image.index()) {
                    Some(decoded) => Some(decoded.clone()),
                    None => {
                        let decoded = Arc::new(decode_image(&image, &buffers, path, source).await?);
                        images.insert(image.index(), decoded.clone());
                        Some(decoded)
                    }
                }
            }
            None => None,
        };
        materials.push(SurfaceMaterial {
            name: material.name().unwrap_or("material").to_string(),
            base_color: pbr.base_color_factor(),
            texture,
            texture_path: None,
        });
    }

    let mut surfaces = Vec::new();
    let roots: Vec<gltf::Node> = match gltf.default_scene().or_else(|| gltf.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => Vec::new(),
    };
    for node in roots {
        collect_surfaces(&node, Matrix4::identity(), &buffers, &materials, &mut surfaces);
    }
    log::debug!("{} decoded into {} surfaces", path, surfaces.len());

    Ok(Environment {
        path: path.to_string(),
        surfaces,
    })
}

async fn decode_image(
    image: &gltf::Image<'_>,
    buffers: &[Vec<u8>],
    path: &str,
    source: &dyn AssetSource,
) -> Result<image::RgbaImage, AssetError> {
    let image_err = |source| AssetError::Image {
        path: path.to_string(),
        source,
    };
    let decoded = match image.source() {
        gltf::image::Source::View { view, .. } => {
            let bytes = buffers
                .get(view.buffer().index())
                .and_then(|b| b.get(view.offset()..view.offset() + view.length()))
                .ok_or_else(|| AssetError::MissingBlob {
                    path: path.to_string(),
                })?;
            image::load_from_memory(bytes).map_err(image_err)?
        }
        gltf::image::Source::Uri { uri, .. } => {
            let bytes = fetch_sibling(source, path, uri).await?;
            image::load_from_memory(&bytes).map_err(image_err)?
        }
    };
    Ok(decoded.to_rgba8())
}

fn collect_surfaces(
    node: &gltf::Node,
    parent: Matrix4<f32>,
    buffers: &[Vec<u8>],
    materials: &[SurfaceMaterial],
    out: &mut Vec<Surface>,
) {
    let world = parent * Matrix4::from(node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        let name = node
            .name()
            .or_else(|| mesh.name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("node{}", node.index()));
        for (idx, primitive) in mesh.primitives().enumerate() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("Skipping non-triangle primitive {} of {}", idx, name);
                continue;
            }
            let Some(data) = read_primitive(&primitive, buffers, world) else {
                log::warn!("Primitive {} of {} has no positions", idx, name);
                continue;
            };
            let material = primitive
                .material()
                .index()
                .and_then(|i| materials.get(i).cloned())
                .unwrap_or_else(|| SurfaceMaterial {
                    name: "default".to_string(),
                    base_color: [1.0; 4],
                    texture: None,
                    texture_path: None,
                });
            let name = if mesh.primitives().len() > 1 {
                format!("{}.{}", name, idx)
            } else {
                name.clone()
            };
            out.push(Surface {
                name,
                mesh: data,
                material,
            });
        }
    }
    for child in node.children() {
        collect_surfaces(&child, world, buffers, materials, out);
    }
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
    world: Matrix4<f32>,
) -> Option<MeshData> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
    let tex_coords: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|t| t.into_f32().collect())
        .unwrap_or_default();
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let mut vertices: Vec<ModelVertex> = positions
        .iter()
        .enumerate()
        .map(|(i, p)| ModelVertex {
            position: *p,
            tex_coords: tex_coords.get(i).copied().unwrap_or_default(),
            normal: normals
                .as_ref()
                .and_then(|n| n.get(i).copied())
                .unwrap_or_default(),
        })
        .collect();
    if normals.is_none() {
        compute_normals(&mut vertices, &indices);
    }

    let normal_matrix = Matrix3::from_cols(world.x.truncate(), world.y.truncate(), world.z.truncate())
        .invert()
        .map(|m| m.transpose())
        .unwrap_or_else(Matrix3::identity);
    for vertex in &mut vertices {
        let p = world * Vector4::new(vertex.position[0], vertex.position[1], vertex.position[2], 1.0);
        vertex.position = [-p.x, p.y, p.z];
        let n = normal_matrix * Vector3::from(vertex.normal);
        let n = if n.magnitude2() > f32::EPSILON { n.normalize() } else { n };
        vertex.normal = [-n.x, n.y, n.z];
    }

    Some(MeshData { vertices, indices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::AssetFuture;
    use approx::assert_abs_diff_eq;

    struct InMemory(HashMap<String, Vec<u8>>);

    impl AssetSource for InMemory {
        fn fetch<'a>(&'a self, path: &'a str) -> AssetFuture<'a> {
            Box::pin(async move {
                self.0.get(path).cloned().ok_or_else(|| AssetError::Io {
                    path: path.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
            })
        }
    }

    const TRIANGLE: &str = r#"{
        "asset": {"version": "2.0"},
        "buffers": [{"uri": "tri.bin", "byteLength": 36}],
        "bufferViews": [{"buffer": 0, "byteLength": 36}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                       "min": [0, 0, 0], "max": [1, 1, 0]}],
        "meshes": [{"name": "tri", "primitives": [{"attributes": {"POSITION": 0}}]}],
        "nodes": [{"children": [1], "translation": [1, 0, 0]}, {"mesh": 0}],
        "scenes": [{"nodes": [0]}],
        "scene": 0
    }"#;

    fn triangle_source() -> InMemory {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bytes: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
        InMemory(HashMap::from([("models/tri.bin".to_string(), bytes)]))
    }

    #[test]
    fn sibling_paths_keep_the_directory() {
        assert_eq!(sibling_path("models/level.glb", "tex.png"), "models/tex.png");
        assert_eq!(sibling_path("level.glb", "tex.png"), "tex.png");
    }

    #[tokio::test]
    async fn node_transforms_are_baked_and_mirrored() {
        let source = triangle_source();
        let env = parse_environment(TRIANGLE.as_bytes(), "models/level.gltf", &source)
            .await
            .unwrap();
        assert_eq!(env.surfaces.len(), 1);
        let surface = &env.surfaces[0];
        assert_eq!(surface.mesh.indices, vec![0, 1, 2]);
        let xs: Vec<f32> = surface.mesh.vertices.iter().map(|v| v.position[0]).collect();
        assert_eq!(xs, vec![-1.0, -2.0, -1.0]);
        for v in &surface.mesh.vertices {
            assert_abs_diff_eq!(v.normal[2], 1.0, epsilon = 1e-6);
        }
        assert_eq!(surface.material.base_color, [1.0; 4]);
    }

    #[tokio::test]
    async fn missing_external_buffer_is_an_io_error() {
        let source = InMemory(HashMap::new());
        let err = parse_environment(TRIANGLE.as_bytes(), "models/level.gltf", &source)
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Io { ref path, .. } if path == "models/tri.bin"));
    }

    #[tokio::test]
    async fn data_uri_buffers_are_rejected_by_name() {
        let embedded = TRIANGLE.replace(
            r#""uri": "tri.bin""#,
            r#""uri": "data:application/octet-stream;base64,AAAA""#,
        );
        let err = parse_environment(embedded.as_bytes(), "models/level.gltf", &triangle_source())
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::DataUri { .. }));
        assert_eq!(err.path(), "models/level.gltf");
    }

    #[tokio::test]
    async fn garbage_is_a_gltf_error() {
        let source = InMemory(HashMap::new());
        let err = parse_environment(b"not a model", "models/level.glb", &source)
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Gltf { .. }));
        assert_eq!(err.path(), "models/level.glb");
    }
}
