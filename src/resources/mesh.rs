//! CPU-side mesh data and the procedural shapes the scene builds itself.
//!
//! Geometry stays on the CPU until the render side uploads it, so the headless
//! scene (and its tests) can inspect and collide against it.

use std::f32::consts::PI;

use cgmath::InnerSpace;

use crate::data_structures::model::ModelVertex;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Triangles as position triples, in mesh space.
    pub fn triangles(&self) -> impl Iterator<Item = [cgmath::Vector3<f32>; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|c| {
            let p = |i: u32| {
                self.vertices
                    .get(i as usize)
                    .map(|v| cgmath::Vector3::from(v.position))
            };
            Some([p(c[0])?, p(c[1])?, p(c[2])?])
        })
    }
}

/**
 * UV sphere laid out in `segments + 2` rings from pole to pole and twice as many
 * slices around the vertical axis. Seam and pole vertices are duplicated so every
 * ring wraps its texture cleanly.
 */
pub fn sphere(diameter: f32, segments: u32) -> MeshData {
    let radius = diameter / 2.0;
    let rings = segments.max(1) + 2;
    let slices = rings * 2;

    let mut vertices = Vec::with_capacity(((rings + 1) * (slices + 1)) as usize);
    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let polar = v * PI;
        for slice in 0..=slices {
            let u = slice as f32 / slices as f32;
            let azimuth = u * 2.0 * PI;
            let normal = [polar.sin() * azimuth.cos(), polar.cos(), polar.sin() * azimuth.sin()];
            vertices.push(ModelVertex {
                position: [normal[0] * radius, normal[1] * radius, normal[2] * radius],
                tex_coords: [u, v],
                normal,
            });
        }
    }

    let stride = slices + 1;
    let mut indices = Vec::with_capacity((rings * slices * 6) as usize);
    for ring in 0..rings {
        for slice in 0..slices {
            let first = ring * stride + slice;
            let second = first + stride;
            indices.extend_from_slice(&[first, second, first + 1]);
            indices.extend_from_slice(&[second, second + 1, first + 1]);
        }
    }

    MeshData { vertices, indices }
}

/// Flat ground in the XZ plane, centred on the origin, facing up.
/// `width` runs along X, `height` along Z.
pub fn ground(width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let up = [0.0, 1.0, 0.0];
    let vertices = vec![
        ModelVertex { position: [-hw, 0.0, hh], tex_coords: [0.0, 0.0], normal: up },
        ModelVertex { position: [hw, 0.0, hh], tex_coords: [1.0, 0.0], normal: up },
        ModelVertex { position: [-hw, 0.0, -hh], tex_coords: [0.0, 1.0], normal: up },
        ModelVertex { position: [hw, 0.0, -hh], tex_coords: [1.0, 1.0], normal: up },
    ];
    MeshData {
        vertices,
        indices: vec![0, 2, 1, 1, 2, 3],
    }
}

/// Axis-aligned cube of edge length `size` centred on the origin.
pub fn cube(size: f32) -> MeshData {
    let h = size / 2.0;
    // normal, then the two in-face axes
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (n, a, b) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            vertices.push(ModelVertex {
                position: [
                    (n[0] + a[0] * su + b[0] * sv) * h,
                    (n[1] + a[1] * su + b[1] * sv) * h,
                    (n[2] + a[2] * su + b[2] * sv) * h,
                ],
                tex_coords: [(su + 1.0) / 2.0, (1.0 - sv) / 2.0],
                normal: n,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    MeshData { vertices, indices }
}

/// Area-weighted vertex normals for meshes that ship without them.
pub fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut accumulated = vec![cgmath::Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    for c in indices.chunks_exact(3) {
        let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let p0 = cgmath::Vector3::from(vertices[i0].position);
        let p1 = cgmath::Vector3::from(vertices[i1].position);
        let p2 = cgmath::Vector3::from(vertices[i2].position);
        // The cross product's length is twice the area, which weights the sum
        let face = (p1 - p0).cross(p2 - p0);
        accumulated[i0] += face;
        accumulated[i1] += face;
        accumulated[i2] += face;
    }
    for (vertex, normal) in vertices.iter_mut().zip(accumulated) {
        if normal.magnitude2() > f32::EPSILON {
            vertex.normal = normal.normalize().into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sphere_vertices_sit_on_the_radius() {
        let mesh = sphere(0.24, 32);
        assert_eq!(mesh.vertices.len(), 35 * 69);
        assert_eq!(mesh.triangle_count(), 34 * 68 * 2);
        for v in &mesh.vertices {
            let p = cgmath::Vector3::from(v.position);
            assert_abs_diff_eq!(p.magnitude(), 0.12, epsilon = 1e-5);
        }
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn ground_spans_width_on_x_and_height_on_z() {
        let mesh = ground(32.0, 19.0);
        let xs: Vec<f32> = mesh.vertices.iter().map(|v| v.position[0]).collect();
        let zs: Vec<f32> = mesh.vertices.iter().map(|v| v.position[2]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 16.0);
        assert_eq!(zs.iter().cloned().fold(f32::MIN, f32::max), 9.5);
        assert!(mesh.vertices.iter().all(|v| v.position[1] == 0.0));
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn cube_faces_point_outwards() {
        let mesh = cube(2.0);
        assert_eq!(mesh.vertices.len(), 24);
        for v in &mesh.vertices {
            let p = cgmath::Vector3::from(v.position);
            let n = cgmath::Vector3::from(v.normal);
            assert_abs_diff_eq!(p.dot(n), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn missing_normals_are_rebuilt_from_faces() {
        let mut mesh = ground(2.0, 2.0);
        mesh.vertices.iter_mut().for_each(|v| v.normal = [0.0; 3]);
        compute_normals(&mut mesh.vertices, &mesh.indices);
        for v in &mesh.vertices {
            assert_abs_diff_eq!(v.normal[1].abs(), 1.0, epsilon = 1e-6);
        }
    }
}
