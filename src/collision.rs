//! Ellipsoid-vs-triangle collision for the camera.
//!
//! Geometry is scaled into "ellipsoid space", where the camera ellipsoid becomes the
//! unit sphere, and the sphere is pushed out of every triangle it penetrates. Movement
//! is split into sub-steps no longer than half the smallest ellipsoid radius so thin
//! geometry cannot be skipped over.

use cgmath::{ElementWise, InnerSpace, Vector3};

use crate::{data_structures::instance::Instance, resources::mesh::MeshData};

const MAX_SUBSTEPS: u32 = 256;
const RESOLVE_ITERATIONS: u32 = 4;
const SKIN: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Vector3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vector3::new(f32::MIN, f32::MIN, f32::MIN),
        }
    }

    pub fn around(center: Vector3<f32>, half: Vector3<f32>) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn grow(&mut self, p: Vector3<f32>) {
        self.min = Vector3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Vector3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y
            || self.max.z < other.min.z
            || self.min.z > other.max.z)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Triangle {
    points: [Vector3<f32>; 3],
    aabb: Aabb,
}

/// World-space triangles of one collidable mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionMesh {
    triangles: Vec<Triangle>,
    aabb: Aabb,
}

impl CollisionMesh {
    pub fn new(mesh: &MeshData, transform: &Instance) -> Self {
        let matrix = transform.to_matrix();
        let mut aabb = Aabb::empty();
        let triangles = mesh
            .triangles()
            .map(|points| {
                let points = points.map(|p| (matrix * p.extend(1.0)).truncate());
                let mut tri_aabb = Aabb::empty();
                points.iter().for_each(|p| {
                    tri_aabb.grow(*p);
                    aabb.grow(*p);
                });
                Triangle {
                    points,
                    aabb: tri_aabb,
                }
            })
            .collect();
        Self { triangles, aabb }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn aabb(&self) -> Aabb {
        self.aabb
    }
}

/// Move an ellipsoid centred at `position` by `displacement`, stopping at and sliding
/// along the given meshes. Returns the new centre.
pub fn sweep<'a>(
    position: Vector3<f32>,
    displacement: Vector3<f32>,
    ellipsoid: Vector3<f32>,
    meshes: impl IntoIterator<Item = &'a CollisionMesh> + Clone,
) -> Vector3<f32> {
    let min_radius = ellipsoid.x.min(ellipsoid.y).min(ellipsoid.z);
    if min_radius <= 0.0 {
        return position + displacement;
    }
    let max_step = min_radius * 0.5;
    let steps = ((displacement.magnitude() / max_step).ceil() as u32).clamp(1, MAX_SUBSTEPS);
    let step = displacement / steps as f32;

    let mut pos = position;
    for _ in 0..steps {
        pos = resolve(pos + step, ellipsoid, meshes.clone());
    }
    pos
}

fn resolve<'a>(
    position: Vector3<f32>,
    ellipsoid: Vector3<f32>,
    meshes: impl IntoIterator<Item = &'a CollisionMesh> + Clone,
) -> Vector3<f32> {
    let mut pos = position;
    for _ in 0..RESOLVE_ITERATIONS {
        let query = Aabb::around(pos, ellipsoid * 1.01);
        let center = pos.div_element_wise(ellipsoid);
        let mut deepest: Option<(Vector3<f32>, f32)> = None;
        for mesh in meshes.clone() {
            if !mesh.aabb.overlaps(&query) {
                continue;
            }
            for tri in mesh.triangles.iter().filter(|t| t.aabb.overlaps(&query)) {
                let [a, b, c] = tri.points.map(|p| p.div_element_wise(ellipsoid));
                let closest = closest_point_on_triangle(center, a, b, c);
                let d = center - closest;
                let dist = d.magnitude();
                if dist >= 1.0 {
                    continue;
                }
                let normal = if dist > 1e-6 {
                    d / dist
                } else {
                    let n = (b - a).cross(c - a);
                    if n.magnitude2() <= f32::EPSILON {
                        continue;
                    }
                    n.normalize()
                };
                let depth = 1.0 - dist;
                if deepest.is_none_or(|(_, best)| depth > best) {
                    deepest = Some((normal, depth));
                }
            }
        }
        match deepest {
            Some((normal, depth)) if depth > SKIN => {
                let push = normal * (depth + SKIN);
                pos += push.mul_element_wise(ellipsoid);
            }
            _ => break,
        }
    }
    pos
}

/// Closest point to `p` on triangle `abc` (Ericson, Real-Time Collision Detection 5.1.5).
pub fn closest_point_on_triangle(
    p: Vector3<f32>,
    a: Vector3<f32>,
    b: Vector3<f32>,
    c: Vector3<f32>,
) -> Vector3<f32> {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}
