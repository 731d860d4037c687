//! Geometry/material store: flat face, node and material arrays built once
//! at load time and read by every pixel lane during rendering.

use log::{debug, info};

use crate::aabb::Aabb;
use crate::bvh::{create_bvh_tree, intersect_bvh, BvhNode, TraversalStats};
use crate::error::SceneError;
use crate::geometry::{Fp, Ray, Vec3f};

pub type MaterialId = usize;

pub const OBJECTS_COUNT: usize = 16;
pub const MAX_FACES_PER_MESH: usize = 1 << 17;
pub const MAX_NODES_PER_MESH: usize = 2 * MAX_FACES_PER_MESH;
pub const GLASS_IOR: Fp = 1.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaterialKind {
    Diffuse,
    Metal { fuzz: Fp },
    Dielectric { ior: Fp },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub albedo: Vec3f,
    pub emission: Vec3f,
    pub kind: MaterialKind,
}

impl Material {
    pub fn diffuse(albedo: Vec3f) -> Self {
        Material {
            albedo,
            emission: Vec3f::zeros(),
            kind: MaterialKind::Diffuse,
        }
    }

    pub fn metal(albedo: Vec3f, fuzz: Fp) -> Self {
        Material {
            albedo,
            emission: Vec3f::zeros(),
            kind: MaterialKind::Metal {
                fuzz: fuzz.clamp(0.0, 1.0),
            },
        }
    }

    pub fn dielectric(ior: Fp) -> Self {
        Material {
            albedo: Vec3f::new(1.0, 1.0, 1.0),
            emission: Vec3f::zeros(),
            kind: MaterialKind::Dielectric { ior },
        }
    }

    pub fn emissive(emission: Vec3f) -> Self {
        Material {
            albedo: Vec3f::zeros(),
            emission,
            kind: MaterialKind::Diffuse,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [Vec3f; 3],
    pub normals: [Vec3f; 3],
    pub face_normal: Vec3f,
    pub material: MaterialId,
}

impl Triangle {
    /// A faceted triangle: all vertex normals equal the face normal.
    pub fn new(vertices: [Vec3f; 3], material: MaterialId) -> Self {
        let face_normal = Self::geometric_normal(&vertices);
        Triangle {
            vertices,
            normals: [face_normal; 3],
            face_normal,
            material,
        }
    }

    pub fn with_normals(vertices: [Vec3f; 3], normals: [Vec3f; 3], material: MaterialId) -> Self {
        let face_normal = Self::geometric_normal(&vertices);
        let normals = normals.map(|n| n.try_normalize(Fp::EPSILON).unwrap_or(face_normal));
        Triangle {
            vertices,
            normals,
            face_normal,
            material,
        }
    }

    // Counter-clockwise winding; zero for degenerate faces.
    fn geometric_normal(vertices: &[Vec3f; 3]) -> Vec3f {
        let [a, b, c] = vertices;
        (b - a)
            .cross(&(c - a))
            .try_normalize(Fp::EPSILON)
            .unwrap_or_else(Vec3f::zeros)
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.vertices)
    }

    pub fn centroid(&self) -> Vec3f {
        (self.vertices[0] + self.vertices[1] + self.vertices[2]) / 3.0
    }

    /// Barycentric interpolation of the vertex normals.
    pub fn interpolated_normal(&self, u: Fp, v: Fp) -> Vec3f {
        let w = 1.0 - u - v;
        (self.normals[0] * w + self.normals[1] * u + self.normals[2] * v)
            .try_normalize(Fp::EPSILON)
            .unwrap_or(self.face_normal)
    }
}

/// An input mesh handed to [`SceneBuilder`].
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub faces: Vec<Triangle>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub face_start: usize,
    pub face_count: usize,
    pub root_node: usize,
    pub node_count: usize,
    pub bvh_depth: usize,
}

/// Fixed bounds used to size the scene buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneLimits {
    pub max_objects: usize,
    pub max_faces_per_mesh: usize,
    pub max_nodes_per_mesh: usize,
}

impl Default for SceneLimits {
    fn default() -> Self {
        SceneLimits {
            max_objects: OBJECTS_COUNT,
            max_faces_per_mesh: MAX_FACES_PER_MESH,
            max_nodes_per_mesh: MAX_NODES_PER_MESH,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitRecord {
    pub point: Vec3f,
    /// Geometric normal, flipped to face the incoming ray.
    pub normal: Vec3f,
    /// Interpolated normal on the same side as `normal`.
    pub shading_normal: Vec3f,
    pub t: Fp,
    pub front_face: bool,
    pub material: MaterialId,
    pub object: usize,
    pub face: usize,
}

impl HitRecord {
    pub fn surface_normal(&self, flat_shading: bool) -> Vec3f {
        if flat_shading {
            self.normal
        } else {
            self.shading_normal
        }
    }
}

#[derive(Debug, Default)]
pub struct SceneBuilder {
    limits: SceneLimits,
    materials: Vec<Material>,
    meshes: Vec<Mesh>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SceneLimits) -> Self {
        SceneBuilder {
            limits,
            ..Default::default()
        }
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_mesh(&mut self, name: impl Into<String>, faces: Vec<Triangle>) -> usize {
        self.meshes.push(Mesh {
            name: name.into(),
            faces,
        });
        self.meshes.len() - 1
    }

    pub fn build(self) -> Result<Scene, SceneError> {
        let limits = self.limits;
        if self.meshes.len() > limits.max_objects {
            return Err(SceneError::TooManyObjects {
                count: self.meshes.len(),
                max: limits.max_objects,
            });
        }

        let mut materials = self.materials;
        let mut faces = Vec::new();
        let mut nodes = Vec::new();
        let mut objects = Vec::with_capacity(self.meshes.len());

        for mesh in self.meshes {
            let Mesh {
                name,
                faces: mut mesh_faces,
            } = mesh;
            if mesh_faces.is_empty() {
                return Err(SceneError::EmptyMesh { object: name });
            }
            if mesh_faces.len() > limits.max_faces_per_mesh {
                return Err(SceneError::TooManyFaces {
                    object: name,
                    count: mesh_faces.len(),
                    max: limits.max_faces_per_mesh,
                });
            }
            if let Some(face) = mesh_faces.iter().find(|f| f.material >= materials.len()) {
                return Err(SceneError::UnknownMaterial {
                    object: name,
                    material: face.material,
                });
            }

            let face_start = faces.len();
            let root_node = nodes.len();
            let tree = create_bvh_tree(&mut mesh_faces, face_start, root_node);
            if tree.nodes.len() > limits.max_nodes_per_mesh {
                return Err(SceneError::TooManyNodes {
                    object: name,
                    count: tree.nodes.len(),
                    max: limits.max_nodes_per_mesh,
                });
            }
            debug!(
                "object `{}`: {} faces, {} nodes, depth {}",
                name,
                mesh_faces.len(),
                tree.nodes.len(),
                tree.max_depth
            );
            objects.push(SceneObject {
                name,
                face_start,
                face_count: mesh_faces.len(),
                root_node,
                node_count: tree.nodes.len(),
                bvh_depth: tree.max_depth,
            });
            faces.extend(mesh_faces);
            nodes.extend(tree.nodes);
        }

        materials.push(Material::dielectric(GLASS_IOR));
        let glass_material = materials.len() - 1;
        let scene = Scene {
            material_overrides: vec![false; objects.len()],
            faces,
            nodes,
            materials,
            objects,
            glass_material,
        };
        info!(
            "scene built: {} objects, {} faces, {} nodes",
            scene.objects.len(),
            scene.faces.len(),
            scene.nodes.len()
        );
        Ok(scene)
    }
}

#[derive(Debug)]
pub struct Scene {
    pub faces: Vec<Triangle>,
    pub nodes: Vec<BvhNode>,
    pub materials: Vec<Material>,
    pub objects: Vec<SceneObject>,
    material_overrides: Vec<bool>,
    glass_material: MaterialId,
}

impl Scene {
    pub fn object_index(&self, name: &str) -> Result<usize, SceneError> {
        self.objects
            .iter()
            .position(|o| o.name == name)
            .ok_or_else(|| SceneError::UnknownObject {
                name: name.to_string(),
            })
    }

    /// Forces the object to render as glass without touching its geometry.
    pub fn set_material_override(&mut self, object: usize, glass: bool) {
        if let Some(flag) = self.material_overrides.get_mut(object) {
            *flag = glass;
        }
    }

    pub fn material_override(&self, object: usize) -> bool {
        self.material_overrides.get(object).copied().unwrap_or(false)
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id]
    }

    /// Closest hit with `t` in `[t_min, t_max]`.
    pub fn intersect(&self, ray: &Ray, t_min: Fp, t_max: Fp) -> Option<HitRecord> {
        let mut stats = TraversalStats::default();
        self.intersect_with_stats(ray, t_min, t_max, &mut stats)
    }

    /// Closest hit over all objects; later objects are tested against the
    /// distance already found.
    pub fn intersect_with_stats(
        &self,
        ray: &Ray,
        t_min: Fp,
        t_max: Fp,
        stats: &mut TraversalStats,
    ) -> Option<HitRecord> {
        let mut closest = t_max;
        let mut best = None;
        for (object_index, object) in self.objects.iter().enumerate() {
            if let Some((face, hit)) = intersect_bvh(
                ray,
                &self.nodes,
                &self.faces,
                object.root_node,
                t_min,
                closest,
                stats,
            ) {
                closest = hit.t;
                best = Some((object_index, face, hit));
            }
        }

        let (object, face_index, hit) = best?;
        let face = &self.faces[face_index];
        let front_face = ray.direction.dot(&face.face_normal) < 0.0;
        let normal = if front_face {
            face.face_normal
        } else {
            -face.face_normal
        };
        let mut shading_normal = face.interpolated_normal(hit.u, hit.v);
        if shading_normal.dot(&normal) < 0.0 {
            shading_normal = -shading_normal;
        }
        let material = if self.material_override(object) {
            self.glass_material
        } else {
            face.material
        };
        Some(HitRecord {
            point: ray.at(hit.t),
            normal,
            shading_normal,
            t: hit.t,
            front_face,
            material,
            object,
            face: face_index,
        })
    }

    /// Line segments of every hierarchy node, 12 per box.
    pub fn debug_aabb_lines(&self) -> Vec<[Vec3f; 2]> {
        self.nodes
            .iter()
            .flat_map(|node| node.aabb.edges())
            .collect()
    }

    pub fn bounds(&self) -> Aabb {
        self.objects
            .iter()
            .filter_map(|o| self.nodes.get(o.root_node))
            .fold(Aabb::default(), |acc, node| acc.extend_aabb(&node.aabb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::FP_INF;

    fn quad(z: Fp, material: MaterialId) -> Vec<Triangle> {
        let a = Vec3f::new(-1.0, -1.0, z);
        let b = Vec3f::new(1.0, -1.0, z);
        let c = Vec3f::new(1.0, 1.0, z);
        let d = Vec3f::new(-1.0, 1.0, z);
        vec![Triangle::new([a, b, c], material), Triangle::new([a, c, d], material)]
    }

    #[test]
    fn nearest_object_wins_across_hierarchies() {
        let mut builder = SceneBuilder::new();
        let red = builder.add_material(Material::diffuse(Vec3f::new(1.0, 0.0, 0.0)));
        let blue = builder.add_material(Material::diffuse(Vec3f::new(0.0, 0.0, 1.0)));
        builder.add_mesh("far", quad(-2.0, red));
        builder.add_mesh("near", quad(0.0, blue));
        let scene = builder.build().unwrap();
        let ray = Ray::new(Vec3f::new(0.1, 0.2, 3.0), Vec3f::new(0.0, 0.0, -1.0));
        let hit = scene.intersect(&ray, 0.0, FP_INF).unwrap();
        assert_eq!(hit.object, 1);
        assert_eq!(hit.material, blue);
        assert!((hit.t - 3.0).abs() < 1e-5);
        assert!(hit.front_face);
        assert!((hit.normal - Vec3f::new(0.0, 0.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn back_face_hit_flips_normal() {
        let mut builder = SceneBuilder::new();
        let m = builder.add_material(Material::diffuse(Vec3f::new(1.0, 1.0, 1.0)));
        builder.add_mesh("quad", quad(0.0, m));
        let scene = builder.build().unwrap();
        let ray = Ray::new(Vec3f::new(0.0, 0.1, -3.0), Vec3f::new(0.0, 0.0, 1.0));
        let hit = scene.intersect(&ray, 0.0, FP_INF).unwrap();
        assert!(!hit.front_face);
        assert!(hit.normal.dot(&ray.direction) < 0.0);
        assert!(hit.shading_normal.dot(&hit.normal) > 0.0);
    }

    #[test]
    fn limits_are_enforced_before_rendering() {
        let limits = SceneLimits {
            max_objects: 1,
            max_faces_per_mesh: 1,
            max_nodes_per_mesh: 8,
        };
        let mut builder = SceneBuilder::with_limits(limits);
        let m = builder.add_material(Material::diffuse(Vec3f::new(1.0, 1.0, 1.0)));
        builder.add_mesh("quad", quad(0.0, m));
        assert!(matches!(builder.build(), Err(SceneError::TooManyFaces { .. })));

        let mut builder = SceneBuilder::with_limits(limits);
        let m = builder.add_material(Material::diffuse(Vec3f::new(1.0, 1.0, 1.0)));
        builder.add_mesh("a", quad(0.0, m)[..1].to_vec());
        builder.add_mesh("b", quad(1.0, m)[..1].to_vec());
        assert!(matches!(builder.build(), Err(SceneError::TooManyObjects { .. })));

        let mut builder = SceneBuilder::new();
        builder.add_mesh("orphan", quad(0.0, 3));
        assert!(matches!(builder.build(), Err(SceneError::UnknownMaterial { .. })));
    }

    #[test]
    fn override_switches_material_only() {
        let mut builder = SceneBuilder::new();
        let m = builder.add_material(Material::diffuse(Vec3f::new(0.8, 0.8, 0.8)));
        builder.add_mesh("quad", quad(0.0, m));
        let mut scene = builder.build().unwrap();
        let ray = Ray::new(Vec3f::new(0.3, -0.2, 2.0), Vec3f::new(0.0, 0.0, -1.0));
        let before = scene.intersect(&ray, 0.0, FP_INF).unwrap();
        scene.set_material_override(0, true);
        let after = scene.intersect(&ray, 0.0, FP_INF).unwrap();
        assert_eq!(scene.material(before.material).kind, MaterialKind::Diffuse);
        assert!(matches!(
            scene.material(after.material).kind,
            MaterialKind::Dielectric { .. }
        ));
        assert_eq!(before.point, after.point);
        assert_eq!(before.normal, after.normal);
    }
}
