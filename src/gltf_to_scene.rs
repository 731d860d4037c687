use std::collections::HashMap;
use std::path::Path;

use gltf::buffer::Data;
use gltf::camera::Projection;
use gltf::mesh::Mode;
use gltf::Document;
use log::{debug, info, warn};
use nalgebra::{Matrix4, Vector4};

use crate::camera::Camera;
use crate::error::SceneError;
use crate::geometry::{Fp, Vec3f, Vec4f, EPSILON};
use crate::scene::{Material, MaterialId, Scene, SceneBuilder, Triangle, GLASS_IOR};

/// Scene plus the first perspective camera found in the file, if any.
pub struct GltfScene {
    pub scene: Scene,
    pub camera: Option<Camera>,
}

pub fn load_gltf_scene(path: impl AsRef<Path>) -> Result<GltfScene, SceneError> {
    let (document, buffers, _) = gltf::import(path.as_ref())?;
    info!("loaded {}", path.as_ref().display());
    convert_gltf_to_scene(&document, &buffers)
}

struct Collector<'a> {
    buffers: &'a [Data],
    builder: SceneBuilder,
    materials: HashMap<Option<usize>, MaterialId>,
    camera: Option<Camera>,
}

pub fn convert_gltf_to_scene(document: &Document, buffers: &[Data]) -> Result<GltfScene, SceneError> {
    let mut collector = Collector {
        buffers,
        builder: SceneBuilder::new(),
        materials: HashMap::new(),
        camera: None,
    };
    let root = Matrix4::<Fp>::identity();
    for gltf_scene in document.scenes() {
        for node in gltf_scene.nodes() {
            collector.read_node(&node, &root)?;
        }
    }
    Ok(GltfScene {
        scene: collector.builder.build()?,
        camera: collector.camera,
    })
}

fn point_from_homogeneous(v: Vec4f) -> Vec3f {
    Vec3f::new(v.x / v.w, v.y / v.w, v.z / v.w)
}

fn vector_part(v: Vec4f) -> Vec3f {
    Vec3f::new(v.x, v.y, v.z)
}

fn convert_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let base = pbr.base_color_factor();
    let albedo = Vec3f::new(base[0], base[1], base[2]);
    let strength = material.emissive_strength().unwrap_or(1.0);
    let emission = Vec3f::from(material.emissive_factor()) * strength;
    let mut converted = if base[3] < 1.0 {
        Material::dielectric(GLASS_IOR)
    } else if pbr.metallic_factor() > 0.0 {
        Material::metal(albedo, pbr.roughness_factor())
    } else {
        Material::diffuse(albedo)
    };
    converted.emission = emission;
    converted
}

impl Collector<'_> {
    fn material_id(&mut self, material: &gltf::Material) -> MaterialId {
        if let Some(id) = self.materials.get(&material.index()) {
            return *id;
        }
        let id = self.builder.add_material(convert_material(material));
        self.materials.insert(material.index(), id);
        id
    }

    fn read_node(&mut self, node: &gltf::Node, parent: &Matrix4<Fp>) -> Result<(), SceneError> {
        let local = node.transform().matrix();
        let local = Matrix4::from_fn(|row, col| local[col][row]);
        let transform = parent * local;

        if let Some(node_camera) = node.camera() {
            match node_camera.projection() {
                Projection::Perspective(perspective) if self.camera.is_none() => {
                    let position = point_from_homogeneous(transform * Vec4f::w());
                    let forward = vector_part(transform * -Vec4f::z());
                    let camera = Camera::new(
                        position,
                        position + forward,
                        perspective.yfov().to_degrees(),
                        perspective.aspect_ratio().unwrap_or(1.0),
                    );
                    debug!("camera at {:?}", position);
                    self.camera = Some(camera);
                }
                Projection::Perspective(_) => {}
                Projection::Orthographic(_) => warn!("ignoring orthographic camera on node #{}", node.index()),
            }
        }

        if let Some(mesh) = node.mesh() {
            let name = mesh
                .name()
                .or(node.name())
                .map(str::to_string)
                .unwrap_or_else(|| format!("mesh{}", mesh.index()));
            let faces = self.read_mesh(&mesh, &name, &transform)?;
            self.builder.add_mesh(name, faces);
        }

        for child in node.children() {
            self.read_node(&child, &transform)?;
        }
        Ok(())
    }

    fn read_mesh(
        &mut self,
        mesh: &gltf::Mesh,
        name: &str,
        transform: &Matrix4<Fp>,
    ) -> Result<Vec<Triangle>, SceneError> {
        let normal_transform = transform
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or_else(|| *transform);
        let buffers = self.buffers;
        let mut faces = Vec::new();
        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                return Err(SceneError::UnsupportedPrimitive {
                    mesh: name.to_string(),
                    reason: "only triangle lists are supported",
                });
            }
            let material = self.material_id(&primitive.material());
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));
            let positions: Vec<Vec3f> = reader
                .read_positions()
                .ok_or_else(|| SceneError::UnsupportedPrimitive {
                    mesh: name.to_string(),
                    reason: "primitive has no positions",
                })?
                .map(|p| point_from_homogeneous(transform * Vector4::new(p[0], p[1], p[2], 1.0)))
                .collect();
            let normals: Option<Vec<Vec3f>> = reader.read_normals().map(|iter| {
                iter.map(|n| {
                    let n = vector_part(normal_transform * Vector4::new(n[0], n[1], n[2], 0.0));
                    n.try_normalize(EPSILON).unwrap_or_else(Vec3f::zeros)
                })
                .collect()
            });
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            for triangle in indices.chunks_exact(3) {
                let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
                if a.max(b).max(c) >= positions.len() {
                    return Err(SceneError::UnsupportedPrimitive {
                        mesh: name.to_string(),
                        reason: "index out of range",
                    });
                }
                let vertices = [positions[a], positions[b], positions[c]];
                let face = match &normals {
                    Some(normals) if normals.len() == positions.len() => {
                        Triangle::with_normals(vertices, [normals[a], normals[b], normals[c]], material)
                    }
                    _ => Triangle::new(vertices, material),
                };
                faces.push(face);
            }
        }
        Ok(faces)
    }
}
