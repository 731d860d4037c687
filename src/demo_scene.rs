//! Built-in procedural scene used when no asset file is given.

use std::collections::HashMap;

use crate::camera::Camera;
use crate::error::SceneError;
use crate::geometry::{Fp, Vec3f};
use crate::scene::{Material, MaterialId, Scene, SceneBuilder, Triangle};

/// Name of the object the crystal toggle switches to glass.
pub const DEMO_CRYSTAL_OBJECT: &str = "orb";

/// Viewpoint framing the built-in scene from the open side.
pub fn demo_camera(aspect_ratio: Fp) -> Camera {
    Camera::new(Vec3f::new(0.0, 1.0, 5.5), Vec3f::new(0.0, 0.5, 0.0), 40.0, aspect_ratio)
}

pub fn demo_scene() -> Result<Scene, SceneError> {
    let mut builder = SceneBuilder::new();
    let white = builder.add_material(Material::diffuse(Vec3f::new(0.73, 0.73, 0.73)));
    let red = builder.add_material(Material::diffuse(Vec3f::new(0.65, 0.05, 0.05)));
    let green = builder.add_material(Material::diffuse(Vec3f::new(0.12, 0.45, 0.15)));
    let gold = builder.add_material(Material::metal(Vec3f::new(0.8, 0.6, 0.2), 0.15));
    let clay = builder.add_material(Material::diffuse(Vec3f::new(0.9, 0.55, 0.4)));
    let lamp = builder.add_material(Material::emissive(Vec3f::new(6.0, 6.0, 6.0)));

    builder.add_mesh(
        "floor",
        quad(
            [
                Vec3f::new(-2.0, -1.0, 2.0),
                Vec3f::new(2.0, -1.0, 2.0),
                Vec3f::new(2.0, -1.0, -2.0),
                Vec3f::new(-2.0, -1.0, -2.0),
            ],
            white,
        ),
    );
    builder.add_mesh(
        "backdrop",
        quad(
            [
                Vec3f::new(-2.0, -1.0, -2.0),
                Vec3f::new(2.0, -1.0, -2.0),
                Vec3f::new(2.0, 3.0, -2.0),
                Vec3f::new(-2.0, 3.0, -2.0),
            ],
            white,
        ),
    );
    builder.add_mesh(
        "left_wall",
        quad(
            [
                Vec3f::new(-2.0, -1.0, 2.0),
                Vec3f::new(-2.0, -1.0, -2.0),
                Vec3f::new(-2.0, 3.0, -2.0),
                Vec3f::new(-2.0, 3.0, 2.0),
            ],
            red,
        ),
    );
    builder.add_mesh(
        "right_wall",
        quad(
            [
                Vec3f::new(2.0, -1.0, -2.0),
                Vec3f::new(2.0, -1.0, 2.0),
                Vec3f::new(2.0, 3.0, 2.0),
                Vec3f::new(2.0, 3.0, -2.0),
            ],
            green,
        ),
    );
    builder.add_mesh(
        "lamp",
        quad(
            [
                Vec3f::new(-0.5, 2.0, -0.5),
                Vec3f::new(0.5, 2.0, -0.5),
                Vec3f::new(0.5, 2.0, 0.5),
                Vec3f::new(-0.5, 2.0, 0.5),
            ],
            lamp,
        ),
    );
    builder.add_mesh(
        "block",
        cuboid(Vec3f::new(-1.3, -1.0, -1.2), Vec3f::new(-0.5, 0.2, -0.4), gold),
    );
    builder.add_mesh(
        DEMO_CRYSTAL_OBJECT,
        icosphere(Vec3f::new(0.5, -0.3, 0.0), 0.7, 3, clay),
    );
    builder.build()
}

/// Two triangles spanning a planar quad given counter-clockwise as seen from
/// the side the normal points to.
pub fn quad(corners: [Vec3f; 4], material: MaterialId) -> Vec<Triangle> {
    let [a, b, c, d] = corners;
    vec![
        Triangle::new([a, b, c], material),
        Triangle::new([a, c, d], material),
    ]
}

pub fn cuboid(min: Vec3f, max: Vec3f, material: MaterialId) -> Vec<Triangle> {
    let p = |x: bool, y: bool, z: bool| {
        Vec3f::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };
    let faces = [
        [p(false, false, true), p(true, false, true), p(true, true, true), p(false, true, true)],
        [p(true, false, false), p(false, false, false), p(false, true, false), p(true, true, false)],
        [p(false, false, false), p(false, false, true), p(false, true, true), p(false, true, false)],
        [p(true, false, true), p(true, false, false), p(true, true, false), p(true, true, true)],
        [p(false, true, true), p(true, true, true), p(true, true, false), p(false, true, false)],
        [p(false, false, false), p(true, false, false), p(true, false, true), p(false, false, true)],
    ];
    faces
        .into_iter()
        .flat_map(|corners| quad(corners, material))
        .collect()
}

/// Subdivided icosahedron with smooth per-vertex normals.
pub fn icosphere(center: Vec3f, radius: Fp, subdivisions: u32, material: MaterialId) -> Vec<Triangle> {
    let t = (1.0 + (5.0 as Fp).sqrt()) / 2.0;
    let mut vertices: Vec<Vec3f> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vec3f::new(x, y, z).normalize())
    .collect();
    let mut indices: Vec<[usize; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints = HashMap::<(usize, usize), usize>::new();
        let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Vec3f>| {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                vertices.push(((vertices[a] + vertices[b]) * 0.5).normalize());
                vertices.len() - 1
            })
        };
        indices = indices
            .iter()
            .flat_map(|&[a, b, c]| {
                let ab = midpoint(a, b, &mut vertices);
                let bc = midpoint(b, c, &mut vertices);
                let ca = midpoint(c, a, &mut vertices);
                [[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]
            })
            .collect();
    }

    indices
        .iter()
        .map(|&[a, b, c]| {
            let normals = [vertices[a], vertices[b], vertices[c]];
            Triangle::with_normals(
                normals.map(|n| center + n * radius),
                normals,
                material,
            )
        })
        .collect()
}
