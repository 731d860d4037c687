pub mod aabb;
pub mod accumulation;
pub mod bvh;
pub mod camera;
pub mod controller;
pub mod demo_scene;
pub mod device;
pub mod distributions;
pub mod error;
pub mod geometry;
pub mod gltf_to_scene;
pub mod material;
pub mod output;
pub mod progress;
pub mod renderer;
pub mod rendering;
pub mod scene;
pub mod timing;
mod utils;
