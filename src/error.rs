use thiserror::Error;

/// Configuration errors raised while assembling the geometry store. All of
/// them are fatal and surface before the first frame is rendered.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene has {count} objects, at most {max} are supported")]
    TooManyObjects { count: usize, max: usize },
    #[error("object `{object}` has {count} faces, at most {max} per mesh are supported")]
    TooManyFaces {
        object: String,
        count: usize,
        max: usize,
    },
    #[error("object `{object}` needs {count} hierarchy nodes, at most {max} per mesh are supported")]
    TooManyNodes {
        object: String,
        count: usize,
        max: usize,
    },
    #[error("object `{object}` references unknown material #{material}")]
    UnknownMaterial { object: String, material: usize },
    #[error("object `{object}` has no faces")]
    EmptyMesh { object: String },
    #[error("no object named `{name}` in the scene")]
    UnknownObject { name: String },
    #[error("unsupported glTF primitive in mesh `{mesh}`: {reason}")]
    UnsupportedPrimitive { mesh: String, reason: &'static str },
    #[error("failed to import glTF: {0}")]
    Gltf(#[from] gltf::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot render to a {width}x{height} surface")]
    ZeroSizedSurface { width: u32, height: u32 },
    #[error("failed to build the compute thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
