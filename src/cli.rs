use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn parse_vec3(s: &str) -> Result<[f32; 3], String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("`{p}`: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    match parts[..] {
        [x, y, z] => Ok([x, y, z]),
        _ => Err(format!("expected `x,y,z`, got `{s}`")),
    }
}

/// Progressive path tracer over a triangle scene.
#[derive(Parser, Debug)]
#[command(name = "progressive-tracer", version)]
pub struct Args {
    /// glTF scene; the built-in scene is used when omitted
    pub scene: Option<PathBuf>,

    #[arg(long, default_value_t = 640)]
    pub width: u32,

    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Sample budget per pixel
    #[arg(long, default_value_t = 64)]
    pub max_samples: u32,

    #[arg(long, default_value_t = 8)]
    pub max_bounces: u32,

    /// Also write the hierarchy wireframe segments next to the image
    #[arg(long)]
    pub debug_bvh: bool,

    #[arg(long)]
    pub debug_normals: bool,

    /// Disable normal interpolation
    #[arg(long)]
    pub flat_shading: bool,

    /// Render the crystal object as glass
    #[arg(long)]
    pub crystal: bool,

    #[arg(long, default_value = "orb")]
    pub crystal_object: String,

    /// Camera position as `x,y,z`; overrides the scene camera
    #[arg(long, value_parser = parse_vec3)]
    pub look_from: Option<[f32; 3]>,

    #[arg(long, value_parser = parse_vec3)]
    pub look_at: Option<[f32; 3]>,

    /// Vertical field of view in degrees
    #[arg(long)]
    pub vfov: Option<f32>,

    #[arg(long, default_value_t = 0.0)]
    pub defocus_angle: f32,

    /// Defaults to the distance between eye and target
    #[arg(long)]
    pub focus_dist: Option<f32>,

    /// Worker threads, 0 for one per core
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    #[arg(long)]
    pub no_timestamps: bool,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Simulated camera drag before accumulating, in degrees of yaw
    #[arg(long)]
    pub orbit: Option<f32>,

    /// `.ppm` is written directly, other extensions go through `image`
    #[arg(short, long, default_value = "output.png")]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vectors_and_defaults() {
        let args = Args::try_parse_from(["progressive-tracer", "--look-from", "1, 2,3", "--crystal"]).unwrap();
        assert_eq!(args.look_from, Some([1.0, 2.0, 3.0]));
        assert_eq!(args.look_at, None);
        assert!(args.crystal);
        assert_eq!(args.crystal_object, "orb");
        assert!(args.scene.is_none());
        assert!(Args::try_parse_from(["progressive-tracer", "--look-at", "1,2"]).is_err());
    }
}
