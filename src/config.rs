use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::error::{RenderError, Result};
use crate::scene::{Scene, random_spheres};
use crate::sphere::{Sphere, SphereConfig};
use crate::vec3::Vec3;

/// Scene used when no `--path` is given.
pub const DEFAULT_SCENE: &str = include_str!("scenes/random_field.json");

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SceneConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Height of one output cell divided by its width (terminal cells are ~2:1).
    #[serde(default = "default_pixel_aspect")]
    pub pixel_aspect: f32,
    #[serde(default)]
    pub camera: CameraConfig,
    /// Explicit geometry. When absent the scene is generated from `random`.
    #[serde(default)]
    pub spheres: Option<Vec<SphereConfig>>,
    #[serde(default)]
    pub random: RandomConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub position: [f32; 3],
    #[serde(default)]
    pub theta: f32,
    #[serde(default)]
    pub phi: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [-20.0, 0.0, 0.0],
            theta: 0.0,
            phi: 0.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RandomConfig {
    #[serde(default = "default_sphere_count")]
    pub count: usize,
    /// Fixed seed for reproducible scenes; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            count: default_sphere_count(),
            seed: None,
        }
    }
}

fn default_width() -> u32 {
    160
}

fn default_height() -> u32 {
    48
}

fn default_pixel_aspect() -> f32 {
    2.0
}

fn default_sphere_count() -> usize {
    1024
}

impl SceneConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SceneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Embedded default scene.
    pub fn embedded() -> Result<Self> {
        Self::from_json(DEFAULT_SCENE)
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "output size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.pixel_aspect.is_finite() && self.pixel_aspect > 0.0) {
            return Err(RenderError::InvalidConfig(format!(
                "pixel_aspect must be positive, got {}",
                self.pixel_aspect
            )));
        }
        Ok(())
    }

    pub fn camera(&self) -> Camera {
        Camera::new(
            Vec3::from_array(self.camera.position),
            self.camera.theta,
            self.camera.phi,
        )
    }

    /// Geometry for this config: the listed spheres, or a fresh random set.
    pub fn spheres(&self) -> Vec<Sphere> {
        match &self.spheres {
            Some(list) => list.iter().map(Sphere::from).collect(),
            None => self.random_spheres(),
        }
    }

    pub fn random_spheres(&self) -> Vec<Sphere> {
        let mut rng = match self.random.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        random_spheres(self.random.count, &mut rng)
    }

    /// A new random set of `random.count` spheres drawn from `rng`,
    /// ignoring `random.seed`. Explicit sphere lists have nothing to regenerate.
    pub fn regenerated_spheres<R: Rng>(&self, rng: &mut R) -> Option<Vec<Sphere>> {
        match self.spheres {
            Some(_) => None,
            None => Some(random_spheres(self.random.count, rng)),
        }
    }

    pub fn build_scene(&self) -> Scene {
        Scene::new(self.spheres(), self.camera())
    }
}

/// Command-line switches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub full_color: bool,
    pub verbose: bool,
    pub scene_path: Option<PathBuf>,
    /// Trace on the CPU with rayon instead of the GPU.
    pub cpu: bool,
    /// Skip the BVH and test every sphere (CPU only).
    pub no_bvh: bool,
    pub threads: Option<usize>,
    /// Render this many frames without touching the terminal, then exit.
    pub frames: Option<u32>,
    /// Write the last frame to this PPM file.
    pub snapshot: Option<PathBuf>,
}

impl RunOptions {
    pub fn from_args(args: &[String]) -> Self {
        let value_of = |flag: &str| {
            args.iter()
                .position(|arg| arg == flag)
                .and_then(|i| args.get(i + 1))
        };

        RunOptions {
            full_color: args.iter().any(|arg| arg == "--full-color"),
            verbose: args.iter().any(|arg| arg == "--verbose"),
            scene_path: value_of("--path").map(PathBuf::from),
            cpu: args.iter().any(|arg| arg == "--cpu"),
            no_bvh: args.iter().any(|arg| arg == "--no-bvh"),
            threads: value_of("--threads").and_then(|s| s.parse::<usize>().ok()),
            frames: value_of("--frames").and_then(|s| s.parse::<u32>().ok()),
            snapshot: value_of("--snapshot").map(PathBuf::from),
        }
    }

    pub fn scene_config(&self) -> Result<SceneConfig> {
        match &self.scene_path {
            Some(path) => SceneConfig::load(path),
            None => SceneConfig::embedded(),
        }
    }
}
