use log::info;
use rand::Rng;

use crate::bvh::Bvh;
use crate::camera::Camera;
use crate::sphere::Sphere;
use crate::vec3::Vec3;

/// Spheres plus the camera looking at them, with a BVH kept in sync with the
/// sphere set. Sphere order is owned by the BVH builder.
pub struct Scene {
    spheres: Vec<Sphere>,
    camera: Camera,
    bvh: Bvh,
}

impl Scene {
    pub fn new(mut spheres: Vec<Sphere>, camera: Camera) -> Self {
        let bvh = Bvh::build(&mut spheres);
        info!("scene: {} spheres, {} bvh nodes", spheres.len(), bvh.nodes.len());
        Self { spheres, camera, bvh }
    }

    /// `count` spheres scattered through a 100-unit cube around the origin.
    pub fn random<R: Rng>(count: usize, rng: &mut R, camera: Camera) -> Self {
        Self::new(random_spheres(count, rng), camera)
    }

    /// Replace the geometry and rebuild the BVH. The camera is kept.
    pub fn set_spheres(&mut self, mut spheres: Vec<Sphere>) {
        self.bvh = Bvh::build(&mut spheres);
        self.spheres = spheres;
        info!("scene rebuilt: {} spheres, {} bvh nodes", self.spheres.len(), self.bvh.nodes.len());
    }

    /// Spheres in BVH leaf order.
    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }
}

pub fn random_spheres<R: Rng>(count: usize, rng: &mut R) -> Vec<Sphere> {
    (0..count)
        .map(|_| {
            Sphere::new(
                Vec3::new(
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                ),
                rng.gen_range(0.1..2.0),
                Vec3::new(rng.gen_range(0.3..1.0), rng.gen_range(0.3..1.0), rng.gen_range(0.3..1.0)),
            )
        })
        .collect()
}
