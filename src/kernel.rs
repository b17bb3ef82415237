//! Per-pixel ray tracing over a packed scene.
//!
//! CPU rendition of `shader.wgsl`: it reads the same `PackedScene` the GPU
//! receives, so the two agree pixel for pixel up to float rounding.

use rayon::prelude::*;

use crate::bvh;
use crate::hittable_list::{HIT_EPSILON, HittableList};
use crate::packing::{FrameUniforms, PackedScene, SceneUniforms};
use crate::ray::Ray;
use crate::sphere::Sphere;
use crate::vec3::Vec3;

/// Color of rays that hit nothing. Mirrored as `BACKGROUND` in `shader.wgsl`.
pub const BACKGROUND: Vec3 = Vec3::new(0.05, 0.05, 0.08);

/// One output pixel, rgba. Alpha is always 1.
pub type Color = [f32; 4];

/// How closest hits are searched.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Traversal {
    #[default]
    Bvh,
    BruteForce,
}

/// Ray through the center of pixel (x, y). Row 0 is the top of the image.
pub fn primary_ray(scene: &SceneUniforms, frame: &FrameUniforms, x: u32, y: u32) -> Ray {
    let width = frame.width as f32;
    let height = frame.height as f32;
    let offset_right = (x as f32 + 0.5 - width / 2.0) / width;
    let offset_up = (height / 2.0 - y as f32 - 0.5) * frame.pixel_aspect / width;

    let direction =
        (scene.cam_forward + scene.cam_right * offset_right + scene.cam_up * offset_up).normalize();
    Ray::new(scene.cam_pos, direction)
}

fn to_color(rgb: Vec3) -> Color {
    [rgb.x, rgb.y, rgb.z, 1.0]
}

/// Resolve one pixel against unpacked spheres.
pub fn shade_pixel(
    packed: &PackedScene,
    spheres: &[Sphere],
    frame: &FrameUniforms,
    traversal: Traversal,
    x: u32,
    y: u32,
) -> Color {
    let ray = primary_ray(&packed.uniforms, frame, x, y);
    let hit = match traversal {
        Traversal::Bvh => bvh::traverse(&packed.nodes, spheres, &ray),
        Traversal::BruteForce => HittableList::new(spheres).hit(&ray, HIT_EPSILON, f32::INFINITY),
    };
    to_color(hit.map_or(BACKGROUND, |h| spheres[h.sphere].color))
}

/// Spheres the uniform block says are live, converted back from GPU layout.
pub fn unpack_spheres(packed: &PackedScene) -> Vec<Sphere> {
    let count = packed.sphere_count().min(packed.spheres.len());
    packed.spheres[..count].iter().map(Sphere::from).collect()
}

/// Trace every pixel of `frame` into `out` (row-major, `width * height` long).
/// Rows are traced in parallel on the rayon pool.
pub fn render(packed: &PackedScene, frame: &FrameUniforms, traversal: Traversal, out: &mut [Color]) {
    let width = frame.width as usize;
    if width == 0 {
        return;
    }
    let spheres = unpack_spheres(packed);

    out.par_chunks_mut(width)
        .take(frame.height as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.iter_mut().enumerate() {
                *pixel = shade_pixel(packed, &spheres, frame, traversal, x as u32, y as u32);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::scene::Scene;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn center_ray_points_forward() {
        let scene = Scene::new(Vec::new(), Camera::new(Vec3::new(-5.0, 0.0, 0.0), 0.0, 0.0));
        let packed = PackedScene::pack(&scene);
        let frame = FrameUniforms::new(9, 9, 1.0);
        let ray = primary_ray(&packed.uniforms, &frame, 4, 4);
        assert!((ray.direction - Vec3::X).length() < 1e-6);
        assert_eq!(ray.origin, Vec3::new(-5.0, 0.0, 0.0));
    }

    #[test]
    fn top_row_looks_up_and_left_column_looks_left() {
        let scene = Scene::new(Vec::new(), Camera::new(Vec3::ZERO, 0.0, 0.0));
        let packed = PackedScene::pack(&scene);
        let frame = FrameUniforms::new(10, 10, 1.0);
        let top_left = primary_ray(&packed.uniforms, &frame, 0, 0);
        assert!(top_left.direction.z > 0.0);
        // right is -y, so looking left means +y
        assert!(top_left.direction.y > 0.0);
    }

    #[test]
    fn pixel_aspect_stretches_vertical_offsets() {
        let scene = Scene::new(Vec::new(), Camera::new(Vec3::ZERO, 0.0, 0.0));
        let packed = PackedScene::pack(&scene);
        let square = primary_ray(&packed.uniforms, &FrameUniforms::new(10, 10, 1.0), 5, 0);
        let tall = primary_ray(&packed.uniforms, &FrameUniforms::new(10, 10, 2.0), 5, 0);
        assert!(tall.direction.z > square.direction.z);
    }

    #[test]
    fn traversal_modes_agree() {
        let mut rng = StdRng::seed_from_u64(11);
        let scene = Scene::random(256, &mut rng, Camera::new(Vec3::new(-60.0, 0.0, 0.0), 0.0, 0.0));
        let packed = PackedScene::pack(&scene);
        let frame = FrameUniforms::new(48, 32, 1.0);
        let mut with_bvh = vec![[0.0; 4]; frame.pixel_count()];
        let mut brute = vec![[0.0; 4]; frame.pixel_count()];
        render(&packed, &frame, Traversal::Bvh, &mut with_bvh);
        render(&packed, &frame, Traversal::BruteForce, &mut brute);
        assert_eq!(with_bvh, brute);
        assert!(with_bvh.iter().any(|&c| c != to_color(BACKGROUND)));
    }
}
