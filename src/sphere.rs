// src/sphere.rs
use serde::{Deserialize, Serialize};

use crate::aabb::Aabb;
use crate::ray::Ray;
use crate::vec3::Vec3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub color: Vec3, // Linear rgb in [0, 1].
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, color: Vec3) -> Self {
        Self { center, radius, color }
    }

    /// Tight box around the sphere. Degenerate radii collapse to the center point.
    pub fn bounds(&self) -> Aabb {
        let r = Vec3::splat(self.radius.max(0.0));
        Aabb::new(self.center - r, self.center + r)
    }

    /// Nearest root of the ray/sphere quadratic inside the open interval `(t_min, t_max)`.
    pub fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<f32> {
        if self.radius <= 0.0 {
            return None;
        }

        let oc = self.center - ray.origin;
        let a = ray.direction.length_squared();
        let h = ray.direction.dot(&oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Find the nearest root that lies in the acceptable range
        let mut root = (h - sqrtd) / a;
        if root <= t_min || t_max <= root {
            root = (h + sqrtd) / a;
            if root <= t_min || t_max <= root {
                return None;
            }
        }
        Some(root)
    }
}

/// On-disk form of a sphere in scene files.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SphereConfig {
    pub center: [f32; 3],
    pub radius: f32,
    pub color: [f32; 3],
}

impl From<&SphereConfig> for Sphere {
    fn from(s: &SphereConfig) -> Self {
        Sphere::new(Vec3::from_array(s.center), s.radius, Vec3::from_array(s.color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Smallest positive root of |o + t d - c|^2 = r^2 computed in f64.
    fn closed_form(s: &Sphere, ray: &Ray, t_min: f64) -> Option<f64> {
        let o = [ray.origin.x as f64, ray.origin.y as f64, ray.origin.z as f64];
        let d = [ray.direction.x as f64, ray.direction.y as f64, ray.direction.z as f64];
        let c = [s.center.x as f64, s.center.y as f64, s.center.z as f64];
        let r = s.radius as f64;
        let oc = [o[0] - c[0], o[1] - c[1], o[2] - c[2]];
        let qa = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
        let qb = 2.0 * (oc[0] * d[0] + oc[1] * d[1] + oc[2] * d[2]);
        let qc = oc[0] * oc[0] + oc[1] * oc[1] + oc[2] * oc[2] - r * r;
        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 {
            return None;
        }
        let t0 = (-qb - disc.sqrt()) / (2.0 * qa);
        let t1 = (-qb + disc.sqrt()) / (2.0 * qa);
        [t0, t1].into_iter().find(|&t| t > t_min)
    }

    #[test]
    fn head_on_hit_at_front_surface() {
        let s = Sphere::new(Vec3::ZERO, 1.0, Vec3::X);
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let t = s.intersect(&ray, 1e-3, f32::INFINITY).unwrap();
        assert!((t - 4.0).abs() < 1e-5);
    }

    #[test]
    fn origin_inside_reports_far_root() {
        let s = Sphere::new(Vec3::ZERO, 2.0, Vec3::X);
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);
        let t = s.intersect(&ray, 1e-3, f32::INFINITY).unwrap();
        assert!((t - 2.0).abs() < 1e-5);
    }

    #[test]
    fn sphere_behind_ray_is_missed() {
        let s = Sphere::new(Vec3::new(-10.0, 0.0, 0.0), 1.0, Vec3::X);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(s.intersect(&ray, 1e-3, f32::INFINITY), None);
    }

    #[test]
    fn degenerate_radii_are_never_hit() {
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        for radius in [0.0, -1.0] {
            let s = Sphere::new(Vec3::ZERO, radius, Vec3::X);
            assert_eq!(s.intersect(&ray, 1e-3, f32::INFINITY), None);
        }
    }

    #[test]
    fn agrees_with_closed_form() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut hits = 0;
        for _ in 0..2000 {
            let s = Sphere::new(
                Vec3::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)),
                rng.gen_range(0.1..3.0),
                Vec3::ZERO,
            );
            let origin =
                Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0));
            // Aim near the sphere so a good share of rays hit.
            let spread = s.radius * 1.5;
            let target = s.center
                + Vec3::new(
                    rng.gen_range(-spread..spread),
                    rng.gen_range(-spread..spread),
                    rng.gen_range(-spread..spread),
                );
            let ray = Ray::new(origin, (target - origin).normalize());
            let expected = closed_form(&s, &ray, 1e-3);
            let actual = s.intersect(&ray, 1e-3, f32::INFINITY);
            match (expected, actual) {
                (Some(e), Some(a)) => {
                    hits += 1;
                    let rel = ((a as f64 - e) / e.abs().max(1.0)).abs();
                    assert!(rel < 1e-4, "t mismatch: {a} vs {e}");
                }
                (None, None) => {}
                // Grazing rays sit on the discriminant boundary; both answers are acceptable.
                (Some(_), None) | (None, Some(_)) => {
                    let oc = s.center - ray.origin;
                    let h = ray.direction.dot(&oc);
                    let disc = h * h - (oc.length_squared() - s.radius * s.radius);
                    assert!(disc.abs() < 1e-3, "disagreement away from tangency");
                }
            }
        }
        assert!(hits > 100);
    }
}
