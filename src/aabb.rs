// src/aabb.rs
use crate::ray::Ray;
use crate::vec3::Vec3;

/// Direction components smaller than this are treated as parallel to the slab.
const PARALLEL_EPSILON: f32 = 1e-8;

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn grow_point(&mut self, p: Vec3) {
        self.min = self.min.min(&p);
        self.max = self.max.max(&p);
    }

    pub fn grow(&mut self, other: &Aabb) {
        self.min = self.min.min(&other.min);
        self.max = self.max.max(&other.max);
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Longest axis (0=x, 1=y, 2=z).
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        other.is_empty()
            || (self.min.x <= other.min.x
                && self.min.y <= other.min.y
                && self.min.z <= other.min.z
                && self.max.x >= other.max.x
                && self.max.y >= other.max.y
                && self.max.z >= other.max.z)
    }

    /// Slab test. Returns the entry distance (clamped to 0 when the origin is
    /// inside) if the ray overlaps the box somewhere in `[0, t_max]`.
    pub fn intersect(&self, ray: &Ray, t_max: f32) -> Option<f32> {
        if self.is_empty() {
            return None;
        }

        let mut t_near = 0.0f32;
        let mut t_far = t_max;
        for axis in 0..3 {
            let o = ray.origin[axis];
            let d = ray.direction[axis];
            if d.abs() < PARALLEL_EPSILON {
                // Parallel: the slab never bounds t, the origin must already lie in it.
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inv;
            let mut t1 = (self.max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_near = t_near.max(t0);
            t_far = t_far.min(t1);
            if t_near > t_far {
                return None;
            }
        }
        Some(t_near)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn hit_from_outside_reports_entry() {
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let t = unit_box().intersect(&ray, f32::INFINITY).unwrap();
        assert!((t - 4.0).abs() < 1e-6);
    }

    #[test]
    fn origin_inside_enters_at_zero() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.3, -0.2, 0.9).normalize());
        assert_eq!(unit_box().intersect(&ray, f32::INFINITY), Some(0.0));
    }

    #[test]
    fn box_behind_origin_is_missed() {
        let ray = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::X);
        assert_eq!(unit_box().intersect(&ray, f32::INFINITY), None);
    }

    #[test]
    fn box_beyond_t_max_is_missed() {
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        assert_eq!(unit_box().intersect(&ray, 3.0), None);
    }

    #[test]
    fn axis_aligned_direction_does_not_divide_by_zero() {
        // y and z components are exactly zero.
        let inside = Ray::new(Vec3::new(-5.0, 0.5, -0.5), Vec3::X);
        assert!(unit_box().intersect(&inside, f32::INFINITY).is_some());

        let outside = Ray::new(Vec3::new(-5.0, 2.0, 0.0), Vec3::X);
        assert_eq!(unit_box().intersect(&outside, f32::INFINITY), None);
    }

    #[test]
    fn empty_box_is_never_hit() {
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        assert_eq!(Aabb::EMPTY.intersect(&ray, f32::INFINITY), None);
    }

    #[test]
    fn containment_and_growth() {
        let mut b = Aabb::EMPTY;
        b.grow_point(Vec3::new(1.0, 2.0, 3.0));
        b.grow_point(Vec3::new(-1.0, 0.0, 5.0));
        assert!(b.contains(&Aabb::new(Vec3::new(0.0, 1.0, 4.0), Vec3::new(0.5, 1.5, 4.5))));
        assert!(!b.contains(&unit_box()));
        assert_eq!(b.longest_axis(), 0);
    }
}
