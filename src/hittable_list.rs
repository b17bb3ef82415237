use crate::ray::Ray;
use crate::sphere::Sphere;

/// Rays must travel at least this far before a hit counts (self-intersection guard).
pub const HIT_EPSILON: f32 = 1e-3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HitRecord {
    pub t: f32,
    /// Index of the hit sphere in the slice that was traced.
    pub sphere: usize,
}

/// Brute-force closest hit over every sphere. Reference for the BVH path.
pub struct HittableList<'a> {
    pub objects: &'a [Sphere],
}

impl<'a> HittableList<'a> {
    pub fn new(objects: &'a [Sphere]) -> Self {
        HittableList { objects }
    }

    pub fn hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<HitRecord> {
        let mut hit_record: Option<HitRecord> = None;
        let mut closest_so_far = t_max;

        for (index, object) in self.objects.iter().enumerate() {
            if let Some(t) = object.intersect(ray, t_min, closest_so_far) {
                closest_so_far = t;
                hit_record = Some(HitRecord { t, sphere: index });
            }
        }
        hit_record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3::Vec3;

    #[test]
    fn reports_nearer_of_two_spheres() {
        let spheres = [
            Sphere::new(Vec3::new(5.0, 0.0, 0.0), 1.0, Vec3::X),
            Sphere::new(Vec3::new(2.0, 0.0, 0.0), 0.5, Vec3::Y),
        ];
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let hit = HittableList::new(&spheres).hit(&ray, HIT_EPSILON, f32::INFINITY).unwrap();
        assert_eq!(hit.sphere, 1);
        assert!((hit.t - 1.5).abs() < 1e-5);
    }

    #[test]
    fn empty_list_never_hits() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(HittableList::new(&[]).hit(&ray, HIT_EPSILON, f32::INFINITY), None);
    }
}
