//! Serialize camera + BVH + spheres into the byte layouts `shader.wgsl` reads.
//!
//! All structs are `#[repr(C)]` and `Pod`, little-endian on every target wgpu
//! supports, and padded by hand to WGSL's 16-byte `vec3` alignment.

use bytemuck::{Pod, Zeroable};

use crate::bvh::BvhNode;
use crate::scene::Scene;
use crate::sphere::Sphere;
use crate::vec3::Vec3;

/// Uniform scene block (64 bytes).
///
/// `sphere_count` is stored as a float to fill the last lane of `cam_up`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub cam_pos: Vec3,
    pub _pad0: f32,
    pub cam_forward: Vec3,
    pub _pad1: f32,
    pub cam_right: Vec3,
    pub _pad2: f32,
    pub cam_up: Vec3,
    pub sphere_count: f32,
}

/// One sphere in the storage array (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuSphere {
    pub center: Vec3,
    pub _pad0: f32,
    pub color: Vec3,
    pub radius: f32,
}

impl From<&Sphere> for GpuSphere {
    fn from(s: &Sphere) -> Self {
        Self {
            center: s.center,
            _pad0: 0.0,
            color: s.color,
            radius: s.radius,
        }
    }
}

impl From<&GpuSphere> for Sphere {
    fn from(s: &GpuSphere) -> Self {
        Sphere::new(s.center, s.radius, s.color)
    }
}

/// BVH nodes are already laid out for the GPU.
pub type GpuNode = BvhNode;

/// Per-dispatch output geometry (16 bytes). Not part of the scene snapshot.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub width: u32,
    pub height: u32,
    pub pixel_aspect: f32,
    pub _pad0: u32,
}

impl FrameUniforms {
    pub fn new(width: u32, height: u32, pixel_aspect: f32) -> Self {
        Self {
            width,
            height,
            pixel_aspect,
            _pad0: 0,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One frame's worth of scene data, ready for upload.
#[derive(Clone, Debug, Default)]
pub struct PackedScene {
    pub uniforms: SceneUniforms,
    pub spheres: Vec<GpuSphere>,
    pub nodes: Vec<GpuNode>,
}

impl PackedScene {
    pub fn pack(scene: &Scene) -> Self {
        let mut packed = Self::default();
        packed.pack_into(scene);
        packed
    }

    /// Overwrite this snapshot with `scene`, reusing the allocations.
    pub fn pack_into(&mut self, scene: &Scene) {
        let camera = scene.camera();
        self.uniforms = SceneUniforms {
            cam_pos: camera.position,
            _pad0: 0.0,
            cam_forward: camera.forward(),
            _pad1: 0.0,
            cam_right: camera.right(),
            _pad2: 0.0,
            cam_up: camera.up(),
            sphere_count: scene.spheres().len() as f32,
        };

        self.spheres.clear();
        self.spheres.extend(scene.spheres().iter().map(GpuSphere::from));

        self.nodes.clear();
        self.nodes.extend_from_slice(&scene.bvh().nodes);
    }

    pub fn sphere_count(&self) -> usize {
        self.uniforms.sphere_count as usize
    }

    pub fn uniforms_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.uniforms)
    }

    pub fn spheres_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.spheres)
    }

    pub fn nodes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;

    fn f32_at(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    /// Check that the WGSL struct `name` has `size` bytes and exactly `fields`
    /// at the given offsets, in declaration order.
    fn assert_wgsl_layout(
        module: &naga::Module,
        layouter: &naga::proc::Layouter,
        name: &str,
        size: usize,
        fields: &[(&str, usize)],
    ) {
        let (handle, ty) = module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some(name))
            .unwrap_or_else(|| panic!("shader has no struct {name}"));
        let naga::TypeInner::Struct { members, .. } = &ty.inner else {
            panic!("{name} is not a struct: {:?}", ty.inner);
        };

        assert_eq!(layouter[handle].size as usize, size, "size of {name}");
        let actual: Vec<(&str, usize)> = members
            .iter()
            .map(|m| (m.name.as_deref().unwrap_or(""), m.offset as usize))
            .collect();
        assert_eq!(actual, fields, "members of {name}");
    }

    #[test]
    fn shader_structs_match_packed_layouts() {
        use std::mem::{offset_of, size_of};

        let module = naga::front::wgsl::parse_str(include_str!("shader.wgsl")).unwrap();
        naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::default())
            .validate(&module)
            .unwrap();
        let mut layouter = naga::proc::Layouter::default();
        layouter.update(module.to_ctx()).unwrap();

        assert_wgsl_layout(
            &module,
            &layouter,
            "SceneData",
            size_of::<SceneUniforms>(),
            &[
                ("cam_pos", offset_of!(SceneUniforms, cam_pos)),
                ("cam_forward", offset_of!(SceneUniforms, cam_forward)),
                ("cam_right", offset_of!(SceneUniforms, cam_right)),
                ("cam_up", offset_of!(SceneUniforms, cam_up)),
                ("sphere_count", offset_of!(SceneUniforms, sphere_count)),
            ],
        );
        assert_wgsl_layout(
            &module,
            &layouter,
            "Sphere",
            size_of::<GpuSphere>(),
            &[
                ("center", offset_of!(GpuSphere, center)),
                ("color", offset_of!(GpuSphere, color)),
                ("radius", offset_of!(GpuSphere, radius)),
            ],
        );
        assert_wgsl_layout(
            &module,
            &layouter,
            "Node",
            size_of::<GpuNode>(),
            &[
                ("min_corner", offset_of!(BvhNode, min_corner)),
                ("left_child", offset_of!(BvhNode, left_child)),
                ("max_corner", offset_of!(BvhNode, max_corner)),
                ("sphere_count", offset_of!(BvhNode, sphere_count)),
            ],
        );
        assert_wgsl_layout(
            &module,
            &layouter,
            "FrameData",
            size_of::<FrameUniforms>(),
            &[
                ("width", offset_of!(FrameUniforms, width)),
                ("height", offset_of!(FrameUniforms, height)),
                ("pixel_aspect", offset_of!(FrameUniforms, pixel_aspect)),
                ("_pad0", offset_of!(FrameUniforms, _pad0)),
            ],
        );
    }

    #[test]
    fn struct_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 64);
        assert_eq!(std::mem::size_of::<GpuSphere>(), 32);
        assert_eq!(std::mem::size_of::<GpuNode>(), 32);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 16);
    }

    #[test]
    fn uniform_block_layout() {
        let scene = Scene::new(
            vec![Sphere::new(Vec3::ZERO, 1.0, Vec3::X); 3],
            Camera::new(Vec3::new(-5.0, 1.0, 2.0), 0.0, 0.0),
        );
        let packed = PackedScene::pack(&scene);
        let bytes = packed.uniforms_bytes();
        assert_eq!(bytes.len(), 64);
        assert_eq!([f32_at(bytes, 0), f32_at(bytes, 4), f32_at(bytes, 8)], [-5.0, 1.0, 2.0]);
        // forward = +x, right = -y, up = +z
        assert_eq!(f32_at(bytes, 16), 1.0);
        assert_eq!(f32_at(bytes, 36), -1.0);
        assert_eq!(f32_at(bytes, 56), 1.0);
        assert_eq!(f32_at(bytes, 60), 3.0);
        assert_eq!(packed.sphere_count(), 3);
    }

    #[test]
    fn sphere_and_node_layout() {
        let scene = Scene::new(
            vec![Sphere::new(Vec3::new(1.0, 2.0, 3.0), 0.5, Vec3::new(0.1, 0.2, 0.3))],
            Camera::new(Vec3::ZERO, 0.0, 0.0),
        );
        let packed = PackedScene::pack(&scene);

        let s = packed.spheres_bytes();
        assert_eq!(s.len(), 32);
        assert_eq!([f32_at(s, 0), f32_at(s, 4), f32_at(s, 8)], [1.0, 2.0, 3.0]);
        assert_eq!([f32_at(s, 16), f32_at(s, 20), f32_at(s, 24)], [0.1, 0.2, 0.3]);
        assert_eq!(f32_at(s, 28), 0.5);

        let n = packed.nodes_bytes();
        assert_eq!(n.len(), 32);
        assert_eq!([f32_at(n, 0), f32_at(n, 4), f32_at(n, 8)], [0.5, 1.5, 2.5]);
        assert_eq!(u32_at(n, 12), 0);
        assert_eq!([f32_at(n, 16), f32_at(n, 20), f32_at(n, 24)], [1.5, 2.5, 3.5]);
        assert_eq!(u32_at(n, 28), 1);
    }

    #[test]
    fn empty_scene_packs() {
        let scene = Scene::new(Vec::new(), Camera::new(Vec3::ZERO, 0.0, 0.0));
        let packed = PackedScene::pack(&scene);
        assert_eq!(packed.sphere_count(), 0);
        assert!(packed.spheres_bytes().is_empty());
        assert_eq!(packed.nodes.len(), 1);
    }

    #[test]
    fn repacking_is_deterministic_and_replaces_contents() {
        let mut scene = Scene::new(
            vec![Sphere::new(Vec3::ZERO, 1.0, Vec3::X); 5],
            Camera::new(Vec3::ZERO, 0.3, 0.2),
        );
        let mut packed = PackedScene::pack(&scene);
        let again = PackedScene::pack(&scene);
        assert_eq!(packed.uniforms_bytes(), again.uniforms_bytes());
        assert_eq!(packed.spheres_bytes(), again.spheres_bytes());
        assert_eq!(packed.nodes_bytes(), again.nodes_bytes());

        scene.set_spheres(vec![Sphere::new(Vec3::ZERO, 1.0, Vec3::Y)]);
        packed.pack_into(&scene);
        assert_eq!(packed.spheres.len(), 1);
        assert_eq!(packed.nodes.len(), 1);
    }
}
