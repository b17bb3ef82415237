//! Where the kernel runs.
//!
//! The render loop only needs to hand over a scene snapshot, launch one
//! kernel invocation per pixel and get the color buffer back. Each backend
//! owns its device state; nothing here is global.

use std::sync::mpsc;

use log::{debug, info};

use crate::error::{RenderError, Result};
use crate::kernel::{self, Color, Traversal};
use crate::packing::{FrameUniforms, GpuNode, GpuSphere, PackedScene, SceneUniforms};

/// Kernel threads per workgroup along x and y. Must match `@workgroup_size` in `shader.wgsl`.
const WORKGROUP_SIZE: u32 = 8;

const COLOR_SIZE: u64 = std::mem::size_of::<Color>() as u64;

pub trait TraceBackend {
    fn name(&self) -> &'static str;

    /// Copy the frame's snapshot into backend-owned buffers, growing them as needed.
    /// The caller may mutate `scene` as soon as this returns.
    fn upload(&mut self, scene: &PackedScene, frame: &FrameUniforms) -> Result<()>;

    /// Run the kernel over the whole `width x height` grid of the last upload.
    fn dispatch(&mut self) -> Result<()>;

    /// Fetch the colors written by the last dispatch into `out`.
    fn read_colors(&mut self, out: &mut Vec<Color>) -> Result<()>;
}

/// Kernel on the rayon pool.
pub struct CpuBackend {
    traversal: Traversal,
    scene: PackedScene,
    frame: FrameUniforms,
    colors: Vec<Color>,
}

impl CpuBackend {
    pub fn new(traversal: Traversal) -> Self {
        Self {
            traversal,
            scene: PackedScene::default(),
            frame: FrameUniforms::default(),
            colors: Vec::new(),
        }
    }
}

impl TraceBackend for CpuBackend {
    fn name(&self) -> &'static str {
        match self.traversal {
            Traversal::Bvh => "cpu",
            Traversal::BruteForce => "cpu (brute force)",
        }
    }

    fn upload(&mut self, scene: &PackedScene, frame: &FrameUniforms) -> Result<()> {
        self.scene.clone_from(scene);
        self.frame = *frame;
        self.colors.resize(frame.pixel_count(), [0.0; 4]);
        Ok(())
    }

    fn dispatch(&mut self) -> Result<()> {
        kernel::render(&self.scene, &self.frame, self.traversal, &mut self.colors);
        Ok(())
    }

    fn read_colors(&mut self, out: &mut Vec<Color>) -> Result<()> {
        out.clear();
        out.extend_from_slice(&self.colors);
        Ok(())
    }
}

/// Kernel as a wgpu compute pipeline, colors read back through a staging buffer.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    scene_buffer: wgpu::Buffer,
    frame_buffer: wgpu::Buffer,
    buffers: SizedBuffers,
    bind_group: wgpu::BindGroup,
    frame: FrameUniforms,
}

/// Storage buffers whose size follows the scene and output resolution.
struct SizedBuffers {
    spheres: wgpu::Buffer,
    nodes: wgpu::Buffer,
    output: wgpu::Buffer,
    staging: wgpu::Buffer,
    sphere_capacity: usize,
    node_capacity: usize,
    pixel_capacity: usize,
}

impl SizedBuffers {
    fn new(device: &wgpu::Device, spheres: usize, nodes: usize, pixels: usize) -> Self {
        let sphere_capacity = spheres.max(1);
        let node_capacity = nodes.max(1);
        let pixel_capacity = pixels.max(1);
        let color_bytes = pixel_capacity as u64 * COLOR_SIZE;

        Self {
            spheres: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Sphere Buffer"),
                size: (sphere_capacity * std::mem::size_of::<GpuSphere>()) as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            nodes: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("BVH Node Buffer"),
                size: (node_capacity * std::mem::size_of::<GpuNode>()) as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            output: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Color Buffer"),
                size: color_bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            staging: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Staging Buffer"),
                size: color_bytes,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            sphere_capacity,
            node_capacity,
            pixel_capacity,
        }
    }

    fn fits(&self, spheres: usize, nodes: usize, pixels: usize) -> bool {
        spheres <= self.sphere_capacity && nodes <= self.node_capacity && pixels <= self.pixel_capacity
    }
}

impl GpuBackend {
    /// Pick an adapter, open a device and build the kernel pipeline.
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .map_err(|e| RenderError::NoAdapter(e.to_string()))?;

        let adapter_info = adapter.get_info();
        info!("adapter: {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await?;

        let limits = device.limits();
        debug!(
            "max storage binding: {} bytes, max workgroup invocations: {}",
            limits.max_storage_buffer_binding_size, limits.max_compute_invocations_per_workgroup
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Ray-Trace Kernel"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                uniform_entry(3),
                storage_entry(4, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Compute Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Uniform Buffer"),
            size: std::mem::size_of::<SceneUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size: std::mem::size_of::<FrameUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let buffers = SizedBuffers::new(&device, 1, 1, 1);
        let bind_group =
            create_bind_group(&device, &bind_group_layout, &scene_buffer, &frame_buffer, &buffers);

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            scene_buffer,
            frame_buffer,
            buffers,
            bind_group,
            frame: FrameUniforms::default(),
        })
    }

    fn color_bytes(&self) -> wgpu::BufferAddress {
        self.frame.pixel_count() as u64 * COLOR_SIZE
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    scene_buffer: &wgpu::Buffer,
    frame_buffer: &wgpu::Buffer,
    buffers: &SizedBuffers,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: scene_buffer.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: buffers.spheres.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 2, resource: buffers.nodes.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 3, resource: frame_buffer.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 4, resource: buffers.output.as_entire_binding() },
        ],
    })
}

impl TraceBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn upload(&mut self, scene: &PackedScene, frame: &FrameUniforms) -> Result<()> {
        let (spheres, nodes, pixels) = (scene.spheres.len(), scene.nodes.len(), frame.pixel_count());
        if !self.buffers.fits(spheres, nodes, pixels) {
            let grown = SizedBuffers::new(
                &self.device,
                spheres.max(self.buffers.sphere_capacity),
                nodes.max(self.buffers.node_capacity),
                pixels.max(self.buffers.pixel_capacity),
            );
            debug!(
                "growing gpu buffers: {} spheres, {} nodes, {} pixels",
                grown.sphere_capacity, grown.node_capacity, grown.pixel_capacity
            );
            self.bind_group = create_bind_group(
                &self.device,
                &self.bind_group_layout,
                &self.scene_buffer,
                &self.frame_buffer,
                &grown,
            );
            self.buffers = grown;
        }

        self.frame = *frame;
        self.queue.write_buffer(&self.scene_buffer, 0, scene.uniforms_bytes());
        self.queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(frame));
        if !scene.spheres.is_empty() {
            self.queue.write_buffer(&self.buffers.spheres, 0, scene.spheres_bytes());
        }
        self.queue.write_buffer(&self.buffers.nodes, 0, scene.nodes_bytes());
        Ok(())
    }

    fn dispatch(&mut self) -> Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Trace Encoder") });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
            cpass.set_pipeline(&self.pipeline);
            cpass.set_bind_group(0, &self.bind_group, &[]);
            cpass.dispatch_workgroups(
                self.frame.width.div_ceil(WORKGROUP_SIZE),
                self.frame.height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        encoder.copy_buffer_to_buffer(
            &self.buffers.output,
            0,
            &self.buffers.staging,
            0,
            self.color_bytes(),
        );
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_colors(&mut self, out: &mut Vec<Color>) -> Result<()> {
        let size = self.color_bytes();
        if size == 0 {
            out.clear();
            return Ok(());
        }

        let buffer_slice = self.buffers.staging.slice(..size);
        let (tx, rx) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| RenderError::Poll(e.to_string()))?;
        rx.recv().map_err(|e| RenderError::Poll(e.to_string()))??;

        {
            let data = buffer_slice.get_mapped_range();
            let colors: &[Color] = bytemuck::cast_slice(&data);
            out.clear();
            out.extend_from_slice(colors);
        }
        self.buffers.staging.unmap();
        Ok(())
    }
}
