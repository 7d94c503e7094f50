//! GPU passes for the starfield and the nebula clouds.
//!
//! Both passes draw instanced point sprites with additive blending and no
//! depth test. The nebula renderer doubles as the [`CloudBackend`] that owns
//! each cloud's GPU buffers.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use stardrift_render::{
    GpuTexture, InstanceBuffer, PointInstance, PointSpritePipeline, ShaderError, ShaderLibrary,
    ShaderProgram, TextureError,
};
use wgpu::util::DeviceExt;

use crate::nebula::{CloudBackend, NebulaCloud, NebulaField};
use crate::sprite::SpriteBitmap;
use crate::starfield::{Starfield, StarfieldConfig};

/// Camera block and sprite-quad vertex helper shared by both programs.
macro_rules! sprite_prelude {
    () => {
        r#"
struct Camera {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    // (width, height, pixel_ratio, height / 2)
    viewport: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> camera: Camera;

struct SpriteOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

const MAX_POINT_PIXELS: f32 = 64.0;

fn sprite_vertex(view_pos: vec4<f32>, size: f32, vertex_index: u32) -> SpriteOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[vertex_index % 6u];

    // Size shrinks with distance; points at or behind the camera collapse.
    let depth = -view_pos.z;
    var pixels = 0.0;
    if (depth > 0.01) {
        pixels = min(size * camera.viewport.w / depth, MAX_POINT_PIXELS * camera.viewport.z);
    }

    var out: SpriteOutput;
    let clip = camera.proj * view_pos;
    let offset = corner * pixels / camera.viewport.xy * clip.w;
    out.clip_position = vec4<f32>(clip.xy + offset, clip.zw);
    out.uv = corner * 0.5 + vec2<f32>(0.5, 0.5);
    return out;
}
"#
    };
}

/// White stars with a linear radial falloff.
pub const STAR_SHADER: ShaderProgram = ShaderProgram {
    name: "starfield",
    version: 1,
    source: concat!(
        sprite_prelude!(),
        r#"
@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec3<f32>,
    @location(1) size: f32,
) -> SpriteOutput {
    return sprite_vertex(camera.view * vec4<f32>(position, 1.0), size, vertex_index);
}

@fragment
fn fs_main(in: SpriteOutput) -> @location(0) vec4<f32> {
    let dist = length(in.uv - vec2<f32>(0.5, 0.5));
    if (dist > 0.5) {
        discard;
    }
    let intensity = 1.0 - dist * 2.0;
    return vec4<f32>(vec3<f32>(intensity), intensity);
}
"#
    ),
};

/// Sprite-textured cloud particles tinted by the cloud color and opacity.
pub const NEBULA_SHADER: ShaderProgram = ShaderProgram {
    name: "nebula",
    version: 1,
    source: concat!(
        sprite_prelude!(),
        r#"
@group(1) @binding(0)
var sprite_texture: texture_2d<f32>;
@group(1) @binding(1)
var sprite_sampler: sampler;

struct Cloud {
    model: mat4x4<f32>,
    // rgb tint, a = effective opacity
    color: vec4<f32>,
};

@group(2) @binding(0)
var<uniform> cloud: Cloud;

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec3<f32>,
    @location(1) size: f32,
) -> SpriteOutput {
    let world = cloud.model * vec4<f32>(position, 1.0);
    return sprite_vertex(camera.view * world, size, vertex_index);
}

@fragment
fn fs_main(in: SpriteOutput) -> @location(0) vec4<f32> {
    let tex = textureSample(sprite_texture, sprite_sampler, in.uv);
    let alpha = tex.a * cloud.color.a;
    return vec4<f32>(cloud.color.rgb * tex.rgb * alpha, alpha);
}
"#
    ),
};

/// Draws the recycling star pool.
pub struct StarfieldRenderer {
    pipeline: PointSpritePipeline,
    instances: InstanceBuffer,
}

impl StarfieldRenderer {
    pub fn new(
        device: &wgpu::Device,
        shaders: &mut ShaderLibrary,
        surface_format: wgpu::TextureFormat,
        camera_layout: &wgpu::BindGroupLayout,
        config: &StarfieldConfig,
    ) -> Result<Self, ShaderError> {
        let module = shaders.load(device, &STAR_SHADER)?;
        let pipeline = PointSpritePipeline::new(
            device,
            "starfield-pipeline",
            &module,
            surface_format,
            &[camera_layout],
        );
        // Sized for the whole pool; positions arrive with the first update.
        let empty = vec![PointInstance::default(); config.count as usize];
        let instances = InstanceBuffer::from_slice(device, "star-instances", &empty);

        Ok(Self {
            pipeline,
            instances,
        })
    }

    /// Upload the current star positions.
    pub fn update(&mut self, queue: &wgpu::Queue, starfield: &Starfield) {
        self.instances.write(queue, starfield.instances());
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>, camera: &wgpu::BindGroup) {
        render_pass.set_pipeline(&self.pipeline.pipeline);
        render_pass.set_bind_group(0, camera, &[]);
        self.instances.draw(render_pass, 0);
    }

    pub fn destroy(&self) {
        self.instances.destroy();
    }
}

/// Per-cloud uniform: model matrix and tint with opacity in alpha.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CloudUniform {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl CloudUniform {
    pub fn from_cloud(cloud: &NebulaCloud) -> Self {
        let [r, g, b] = cloud.color;
        Self {
            model: cloud.model_matrix().to_cols_array_2d(),
            color: [r, g, b, cloud.opacity],
        }
    }
}

const CLOUD_UNIFORM_SIZE: u64 = std::mem::size_of::<CloudUniform>() as u64;

/// GPU resources owned by one live cloud.
pub struct CloudGpu {
    points: InstanceBuffer,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Draws nebula clouds and owns their GPU objects.
pub struct NebulaRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: PointSpritePipeline,
    cloud_layout: wgpu::BindGroupLayout,
    sprite: Option<GpuTexture>,
    live_handles: usize,
}

impl NebulaRenderer {
    /// Compile the nebula program and upload the shared sprite.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shaders: &mut ShaderLibrary,
        surface_format: wgpu::TextureFormat,
        camera_layout: &wgpu::BindGroupLayout,
        sprite: &SpriteBitmap,
    ) -> Result<Self, NebulaRendererError> {
        let module = shaders.load(device, &NEBULA_SHADER)?;

        let sprite_layout = GpuTexture::bind_group_layout(device);
        let sprite = GpuTexture::from_rgba8(
            device,
            queue,
            &sprite_layout,
            "nebula-sprite",
            sprite.size(),
            sprite.size(),
            sprite.pixels(),
        )?;

        let cloud_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cloud-bind-group-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(CLOUD_UNIFORM_SIZE),
                },
                count: None,
            }],
        });

        let pipeline = PointSpritePipeline::new(
            device,
            "nebula-pipeline",
            &module,
            surface_format,
            &[camera_layout, &sprite_layout, &cloud_layout],
        );

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            pipeline,
            cloud_layout,
            sprite: Some(sprite),
            live_handles: 0,
        })
    }

    /// Upload transform, tint and opacity for every live cloud.
    pub fn update(&self, field: &NebulaField<CloudGpu>) {
        for (cloud, gpu) in field.iter() {
            let uniform = CloudUniform::from_cloud(cloud);
            self.queue
                .write_buffer(&gpu.uniform, 0, bytemuck::bytes_of(&uniform));
        }
    }

    /// Draw every live cloud. Fully transparent clouds are skipped.
    pub fn draw(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        camera: &wgpu::BindGroup,
        field: &NebulaField<CloudGpu>,
    ) {
        let Some(sprite) = &self.sprite else {
            return;
        };
        render_pass.set_pipeline(&self.pipeline.pipeline);
        render_pass.set_bind_group(0, camera, &[]);
        render_pass.set_bind_group(1, &sprite.bind_group, &[]);

        for (cloud, gpu) in field.iter() {
            if cloud.opacity <= 0.0 {
                continue;
            }
            render_pass.set_bind_group(2, &gpu.bind_group, &[]);
            gpu.points.draw(render_pass, 0);
        }
    }

    /// Number of cloud handles attached and not yet released.
    pub fn live_handles(&self) -> usize {
        self.live_handles
    }

    /// Destroy the shared sprite texture. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(sprite) = self.sprite.take() {
            sprite.destroy();
            log::info!("Nebula sprite texture released");
        }
        if self.live_handles > 0 {
            log::warn!(
                "Nebula renderer disposed with {} cloud handles still attached",
                self.live_handles
            );
        }
    }
}

impl CloudBackend for NebulaRenderer {
    type Handle = CloudGpu;

    fn attach(&mut self, cloud: &NebulaCloud) -> CloudGpu {
        let points = InstanceBuffer::from_slice(
            &self.device,
            &format!("cloud-{}-points", cloud.id.0),
            cloud.points(),
        );
        let uniform = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("cloud-{}-uniform", cloud.id.0)),
                contents: bytemuck::bytes_of(&CloudUniform::from_cloud(cloud)),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud-bind-group"),
            layout: &self.cloud_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });

        self.live_handles += 1;
        CloudGpu {
            points,
            uniform,
            bind_group,
        }
    }

    fn release(&mut self, handle: CloudGpu) {
        handle.points.destroy();
        handle.uniform.destroy();
        self.live_handles = self.live_handles.saturating_sub(1);
    }
}

/// Errors from building the nebula renderer.
#[derive(Debug, thiserror::Error)]
pub enum NebulaRendererError {
    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Texture(#[from] TextureError),
}
