//! wgpu rendering layer: surface management, camera, point-sprite pipelines,
//! shader programs, instance buffers and texture upload.

pub mod buffer;
pub mod camera;
pub mod gpu;
pub mod pass;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod texture;

pub use buffer::InstanceBuffer;
pub use camera::Camera;
pub use gpu::{RenderContext, RenderContextError, SurfaceError, init_render_context_blocking};
pub use pass::{DEEP_SPACE, FrameEncoder, RenderPassBuilder};
pub use pipeline::{
    ADDITIVE_BLENDING, CameraBinding, CameraUniform, PointInstance, PointSpritePipeline,
    camera_bind_group_layout,
};
pub use shader::{ShaderError, ShaderLibrary, ShaderProgram};
pub use surface::{PhysicalSize, SurfaceResizeEvent, SurfaceWrapper};
pub use texture::{GpuTexture, TextureError};
