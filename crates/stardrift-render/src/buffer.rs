//! Instance buffers for point-sprite rendering.

use bytemuck::Pod;
use wgpu::util::DeviceExt;

/// A vertex buffer holding per-instance data, drawn as one quad per instance.
pub struct InstanceBuffer {
    buffer: wgpu::Buffer,
    capacity: u32,
    count: u32,
    stride: u64,
}

impl InstanceBuffer {
    /// Create a buffer initialized with `data` that can be rewritten in place
    /// with up to `data.len()` instances.
    pub fn from_slice<T: Pod>(device: &wgpu::Device, label: &str, data: &[T]) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            buffer,
            capacity: data.len() as u32,
            count: data.len() as u32,
            stride: std::mem::size_of::<T>() as u64,
        }
    }

    /// Overwrite the buffer contents. Instances past the capacity are dropped
    /// with a warning; the draw count follows what was written.
    pub fn write<T: Pod>(&mut self, queue: &wgpu::Queue, data: &[T]) {
        debug_assert_eq!(std::mem::size_of::<T>() as u64, self.stride);

        let n = data.len().min(self.capacity as usize);
        if n < data.len() {
            log::warn!(
                "Instance buffer overflow: {} instances, capacity {}",
                data.len(),
                self.capacity
            );
        }
        if n > 0 {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&data[..n]));
        }
        self.count = n as u32;
    }

    /// Bind as vertex buffer `slot` and draw six vertices per instance.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>, slot: u32) {
        if self.count == 0 {
            return;
        }
        render_pass.set_vertex_buffer(slot, self.buffer.slice(..self.count as u64 * self.stride));
        render_pass.draw(0..QUAD_VERTEX_COUNT, 0..self.count);
    }

    /// Number of instances that will be drawn.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Maximum number of instances.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Release the GPU memory immediately.
    pub fn destroy(&self) {
        self.buffer.destroy();
    }
}

/// Vertices per sprite quad (two triangles generated from `vertex_index`).
pub const QUAD_VERTEX_COUNT: u32 = 6;
