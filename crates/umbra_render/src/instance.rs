//! Instance Buffers
//!
//! Per-instance transforms and timestamps for instanced geometry, together
//! with the previous frame's values (for motion vectors). Each array lives in
//! its own host buffer and is bound on the instanced node under a fixed name.
//!
//! | Input | Contents |
//! |-------|----------|
//! | `instance_transform_tex` | current model matrices |
//! | `instance_prev_transform_tex` | last frame's model matrices |
//! | `instance_time_tex` | current timestamps |
//! | `instance_prev_time_tex` | last frame's timestamps |

use glam::Mat4;

use crate::host::{BufferId, GraphicsHost, NodeId, ShaderInputValue};

/// Maximum instances per buffer
pub const MAX_INSTANCES: usize = 1000;

/// Shader input names, in buffer order
pub const INSTANCE_INPUTS: [&str; 4] = [
    "instance_transform_tex",
    "instance_prev_transform_tex",
    "instance_time_tex",
    "instance_prev_time_tex",
];

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Host buffers backing one instance set
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct InstanceBuffers {
    transforms: BufferId,
    prev_transforms: BufferId,
    times: BufferId,
    prev_times: BufferId,
}

/// Transforms and timestamps for a set of instances
#[derive(Debug)]
pub struct InstanceBuffer {
    name: String,
    transforms: Vec<[[f32; 4]; 4]>,
    prev_transforms: Vec<[[f32; 4]; 4]>,
    times: Vec<f32>,
    prev_times: Vec<f32>,
    buffers: Option<InstanceBuffers>,
    dirty: bool,
}

impl InstanceBuffer {
    /// Buffer for `count` instances (at most [`MAX_INSTANCES`])
    pub fn new(name: impl Into<String>, count: usize) -> Self {
        let name = name.into();
        let count = if count > MAX_INSTANCES {
            log::warn!(
                "Instance buffer '{}' asked for {} instances, clamping to {}",
                name,
                count,
                MAX_INSTANCES
            );
            MAX_INSTANCES
        } else {
            count
        };

        Self {
            name,
            transforms: vec![IDENTITY; count],
            prev_transforms: vec![IDENTITY; count],
            times: vec![0.0; count],
            prev_times: vec![0.0; count],
            buffers: None,
            dirty: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance count
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Whether there are changes not yet uploaded
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set an instance's current transform; `false` if out of range
    pub fn set_transform(&mut self, index: usize, transform: Mat4) -> bool {
        let Some(slot) = self.transforms.get_mut(index) else {
            return false;
        };
        *slot = transform.to_cols_array_2d();
        self.dirty = true;
        true
    }

    /// Set an instance's current timestamp; `false` if out of range
    pub fn set_time(&mut self, index: usize, time: f32) -> bool {
        let Some(slot) = self.times.get_mut(index) else {
            return false;
        };
        *slot = time;
        self.dirty = true;
        true
    }

    pub fn transform(&self, index: usize) -> Option<Mat4> {
        self.transforms.get(index).map(Mat4::from_cols_array_2d)
    }

    pub fn prev_transform(&self, index: usize) -> Option<Mat4> {
        self.prev_transforms.get(index).map(Mat4::from_cols_array_2d)
    }

    pub fn time(&self, index: usize) -> Option<f32> {
        self.times.get(index).copied()
    }

    pub fn prev_time(&self, index: usize) -> Option<f32> {
        self.prev_times.get(index).copied()
    }

    /// Current values become the previous frame's values
    pub fn begin_frame(&mut self) {
        self.prev_transforms.copy_from_slice(&self.transforms);
        self.prev_times.copy_from_slice(&self.times);
        self.dirty = true;
    }

    /// Upload to host buffers bound on `node`
    ///
    /// Buffers are created and bound on the first upload; later uploads only
    /// write data, and only when something changed.
    pub fn upload(&mut self, host: &mut dyn GraphicsHost, node: NodeId) {
        let buffers = match self.buffers {
            Some(buffers) => buffers,
            None => {
                let buffers = self.create_buffers(host, node);
                self.buffers = Some(buffers);
                buffers
            }
        };
        if !self.dirty {
            return;
        }

        host.write_buffer(buffers.transforms, bytemuck::cast_slice(&self.transforms));
        host.write_buffer(buffers.prev_transforms, bytemuck::cast_slice(&self.prev_transforms));
        host.write_buffer(buffers.times, bytemuck::cast_slice(&self.times));
        host.write_buffer(buffers.prev_times, bytemuck::cast_slice(&self.prev_times));
        self.dirty = false;
    }

    fn create_buffers(&self, host: &mut dyn GraphicsHost, node: NodeId) -> InstanceBuffers {
        let matrix_bytes = self.len() * core::mem::size_of::<[[f32; 4]; 4]>();
        let time_bytes = self.len() * core::mem::size_of::<f32>();

        let buffers = InstanceBuffers {
            transforms: host.make_buffer(&format!("{}_transforms", self.name), matrix_bytes),
            prev_transforms: host.make_buffer(&format!("{}_prev_transforms", self.name), matrix_bytes),
            times: host.make_buffer(&format!("{}_times", self.name), time_bytes),
            prev_times: host.make_buffer(&format!("{}_prev_times", self.name), time_bytes),
        };

        let ids = [
            buffers.transforms,
            buffers.prev_transforms,
            buffers.times,
            buffers.prev_times,
        ];
        for (input, buffer) in INSTANCE_INPUTS.iter().zip(ids) {
            host.set_shader_input(node, input, ShaderInputValue::Buffer(buffer));
        }

        log::debug!(
            "Instance buffer '{}' bound with {} instances",
            self.name,
            self.len()
        );
        buffers
    }
}
