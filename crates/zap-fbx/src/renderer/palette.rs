use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::api::types::InstanceId;
use crate::assets::import::MeshData;
use crate::bridge::protocol::{
    PaletteLayout, HEADER_FRAME_COUNTER, HEADER_INSTANCE_COUNT, HEADER_MAX_INSTANCES,
    HEADER_MAX_PALETTE_JOINTS, HEADER_PALETTE_JOINT_COUNT, HEADER_PROTOCOL_VERSION,
    INSTANCE_ENTRY_FLOATS, JOINT_MATRIX_FLOATS, PROTOCOL_VERSION,
};

/// Skinned vertex as uploaded to the GPU: 32 bytes stride.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SkinVertex {
    pub position: [f32; 3],
    /// Four joint indices into the instance's palette.
    pub joints: [u8; 4],
    /// Matching weights, summing to 1 (or all 0 for rigid vertices).
    pub weights: [f32; 4],
}

impl SkinVertex {
    pub const STRIDE_BYTES: usize = 32;

    /// Interleave a mesh's positions with its skin buffers.
    /// Rigid meshes get zero weights.
    pub fn from_mesh(mesh: &MeshData) -> Vec<SkinVertex> {
        mesh.positions
            .iter()
            .enumerate()
            .map(|(v, &position)| {
                let mut vertex = SkinVertex {
                    position,
                    ..Default::default()
                };
                if let Some(skin) = &mesh.skin {
                    vertex.joints.copy_from_slice(skin.vertex_joints(v));
                    vertex.weights.copy_from_slice(skin.vertex_weights(v));
                }
                vertex
            })
            .collect()
    }
}

/// One instance table entry, mirrored in the buffer as 4 floats.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PaletteEntry {
    pub instance: f32,
    pub first_joint: f32,
    pub joint_count: f32,
    pub _pad: f32,
}

/// Per-frame joint palette for every visible skinned instance, written into
/// one flat `f32` buffer laid out by `PaletteLayout`.
pub struct JointPalette {
    layout: PaletteLayout,
    buffer: Vec<f32>,
    instance_count: usize,
    joint_count: usize,
    frame: u32,
}

impl JointPalette {
    pub fn new(layout: PaletteLayout) -> Self {
        let mut buffer = vec![0.0; layout.buffer_total_floats];
        buffer[HEADER_MAX_INSTANCES] = layout.max_instances as f32;
        buffer[HEADER_MAX_PALETTE_JOINTS] = layout.max_palette_joints as f32;
        buffer[HEADER_PROTOCOL_VERSION] = PROTOCOL_VERSION;
        Self {
            layout,
            buffer,
            instance_count: 0,
            joint_count: 0,
            frame: 0,
        }
    }

    pub fn layout(&self) -> &PaletteLayout {
        &self.layout
    }

    /// Start a new frame: forget last frame's instances.
    pub fn clear(&mut self) {
        self.instance_count = 0;
        self.joint_count = 0;
        self.frame = self.frame.wrapping_add(1);
    }

    /// Append one instance's final matrices.
    /// Returns the index of its first joint, or `None` when the buffer is full.
    pub fn push(&mut self, instance: InstanceId, matrices: &[Mat4]) -> Option<usize> {
        if self.instance_count >= self.layout.max_instances
            || self.joint_count + matrices.len() > self.layout.max_palette_joints
        {
            log::warn!(
                "palette full, instance {} ({} joints) not drawn skinned this frame",
                instance.0,
                matrices.len()
            );
            return None;
        }

        let first = self.joint_count;
        let start = self.layout.joint_offset(first);
        let end = start + matrices.len() * JOINT_MATRIX_FLOATS;
        self.buffer[start..end].copy_from_slice(bytemuck::cast_slice(matrices));

        let entry = PaletteEntry {
            instance: instance.0 as f32,
            first_joint: first as f32,
            joint_count: matrices.len() as f32,
            _pad: 0.0,
        };
        let at = self.layout.entry_offset(self.instance_count);
        self.buffer[at..at + INSTANCE_ENTRY_FLOATS].copy_from_slice(bytemuck::cast_slice(&[entry]));

        self.instance_count += 1;
        self.joint_count += matrices.len();
        Some(first)
    }

    /// Write the header counts. Call after the last `push` of a frame.
    pub fn finish(&mut self) {
        self.buffer[HEADER_FRAME_COUNTER] = self.frame as f32;
        self.buffer[HEADER_INSTANCE_COUNT] = self.instance_count as f32;
        self.buffer[HEADER_PALETTE_JOINT_COUNT] = self.joint_count as f32;
    }

    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    pub fn entry(&self, slot: usize) -> Option<&PaletteEntry> {
        if slot >= self.instance_count {
            return None;
        }
        let at = self.layout.entry_offset(slot);
        let entries: &[PaletteEntry] = bytemuck::cast_slice(&self.buffer[at..at + INSTANCE_ENTRY_FLOATS]);
        entries.first()
    }

    /// Palette matrix `joint` of this frame.
    pub fn matrix(&self, joint: usize) -> Option<Mat4> {
        if joint >= self.joint_count {
            return None;
        }
        // The buffer is only f32-aligned, so copy out instead of casting.
        let start = self.layout.joint_offset(joint);
        Some(Mat4::from_cols_slice(&self.buffer[start..start + JOINT_MATRIX_FLOATS]))
    }

    /// The whole buffer, header included.
    pub fn as_floats(&self) -> &[f32] {
        &self.buffer
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.buffer)
    }
}
