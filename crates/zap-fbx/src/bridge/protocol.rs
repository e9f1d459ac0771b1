/// Joint palette buffer layout.
/// Must stay in sync with the shader-side reader.
///
/// Layout (all values in f32 / 4 bytes):
/// ```text
/// [Header: 8 floats]
/// [Instance table: max_instances × 4 floats]
/// [Palette: max_palette_joints × 16 floats]
/// ```
///
/// Palette matrices are column-major 4×4. An instance's matrices are
/// contiguous, starting at the joint offset stored in its table entry.

use crate::api::runtime::RuntimeConfig;

/// Number of floats in the header section.
pub const HEADER_FLOATS: usize = 8;

/// Header field indices.
pub const HEADER_LOCK: usize = 0;
pub const HEADER_FRAME_COUNTER: usize = 1;
pub const HEADER_MAX_INSTANCES: usize = 2;
pub const HEADER_INSTANCE_COUNT: usize = 3;
pub const HEADER_MAX_PALETTE_JOINTS: usize = 4;
pub const HEADER_PALETTE_JOINT_COUNT: usize = 5;
pub const HEADER_PROTOCOL_VERSION: usize = 6;

/// Protocol version written into the header.
pub const PROTOCOL_VERSION: f32 = 1.0;

/// Floats per instance table entry: instance id, first joint, joint count, pad.
pub const INSTANCE_ENTRY_FLOATS: usize = 4;

/// Floats per joint matrix.
pub const JOINT_MATRIX_FLOATS: usize = 16;

/// Buffer layout computed from runtime capacities.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteLayout {
    pub max_instances: usize,
    /// Joint matrices across all instances in one frame.
    pub max_palette_joints: usize,

    pub instance_table_floats: usize,
    pub palette_floats: usize,

    /// Offset (in floats) where the instance table begins.
    pub instance_table_offset: usize,
    /// Offset (in floats) where joint matrices begin.
    pub palette_offset: usize,

    pub buffer_total_floats: usize,
    pub buffer_total_bytes: usize,
}

impl PaletteLayout {
    pub fn new(max_instances: usize, max_palette_joints: usize) -> Self {
        let instance_table_floats = max_instances * INSTANCE_ENTRY_FLOATS;
        let palette_floats = max_palette_joints * JOINT_MATRIX_FLOATS;

        let instance_table_offset = HEADER_FLOATS;
        let palette_offset = instance_table_offset + instance_table_floats;
        let buffer_total_floats = palette_offset + palette_floats;

        Self {
            max_instances,
            max_palette_joints,
            instance_table_floats,
            palette_floats,
            instance_table_offset,
            palette_offset,
            buffer_total_floats,
            buffer_total_bytes: buffer_total_floats * 4,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.max_instances, config.max_palette_joints)
    }

    /// Float offset of joint `joint` in the palette section.
    pub fn joint_offset(&self, joint: usize) -> usize {
        self.palette_offset + joint * JOINT_MATRIX_FLOATS
    }

    /// Float offset of instance table entry `slot`.
    pub fn entry_offset(&self, slot: usize) -> usize {
        self.instance_table_offset + slot * INSTANCE_ENTRY_FLOATS
    }
}
