//! Per-instance skeleton state: bone transforms in, skinning matrices out.
//!
//! The `Skeleton` definition is shared; everything mutable lives here and
//! is overwritten in place each bake.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::assets::clip::compose_rotation;
use crate::assets::fbx::LocalPose;
use crate::assets::skeleton::{Joint, Skeleton};

/// Local transform of one joint for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl BoneTransform {
    /// The static pose of a model.
    pub fn from_pose(pose: &LocalPose) -> Self {
        Self {
            position: pose.position,
            rotation: compose_rotation(pose.rotation, pose.pre_rotation),
            scale: pose.scale,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        local_matrix(self)
    }
}

/// Column-major TRS matrix; scale is folded into the rotation columns.
pub fn local_matrix(t: &BoneTransform) -> Mat4 {
    let q = t.rotation;
    let (x, y, z, w) = (q.x, q.y, q.z, q.w);
    let (x2, y2, z2) = (x + x, y + y, z + z);
    let (xx, xy, xz) = (x * x2, x * y2, x * z2);
    let (yy, yz, zz) = (y * y2, y * z2, z * z2);
    let (wx, wy, wz) = (w * x2, w * y2, w * z2);
    let s = t.scale;

    Mat4::from_cols(
        Vec4::new((1.0 - (yy + zz)) * s.x, (xy + wz) * s.x, (xz - wy) * s.x, 0.0),
        Vec4::new((xy - wz) * s.y, (1.0 - (xx + zz)) * s.y, (yz + wx) * s.y, 0.0),
        Vec4::new((xz + wy) * s.z, (yz - wx) * s.z, (1.0 - (xx + yy)) * s.z, 0.0),
        Vec4::new(t.position.x, t.position.y, t.position.z, 1.0),
    )
}

/// Compute world and final (skinning) matrices for a parent-first joint list.
///
/// Phase 1: `world[i] = world[parent] * local[i]` (or `local[i]` for roots).
/// Phase 2: `final[i] = world[i] * inverse_bind[i]` for joints with a bind
/// matrix; other final matrices are left as they are.
pub fn bake(
    joints: &[Joint],
    bone_transforms: &[BoneTransform],
    world: &mut [Mat4],
    finals: &mut [Mat4],
) {
    for (i, (joint, transform)) in joints.iter().zip(bone_transforms).enumerate() {
        let local = local_matrix(transform);
        world[i] = match joint.parent {
            Some(p) => {
                debug_assert!(p < i, "joint {} baked before its parent {}", i, p);
                world[p] * local
            }
            None => local,
        };
    }

    for (i, joint) in joints.iter().enumerate() {
        if let Some(inverse_bind) = joint.inverse_bind_matrix {
            finals[i] = world[i] * inverse_bind;
        }
    }
}

/// Skeleton instance attached to one skinned entity.
#[derive(Debug, Clone)]
pub struct SkeletonComponent {
    skeleton: Arc<Skeleton>,
    bone_transforms: Vec<BoneTransform>,
    world_matrices: Vec<Mat4>,
    final_matrices: Vec<Mat4>,
    /// Set when any bone transform changes, cleared by `bake`.
    dirty: bool,
    bake_count: u64,
}

impl SkeletonComponent {
    /// Create an instance in its rest pose, dirty so the first bake runs.
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        let n = skeleton.len();
        let bone_transforms = skeleton
            .joints()
            .iter()
            .map(|j| BoneTransform::from_pose(&j.rest))
            .collect();
        Self {
            skeleton,
            bone_transforms,
            world_matrices: vec![Mat4::IDENTITY; n],
            final_matrices: vec![Mat4::IDENTITY; n],
            dirty: true,
            bake_count: 0,
        }
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    pub fn joint_count(&self) -> usize {
        self.bone_transforms.len()
    }

    pub fn bone_transforms(&self) -> &[BoneTransform] {
        &self.bone_transforms
    }

    /// Mutable bone transforms. Marks the skeleton dirty.
    pub fn bone_transforms_mut(&mut self) -> &mut [BoneTransform] {
        self.dirty = true;
        &mut self.bone_transforms
    }

    /// Replace one bone transform. Out-of-range joints are ignored.
    pub fn set_bone_transform(&mut self, joint: usize, transform: BoneTransform) {
        if let Some(slot) = self.bone_transforms.get_mut(joint) {
            *slot = transform;
            self.dirty = true;
        }
    }

    /// Recompute matrices if any bone changed. Returns whether a bake ran.
    pub fn bake(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        bake(
            self.skeleton.joints(),
            &self.bone_transforms,
            &mut self.world_matrices,
            &mut self.final_matrices,
        );
        self.dirty = false;
        self.bake_count += 1;
        true
    }

    /// Bone space -> model space, one per joint.
    pub fn world_matrices(&self) -> &[Mat4] {
        &self.world_matrices
    }

    /// Skinning matrices for the GPU, one per joint.
    pub fn final_matrices(&self) -> &[Mat4] {
        &self.final_matrices
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Number of bakes that actually ran.
    pub fn bake_count(&self) -> u64 {
        self.bake_count
    }
}
