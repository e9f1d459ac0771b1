use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::api::types::InstanceId;
use crate::assets::clip::AnimationClip;
use crate::assets::skeleton::Skeleton;
use crate::components::animation::AnimationComponent;
use crate::components::skeleton::SkeletonComponent;

/// One placed instance of an imported skinned model.
/// Owns all of its per-frame state; the skeleton definition is shared.
#[derive(Debug, Clone)]
pub struct SkinnedEntity {
    pub id: InstanceId,
    /// String tag for finding instances by name.
    pub tag: String,
    /// Inactive instances are neither animated nor baked.
    pub active: bool,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub skeleton: SkeletonComponent,
    /// Optional: a static instance keeps its rest pose.
    pub animation: Option<AnimationComponent>,
}

impl SkinnedEntity {
    /// Create an instance at the origin in its rest pose.
    pub fn new(id: InstanceId, skeleton: Arc<Skeleton>) -> Self {
        Self {
            id,
            tag: String::new(),
            active: true,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            skeleton: SkeletonComponent::new(skeleton),
            animation: None,
        }
    }

    /// Model -> world matrix of the instance.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    // -- Builder pattern --

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_animation(mut self, animation: AnimationComponent) -> Self {
        self.animation = Some(animation);
        self
    }

    /// Attach a single clip and start playing it.
    pub fn with_clip(self, clip: Arc<AnimationClip>) -> Self {
        self.with_animation(AnimationComponent::single(clip))
    }
}
