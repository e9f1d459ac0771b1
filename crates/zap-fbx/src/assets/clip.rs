//! Animation curves, Euler composition and clip sampling.

use glam::{Quat, Vec3};

use super::fbx::{AnimationCurve, ChannelTarget, ConnectionGraph, FbxScene, LocalPose};
use super::skeleton::Skeleton;
use crate::api::types::ObjectId;
use crate::components::skeleton::BoneTransform;

/// Sample a curve at time `t` (seconds).
///
/// Linear between the bracketing keys, constant before the first key and
/// after the last. A NaN time samples the first key. Returns `None` for a
/// curve with no keys.
pub fn sample_curve(curve: &AnimationCurve, t: f32) -> Option<f32> {
    let times = &curve.key_times;
    let values = &curve.key_values;
    let (&first, &last) = (times.first()?, times.last()?);
    if t.is_nan() || t <= first {
        return values.first().copied();
    }
    if t >= last {
        return values.last().copied();
    }

    // First key strictly after t; t is inside (first, last) so 1 <= hi < len.
    let hi = times.partition_point(|&k| k <= t);
    let lo = hi - 1;
    let span = times[hi] - times[lo];
    if span <= 0.0 {
        return Some(values[hi]);
    }
    let alpha = (t - times[lo]) / span;
    Some(values[lo] + (values[hi] - values[lo]) * alpha)
}

/// Quaternion for XYZ Euler angles in degrees (X applied first).
///
/// Built directly from half-angle products, equal to `qz * qy * qx`.
pub fn euler_xyz_to_quat(degrees: Vec3) -> Quat {
    let half = degrees * (std::f32::consts::PI / 180.0) * 0.5;
    let (sx, cx) = half.x.sin_cos();
    let (sy, cy) = half.y.sin_cos();
    let (sz, cz) = half.z.sin_cos();

    Quat::from_xyzw(
        sx * cy * cz - cx * sy * sz,
        cx * sy * cz + sx * cy * sz,
        cx * cy * sz - sx * sy * cz,
        cx * cy * cz + sx * sy * sz,
    )
}

/// Local rotation of a bone: `pre ⊗ euler` when a non-zero pre-rotation exists.
pub fn compose_rotation(euler_degrees: Vec3, pre_rotation: Option<Vec3>) -> Quat {
    let local = euler_xyz_to_quat(euler_degrees);
    match pre_rotation {
        Some(pre) if pre != Vec3::ZERO => euler_xyz_to_quat(pre) * local,
        _ => local,
    }
}

/// Curves driving the three axes of one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisCurves {
    pub x: Option<AnimationCurve>,
    pub y: Option<AnimationCurve>,
    pub z: Option<AnimationCurve>,
}

impl AxisCurves {
    /// Sample each axis, falling back to `rest` for axes without keys.
    pub fn sample(&self, rest: Vec3, t: f32) -> Vec3 {
        let axis = |curve: &Option<AnimationCurve>, fallback: f32| {
            curve
                .as_ref()
                .and_then(|c| sample_curve(c, t))
                .unwrap_or(fallback)
        };
        Vec3::new(
            axis(&self.x, rest.x),
            axis(&self.y, rest.y),
            axis(&self.z, rest.z),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    fn curves(&self) -> impl Iterator<Item = &AnimationCurve> {
        [&self.x, &self.y, &self.z].into_iter().flatten()
    }
}

/// Translation, rotation (Euler degrees) and scale curves of one bone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneChannels {
    pub translation: AxisCurves,
    pub rotation: AxisCurves,
    pub scale: AxisCurves,
}

impl BoneChannels {
    fn channel_mut(&mut self, target: ChannelTarget) -> &mut AxisCurves {
        match target {
            ChannelTarget::Translation => &mut self.translation,
            ChannelTarget::Rotation => &mut self.rotation,
            ChannelTarget::Scaling => &mut self.scale,
        }
    }

    fn curves(&self) -> impl Iterator<Item = &AnimationCurve> {
        self.translation
            .curves()
            .chain(self.rotation.curves())
            .chain(self.scale.curves())
    }
}

/// Evaluate a bone's local transform at time `t`.
///
/// Axes without curves keep the model's static value, so a bone with no
/// scale curve keeps its authored scale (1 unless the file says otherwise).
pub fn sample_bone_transform(pose: &LocalPose, channels: &BoneChannels, t: f32) -> BoneTransform {
    let euler = channels.rotation.sample(pose.rotation, t);
    BoneTransform {
        position: channels.translation.sample(pose.position, t),
        rotation: compose_rotation(euler, pose.pre_rotation),
        scale: channels.scale.sample(pose.scale, t),
    }
}

/// Keyframe tracks of one joint.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneTrack {
    pub joint: usize,
    pub channels: BoneChannels,
}

/// A named set of per-joint tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds; the last key time of the clip's curves.
    pub duration: f32,
    /// Sorted by joint index.
    pub tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    pub fn track(&self, joint: usize) -> Option<&BoneTrack> {
        self.tracks
            .binary_search_by_key(&joint, |t| t.joint)
            .ok()
            .map(|i| &self.tracks[i])
    }

    /// Write the pose of every joint at time `t` into `out`.
    /// Joints without a track take their rest pose.
    pub fn sample_into(&self, skeleton: &Skeleton, t: f32, out: &mut [BoneTransform]) {
        for (slot, joint) in out.iter_mut().zip(skeleton.joints()) {
            *slot = BoneTransform::from_pose(&joint.rest);
        }
        for track in &self.tracks {
            if let (Some(slot), Some(joint)) = (out.get_mut(track.joint), skeleton.joint(track.joint)) {
                *slot = sample_bone_transform(&joint.rest, &track.channels, t);
            }
        }
    }
}

/// Gather the curves of `curve_nodes` that animate skeleton joints into a
/// clip. The duration is the last key time of those curves.
///
/// Returns `None` when no curve targets a joint.
pub fn build_animation_clip(
    scene: &FbxScene,
    graph: &ConnectionGraph,
    skeleton: &Skeleton,
    name: &str,
    curve_nodes: impl IntoIterator<Item = ObjectId>,
) -> Option<AnimationClip> {
    let mut tracks: Vec<BoneTrack> = Vec::new();

    for curve_node in curve_nodes {
        let Some((model, target)) = graph.curve_node_target(curve_node) else {
            continue;
        };
        let Some(joint) = skeleton.joint_of_model(model) else {
            log::debug!("fbx: curve node {} animates non-joint model {}", curve_node, model);
            continue;
        };
        let ids = graph.curves_of_node(curve_node);
        let fetch = |id: Option<_>| id.and_then(|id| scene.anim_curves.get(id)).cloned();

        let index = match tracks.iter().position(|t| t.joint == joint) {
            Some(i) => i,
            None => {
                tracks.push(BoneTrack {
                    joint,
                    channels: BoneChannels::default(),
                });
                tracks.len() - 1
            }
        };
        let channel = tracks[index].channels.channel_mut(target);
        channel.x = fetch(ids.x);
        channel.y = fetch(ids.y);
        channel.z = fetch(ids.z);
    }

    tracks.retain(|t| t.channels.curves().next().is_some());
    if tracks.is_empty() {
        return None;
    }
    tracks.sort_by_key(|t| t.joint);

    let duration = tracks
        .iter()
        .flat_map(|t| t.channels.curves())
        .filter_map(|c| c.key_times.last().copied())
        .fold(0.0f32, f32::max);

    log::info!(
        "fbx: clip `{}` animates {} of {} joints over {:.3}s",
        name,
        tracks.len(),
        skeleton.len(),
        duration
    );
    Some(AnimationClip {
        name: name.to_string(),
        duration,
        tracks,
    })
}

/// One clip per `AnimationStack`, built from the curve nodes on its layers.
///
/// Files whose curve nodes are not linked to any stack through a layer give
/// a single clip over every bound curve node, named after the first stack
/// (or `fallback_name` when there is none).
pub fn build_animation_clips(
    scene: &FbxScene,
    graph: &ConnectionGraph,
    skeleton: &Skeleton,
    fallback_name: &str,
) -> Vec<AnimationClip> {
    let mut clips: Vec<AnimationClip> = Vec::new();
    let mut linked = false;
    for stack in scene.anim_stacks.iter() {
        let nodes = graph.curve_nodes_of_stack(scene, stack.id);
        linked |= !nodes.is_empty();
        let name = take_name(&stack.name, fallback_name);
        if clips.iter().any(|c| c.name == name) {
            log::warn!("fbx: duplicate take name `{}`; keeping the first", name);
            continue;
        }
        clips.extend(build_animation_clip(scene, graph, skeleton, name, nodes));
    }

    if !linked {
        let name = scene
            .anim_stacks
            .iter()
            .next()
            .map_or(fallback_name, |stack| take_name(&stack.name, fallback_name));
        let nodes = graph.animated_channels().map(|(node, _, _)| node);
        clips.extend(build_animation_clip(scene, graph, skeleton, name, nodes));
    }
    clips
}

fn take_name<'a>(name: &'a str, fallback: &'a str) -> &'a str {
    if name.is_empty() {
        fallback
    } else {
        name
    }
}
