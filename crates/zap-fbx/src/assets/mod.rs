// assets/mod.rs
//
// Import-time pipeline: FBX decoding, skeleton, skin weights, clips.
// Everything here runs once per asset and produces immutable data.

pub mod clip;
pub mod fbx;
pub mod import;
pub mod options;
pub mod skeleton;
pub mod skinning;

pub use clip::{build_animation_clips, AnimationClip, AxisCurves, BoneChannels, BoneTrack};
pub use import::{import_fbx, ImportedModel, MeshData};
pub use options::{CompressionPolicy, ImportOptions};
pub use skeleton::{build_joints, Joint, Skeleton};
pub use skinning::{build_skinning_data, SkinningData, MAX_INFLUENCES};
