// assets/fbx/mod.rs
//
// Binary FBX decoding: container reader, object extraction, connection graph.

pub mod connections;
pub mod extract;
pub mod node;
pub mod reader;

#[cfg(test)]
pub(crate) mod test_support;

pub use connections::{AxisCurveIds, ChannelTarget, ConnectionGraph};
pub use extract::{
    extract_scene, AnimationCurve, AnimationCurveNode, AnimationLayer, AnimationStack, Cluster,
    Connection, ConnectionKind, FbxScene, Geometry, LocalPose, Model, ObjectTable, Skin,
    FBX_TIME_UNITS_PER_SECOND,
};
pub use node::{ArrayData, ArrayKind, BinaryNode, Property};
pub use reader::{parse_fbx_binary, parse_fbx_binary_with, ReaderOptions};
