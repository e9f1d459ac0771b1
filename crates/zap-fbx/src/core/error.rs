use thiserror::Error;

use crate::api::types::ObjectId;

/// Errors raised while importing an FBX asset.
///
/// Container errors carry the byte offset where decoding stopped.
/// Anything returned from here rejects the whole asset; per-element
/// degradations are logged instead.
#[derive(Debug, Error)]
pub enum FbxError {
    #[error("file is too short for an FBX header ({len} bytes)")]
    HeaderTooShort { len: usize },

    #[error("missing FBX binary magic (ASCII FBX is not supported)")]
    BadMagic,

    #[error("unsupported FBX version {0}")]
    UnsupportedVersion(u32),

    #[error("unexpected end of file at byte {offset} while reading {what}")]
    UnexpectedEof { offset: usize, what: &'static str },

    #[error("node at byte {offset} has invalid end offset {end}")]
    InvalidNodeEnd { offset: usize, end: u64 },

    #[error("node at byte {offset} is nested deeper than {limit} levels")]
    NestingTooDeep { offset: usize, limit: usize },

    #[error("unknown property type {tag:?} at byte {offset}")]
    UnknownPropertyType { offset: usize, tag: char },

    #[error("array property at byte {offset} could not be decoded: {reason}")]
    CorruptArray { offset: usize, reason: String },

    #[error("missing top-level section `{0}`")]
    MissingSection(&'static str),

    #[error("model {model} is its own ancestor")]
    CyclicHierarchy { model: ObjectId },

    #[error("joint index {joint} out of range for a skeleton of {joint_count} joints")]
    JointIndexOutOfRange { joint: usize, joint_count: usize },

    #[error("skeleton has {0} joints, at most 256 fit in a u8 joint index")]
    TooManyJoints(usize),
}
