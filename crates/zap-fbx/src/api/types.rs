use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of a skinned instance in a [`Scene`](crate::core::scene::Scene).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u32);

/// 64-bit FBX object id (Model, Geometry, Deformer, AnimationCurve, ...).
///
/// Kept as the exact signed 64-bit value the file stores; it is the join
/// key of the `Connections` table. Id 0 is the implicit scene root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i64);

impl ObjectId {
    /// The scene root every top-level object connects to.
    pub const ROOT: ObjectId = ObjectId(0);

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
