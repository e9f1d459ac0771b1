//! Per-vertex joint influences for GPU skinning.
//!
//! Every vertex gets exactly four (joint, weight) slots. The strongest four
//! influences are kept and renormalized to sum to 1; unused slots are
//! joint 0 / weight 0.

use std::collections::HashMap;

use super::fbx::{Cluster, FbxScene, Geometry, Skin};
use crate::api::types::ObjectId;
use crate::core::error::FbxError;

pub const MAX_INFLUENCES: usize = 4;

/// Influences at or below this weight are dropped as noise.
pub const MIN_INFLUENCE_WEIGHT: f32 = 0.001;

/// Largest skeleton a `u8` joint index can address.
pub const MAX_JOINTS: usize = u8::MAX as usize + 1;

/// Fixed-width skin buffers, `MAX_INFLUENCES` entries per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinningData {
    pub joints: Vec<u8>,
    pub weights: Vec<f32>,
}

impl SkinningData {
    pub fn vertex_count(&self) -> usize {
        self.joints.len() / MAX_INFLUENCES
    }

    pub fn vertex_joints(&self, vertex: usize) -> &[u8] {
        &self.joints[vertex * MAX_INFLUENCES..(vertex + 1) * MAX_INFLUENCES]
    }

    pub fn vertex_weights(&self, vertex: usize) -> &[f32] {
        &self.weights[vertex * MAX_INFLUENCES..(vertex + 1) * MAX_INFLUENCES]
    }

    /// Largest joint index referenced by a weighted slot.
    pub fn max_joint(&self) -> Option<u8> {
        self.joints
            .iter()
            .zip(&self.weights)
            .filter(|(_, &w)| w > 0.0)
            .map(|(&j, _)| j)
            .max()
    }
}

#[derive(Debug, Clone, Copy)]
struct Influence {
    joint: usize,
    weight: f32,
}

/// Build the skin buffers of one geometry.
///
/// Clusters missing from `cluster_to_joint` are skipped with a warning.
/// Joint indices at or past `joint_count` reject the asset.
pub fn build_skinning_data(
    scene: &FbxScene,
    geometry: &Geometry,
    skin: &Skin,
    cluster_to_joint: &HashMap<ObjectId, usize>,
    joint_count: usize,
) -> Result<SkinningData, FbxError> {
    let clusters = skin.clusters.iter().filter_map(|&id| {
        let cluster = scene.clusters.get(id);
        if cluster.is_none() {
            log::warn!("fbx: skin {} references unknown cluster {}", skin.id, id);
        }
        cluster
    });
    skin_from_clusters(geometry.vertex_count, clusters, cluster_to_joint, joint_count)
}

pub(crate) fn skin_from_clusters<'a>(
    vertex_count: usize,
    clusters: impl IntoIterator<Item = &'a Cluster>,
    cluster_to_joint: &HashMap<ObjectId, usize>,
    joint_count: usize,
) -> Result<SkinningData, FbxError> {
    if joint_count > MAX_JOINTS {
        return Err(FbxError::TooManyJoints(joint_count));
    }

    let mut influences: Vec<Vec<Influence>> = vec![Vec::new(); vertex_count];

    for cluster in clusters {
        let Some(&joint) = cluster_to_joint.get(&cluster.id) else {
            log::warn!(
                "fbx: cluster {} (`{}`) has no joint, its weights are dropped",
                cluster.id,
                cluster.name
            );
            continue;
        };
        if joint >= joint_count {
            return Err(FbxError::JointIndexOutOfRange { joint, joint_count });
        }

        for (&vertex, &weight) in cluster.indexes.iter().zip(&cluster.weights) {
            if weight <= MIN_INFLUENCE_WEIGHT {
                continue;
            }
            match usize::try_from(vertex) {
                Ok(v) if v < vertex_count => influences[v].push(Influence { joint, weight }),
                _ => log::debug!("fbx: cluster {} weights missing vertex {}", cluster.id, vertex),
            }
        }
    }

    let mut out = SkinningData {
        joints: vec![0; vertex_count * MAX_INFLUENCES],
        weights: vec![0.0; vertex_count * MAX_INFLUENCES],
    };

    for (v, list) in influences.iter_mut().enumerate() {
        // Stable: equal weights keep cluster order.
        list.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        let kept = &list[..list.len().min(MAX_INFLUENCES)];
        let sum: f32 = kept.iter().map(|i| i.weight).sum();
        if sum <= 0.0 {
            continue;
        }

        let base = v * MAX_INFLUENCES;
        for (slot, influence) in kept.iter().enumerate() {
            out.joints[base + slot] = influence.joint as u8;
            out.weights[base + slot] = influence.weight / sum;
        }
        debug_assert!(
            (out.vertex_weights(v).iter().sum::<f32>() - 1.0).abs() < 1e-6,
            "vertex {} weights do not sum to 1",
            v
        );
    }

    Ok(out)
}
