//! Skeleton construction from clusters and the model hierarchy.
//!
//! Joint indices are assigned exactly once, after a stable parent-first
//! sort. Vertex skin weights, clip tracks and the runtime bone arrays all
//! index joints through the `Skeleton` built here.

use std::collections::{HashMap, HashSet};

use glam::{DMat4, Mat4};

use super::clip::compose_rotation;
use super::fbx::{ConnectionGraph, FbxScene, LocalPose};
use crate::api::types::ObjectId;
use crate::core::error::FbxError;

/// One bone of the skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    /// Cluster that skins with this bone; `None` for ancestor bones that only
    /// carry hierarchy.
    pub cluster_id: Option<ObjectId>,
    pub bone_model_id: ObjectId,
    /// Model space -> bone space at bind time.
    pub inverse_bind_matrix: Option<Mat4>,
    /// Always smaller than this joint's own index.
    pub parent: Option<usize>,
    /// Static local transform of the bone model.
    pub rest: LocalPose,
}

impl Joint {
    /// Parent index with -1 for roots, as shaders and file formats expect.
    pub fn parent_index(&self) -> i32 {
        self.parent.map_or(-1, |p| p as i32)
    }
}

/// Ordered joint list plus the id lookups into it.
/// Immutable after import; share it between instances with `Arc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    joints: Vec<Joint>,
    cluster_to_joint: HashMap<ObjectId, usize>,
    model_to_joint: HashMap<ObjectId, usize>,
}

impl Skeleton {
    /// Build from joints already in parent-first order.
    pub fn from_joints(joints: Vec<Joint>) -> Self {
        let mut cluster_to_joint = HashMap::new();
        let mut model_to_joint = HashMap::new();
        for (i, joint) in joints.iter().enumerate() {
            debug_assert!(joint.parent.map_or(true, |p| p < i), "joint {} precedes its parent", i);
            if let Some(cluster) = joint.cluster_id {
                cluster_to_joint.insert(cluster, i);
            }
            model_to_joint.insert(joint.bone_model_id, i);
        }
        Self {
            joints,
            cluster_to_joint,
            model_to_joint,
        }
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Cluster id -> joint index, the map the skinning builder consumes.
    pub fn cluster_to_joint(&self) -> &HashMap<ObjectId, usize> {
        &self.cluster_to_joint
    }

    pub fn joint_of_cluster(&self, cluster: ObjectId) -> Option<usize> {
        self.cluster_to_joint.get(&cluster).copied()
    }

    pub fn joint_of_model(&self, model: ObjectId) -> Option<usize> {
        self.model_to_joint.get(&model).copied()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// Model-space matrices of the rest pose.
    pub fn rest_world_matrices(&self) -> Vec<Mat4> {
        let mut world: Vec<Mat4> = Vec::with_capacity(self.joints.len());
        for joint in &self.joints {
            let local = pose_matrix(&joint.rest);
            let m = match joint.parent {
                Some(p) => world[p] * local,
                None => local,
            };
            world.push(m);
        }
        world
    }
}

fn pose_matrix(pose: &LocalPose) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        pose.scale,
        compose_rotation(pose.rotation, pose.pre_rotation),
        pose.position,
    )
}

/// Candidate bone collected before ordering.
struct Bone {
    model: ObjectId,
    cluster: Option<ObjectId>,
}

/// Build the skeleton for every cluster in the file.
///
/// - A cluster's bone is the Model linked to it by an OO connection.
///   Clusters without one are skipped with a warning.
/// - Clusters naming the same bone share one joint; the first wins the
///   bind matrix.
/// - Every ancestor Model of a bone below the scene root is added as a
///   joint so world matrices include the full chain.
/// - A parent cycle rejects the asset.
pub fn build_joints(scene: &FbxScene, graph: &ConnectionGraph) -> Result<Skeleton, FbxError> {
    let mut bones: Vec<Bone> = Vec::new();
    let mut bone_of_model: HashMap<ObjectId, usize> = HashMap::new();
    let mut extra_clusters: Vec<(ObjectId, ObjectId)> = Vec::new();

    for cluster in scene.clusters.iter() {
        let Some(model) = graph.bone_of_cluster(scene, cluster.id) else {
            log::warn!(
                "fbx: cluster `{}` ({}) has no bone model; its weights are dropped",
                cluster.name,
                cluster.id
            );
            continue;
        };
        if bone_of_model.contains_key(&model) {
            extra_clusters.push((cluster.id, model));
            continue;
        }
        bone_of_model.insert(model, bones.len());
        bones.push(Bone {
            model,
            cluster: Some(cluster.id),
        });
    }

    // Pull in ancestors; the list grows while we walk it.
    let mut i = 0;
    while i < bones.len() {
        let mut seen = HashSet::from([bones[i].model]);
        let mut current = bones[i].model;
        while let Some(parent) = graph.parent_model_of(scene, current) {
            if !seen.insert(parent) {
                return Err(FbxError::CyclicHierarchy { model: parent });
            }
            if bone_of_model.contains_key(&parent) {
                break;
            }
            bone_of_model.insert(parent, bones.len());
            bones.push(Bone {
                model: parent,
                cluster: None,
            });
            current = parent;
        }
        i += 1;
    }
    check_acyclic(scene, graph, &bones)?;

    let parents: Vec<Option<usize>> = bones
        .iter()
        .map(|b| {
            graph
                .parent_model_of(scene, b.model)
                .and_then(|p| bone_of_model.get(&p).copied())
        })
        .collect();

    let order = parent_first_order(&parents);
    let mut new_index = vec![0usize; bones.len()];
    for (new, &old) in order.iter().enumerate() {
        new_index[old] = new;
    }

    let mut joints: Vec<Joint> = order
        .iter()
        .map(|&old| {
            let bone = &bones[old];
            let model = scene.models.get(bone.model);
            Joint {
                name: model.map(|m| m.name.clone()).unwrap_or_default(),
                cluster_id: bone.cluster,
                bone_model_id: bone.model,
                inverse_bind_matrix: None,
                parent: parents[old].map(|p| new_index[p]),
                rest: model.map(|m| m.pose()).unwrap_or_default(),
            }
        })
        .collect();

    // Bind matrices: from the cluster when it has them, else the rest pose.
    let rest_world = Skeleton::from_joints(joints.clone()).rest_world_matrices();
    for (joint, world) in joints.iter_mut().zip(&rest_world) {
        let Some(cluster) = joint.cluster_id.and_then(|id| scene.clusters.get(id)) else {
            continue;
        };
        joint.inverse_bind_matrix = Some(match cluster.transform_link {
            Some(link) => {
                let mesh = cluster.transform.unwrap_or(DMat4::IDENTITY);
                (link.inverse() * mesh).as_mat4()
            }
            None => world.inverse(),
        });
    }

    let mut skeleton = Skeleton::from_joints(joints);
    for (cluster, model) in extra_clusters {
        if let Some(&joint) = skeleton.model_to_joint.get(&model) {
            log::debug!("fbx: cluster {} shares joint {} with an earlier cluster", cluster, joint);
            skeleton.cluster_to_joint.insert(cluster, joint);
        }
    }

    log::info!(
        "fbx: skeleton with {} joints ({} skinning clusters)",
        skeleton.len(),
        skeleton.cluster_to_joint.len()
    );
    Ok(skeleton)
}

/// The ancestor walk stops early at known bones, so a loop made only of
/// already-collected bones would slip through. Walk every bone to a root.
fn check_acyclic(scene: &FbxScene, graph: &ConnectionGraph, bones: &[Bone]) -> Result<(), FbxError> {
    let mut rooted: HashSet<ObjectId> = HashSet::new();
    for bone in bones {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        let mut current = Some(bone.model);
        while let Some(model) = current {
            if rooted.contains(&model) {
                break;
            }
            if !on_path.insert(model) {
                return Err(FbxError::CyclicHierarchy { model });
            }
            path.push(model);
            current = graph.parent_model_of(scene, model);
        }
        rooted.extend(path);
    }
    Ok(())
}

/// Stable parent-first ordering: each bone keeps its collection order
/// unless a parent has to be moved in front of it.
fn parent_first_order(parents: &[Option<usize>]) -> Vec<usize> {
    let mut placed = vec![false; parents.len()];
    let mut order = Vec::with_capacity(parents.len());
    let mut chain = Vec::new();

    for start in 0..parents.len() {
        let mut current = Some(start);
        while let Some(i) = current {
            if placed[i] {
                break;
            }
            chain.push(i);
            current = parents[i];
        }
        while let Some(i) = chain.pop() {
            placed[i] = true;
            order.push(i);
        }
    }
    order
}
