//! Id graph over the `Connections` table.
//!
//! Every later pass joins objects through here: curve -> curve node ->
//! model, cluster -> bone, skin -> cluster, geometry -> skin.

use std::collections::HashMap;

use super::extract::{Connection, ConnectionKind, FbxScene};
use crate::api::types::ObjectId;

/// Model property a curve node drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelTarget {
    Translation,
    Rotation,
    Scaling,
}

impl ChannelTarget {
    /// Map an `Lcl ...` property name.
    pub fn from_property(property: &str) -> Option<Self> {
        match property {
            "Lcl Translation" => Some(Self::Translation),
            "Lcl Rotation" => Some(Self::Rotation),
            "Lcl Scaling" => Some(Self::Scaling),
            _ => None,
        }
    }
}

/// The up-to-three curves of one curve node, by axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisCurveIds {
    pub x: Option<ObjectId>,
    pub y: Option<ObjectId>,
    pub z: Option<ObjectId>,
}

/// Bidirectional lookups over the connections of one file.
#[derive(Debug, Default)]
pub struct ConnectionGraph {
    /// OO: object -> the objects it is connected to, in file order.
    parents: HashMap<ObjectId, Vec<ObjectId>>,
    /// OO: object -> the objects connected to it, in file order.
    children: HashMap<ObjectId, Vec<ObjectId>>,
    /// OP `Lcl *`: curve node -> (model, channel).
    curve_node_to_model: HashMap<ObjectId, (ObjectId, ChannelTarget)>,
    /// OP `d|X` / `d|Y` / `d|Z`: curve node -> curves.
    curve_node_to_curves: HashMap<ObjectId, AxisCurveIds>,
    /// Curve nodes in connection order, for deterministic iteration.
    curve_node_order: Vec<ObjectId>,
}

impl ConnectionGraph {
    pub fn new(connections: &[Connection]) -> Self {
        let mut graph = Self::default();
        for c in connections {
            match c.kind {
                ConnectionKind::ObjectObject => {
                    graph.parents.entry(c.from).or_default().push(c.to);
                    graph.children.entry(c.to).or_default().push(c.from);
                }
                ConnectionKind::ObjectProperty => graph.add_property_link(c),
            }
        }
        graph
    }

    fn add_property_link(&mut self, c: &Connection) {
        let Some(property) = c.property.as_deref() else { return };

        if property.contains("Lcl") {
            match ChannelTarget::from_property(property) {
                Some(target) => {
                    if self.curve_node_to_model.insert(c.from, (c.to, target)).is_none() {
                        self.curve_node_order.push(c.from);
                    }
                }
                None => log::debug!("fbx: unsupported channel `{}` on {}", property, c.to),
            }
            return;
        }

        let axes = self.curve_node_to_curves.entry(c.to).or_default();
        match property {
            "d|X" => axes.x = Some(c.from),
            "d|Y" => axes.y = Some(c.from),
            "d|Z" => axes.z = Some(c.from),
            _ => {}
        }
    }

    /// Objects `id` is connected to (OO, `id` is the source).
    pub fn parents_of(&self, id: ObjectId) -> &[ObjectId] {
        self.parents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Objects connected to `id` (OO, `id` is the destination).
    pub fn children_of(&self, id: ObjectId) -> &[ObjectId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The bone model that owns a cluster: an OO link whose destination is
    /// the cluster and whose source is a Model.
    pub fn bone_of_cluster(&self, scene: &FbxScene, cluster: ObjectId) -> Option<ObjectId> {
        self.children_of(cluster)
            .iter()
            .copied()
            .find(|&id| scene.models.contains(id))
    }

    /// Clusters of a skin, in connection order.
    pub fn clusters_of_skin(&self, scene: &FbxScene, skin: ObjectId) -> Vec<ObjectId> {
        self.children_of(skin)
            .iter()
            .copied()
            .filter(|&id| scene.clusters.contains(id))
            .collect()
    }

    /// Curve nodes of one take: stack <- layer <- curve node.
    pub fn curve_nodes_of_stack(&self, scene: &FbxScene, stack: ObjectId) -> Vec<ObjectId> {
        self.children_of(stack)
            .iter()
            .filter(|&&layer| scene.anim_layers.contains(layer))
            .flat_map(|&layer| self.children_of(layer))
            .copied()
            .filter(|&node| scene.curve_nodes.contains(node))
            .collect()
    }

    /// The parent Model of a model, if it has one below the scene root.
    pub fn parent_model_of(&self, scene: &FbxScene, model: ObjectId) -> Option<ObjectId> {
        self.parents_of(model)
            .iter()
            .copied()
            .find(|&id| !id.is_root() && scene.models.contains(id))
    }

    /// The skin deforming a geometry.
    pub fn skin_of_geometry(&self, scene: &FbxScene, geometry: ObjectId) -> Option<ObjectId> {
        self.children_of(geometry)
            .iter()
            .copied()
            .find(|&id| scene.skins.contains(id))
    }

    /// The model node a geometry is attached to.
    pub fn model_of_geometry(&self, scene: &FbxScene, geometry: ObjectId) -> Option<ObjectId> {
        self.parents_of(geometry)
            .iter()
            .copied()
            .find(|&id| scene.models.contains(id))
    }

    pub fn curve_node_target(&self, curve_node: ObjectId) -> Option<(ObjectId, ChannelTarget)> {
        self.curve_node_to_model.get(&curve_node).copied()
    }

    pub fn curves_of_node(&self, curve_node: ObjectId) -> AxisCurveIds {
        self.curve_node_to_curves
            .get(&curve_node)
            .copied()
            .unwrap_or_default()
    }

    /// Every curve node bound to a model channel, in connection order.
    pub fn animated_channels(&self) -> impl Iterator<Item = (ObjectId, ObjectId, ChannelTarget)> + '_ {
        self.curve_node_order.iter().filter_map(|&node| {
            self.curve_node_to_model
                .get(&node)
                .map(|&(model, target)| (node, model, target))
        })
    }
}
