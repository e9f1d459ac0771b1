//! Scene graph extraction: walks the generic node tree and recovers the
//! objects the skinning and animation passes need.

use std::collections::HashMap;

use glam::{DMat4, Vec3};

use super::connections::ConnectionGraph;
use super::node::{find_root, BinaryNode, Property};
use crate::api::types::ObjectId;
use crate::core::error::FbxError;

/// FBX time ticks per second (`KTime`).
pub const FBX_TIME_UNITS_PER_SECOND: i64 = 46_186_158_000;

/// Objects of one type in file order, addressable by id.
#[derive(Debug, Clone)]
pub struct ObjectTable<T> {
    items: Vec<T>,
    index: HashMap<ObjectId, usize>,
}

impl<T> Default for ObjectTable<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> ObjectTable<T> {
    /// Insert an object. A duplicate id keeps the first object.
    pub fn insert(&mut self, id: ObjectId, item: T) {
        if self.index.contains_key(&id) {
            log::warn!("fbx: duplicate object id {}; keeping the first", id);
            return;
        }
        self.index.insert(id, self.items.len());
        self.items.push(item);
    }

    pub fn get(&self, id: ObjectId) -> Option<&T> {
        self.index.get(&id).map(|&i| &self.items[i])
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Static local transform of a model, as authored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPose {
    pub position: Vec3,
    /// Euler angles in degrees, XYZ order.
    pub rotation: Vec3,
    pub scale: Vec3,
    /// Euler degrees composed before `rotation`, if the model has one.
    pub pre_rotation: Option<Vec3>,
}

impl Default for LocalPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            pre_rotation: None,
        }
    }
}

/// An FBX `Model` (bone, mesh node or null).
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub id: ObjectId,
    pub name: String,
    /// Sub-class such as `LimbNode`, `Mesh` or `Null`.
    pub kind: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub pre_rotation: Option<Vec3>,
}

impl Model {
    pub fn pose(&self) -> LocalPose {
        LocalPose {
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
            pre_rotation: self.pre_rotation,
        }
    }
}

/// An FBX `Geometry` (mesh vertex data).
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub id: ObjectId,
    pub name: String,
    pub vertex_count: usize,
    /// Flat xyz positions.
    pub vertices: Vec<f32>,
    /// Triangle list from fan-triangulated polygons.
    pub indices: Vec<u32>,
}

/// A `Skin` deformer: the clusters that deform one geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub id: ObjectId,
    pub name: String,
    /// Cluster ids in connection order.
    pub clusters: Vec<ObjectId>,
}

/// A `Cluster` sub-deformer: one bone's (vertex, weight) pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ObjectId,
    pub name: String,
    pub indexes: Vec<i32>,
    pub weights: Vec<f32>,
    /// Mesh global transform at bind time.
    pub transform: Option<DMat4>,
    /// Bone global transform at bind time.
    pub transform_link: Option<DMat4>,
}

/// One animated scalar channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationCurve {
    pub id: ObjectId,
    /// Key times in seconds, ascending.
    pub key_times: Vec<f32>,
    pub key_values: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationCurveNode {
    pub id: ObjectId,
    pub name: String,
}

/// One take. Its curve nodes hang off its layers.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationStack {
    pub id: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationLayer {
    pub id: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Object to object.
    ObjectObject,
    /// Object to a property of another object.
    ObjectProperty,
}

/// One row of the `Connections` section.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub kind: ConnectionKind,
    pub from: ObjectId,
    pub to: ObjectId,
    pub property: Option<String>,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, Default)]
pub struct FbxScene {
    pub models: ObjectTable<Model>,
    pub geometries: ObjectTable<Geometry>,
    pub skins: ObjectTable<Skin>,
    pub clusters: ObjectTable<Cluster>,
    pub anim_curves: ObjectTable<AnimationCurve>,
    pub curve_nodes: ObjectTable<AnimationCurveNode>,
    pub anim_stacks: ObjectTable<AnimationStack>,
    pub anim_layers: ObjectTable<AnimationLayer>,
    pub connections: Vec<Connection>,
}

/// Recover domain objects from the top-level node list.
pub fn extract_scene(nodes: &[BinaryNode]) -> Result<FbxScene, FbxError> {
    let objects = find_root(nodes, "Objects").ok_or(FbxError::MissingSection("Objects"))?;

    let mut scene = FbxScene::default();
    match find_root(nodes, "Connections") {
        Some(section) => {
            scene.connections = section.children_named("C").filter_map(read_connection).collect();
        }
        None => log::warn!("fbx: file has no Connections section; nothing will be linked"),
    }

    for node in &objects.children {
        let Some(id) = node.property(0).and_then(Property::as_i64).map(ObjectId) else {
            log::debug!("fbx: `{}` object without an id skipped", node.name);
            continue;
        };
        let name = node
            .property(1)
            .and_then(Property::as_str)
            .unwrap_or_default()
            .to_string();
        let class = node.property(2).and_then(Property::as_str).unwrap_or_default();

        match node.name.as_str() {
            "Model" => scene.models.insert(id, read_model(node, id, name, class)),
            "Geometry" => {
                if let Some(geometry) = read_geometry(node, id, name) {
                    scene.geometries.insert(id, geometry);
                }
            }
            "Deformer" => match class {
                "Skin" => scene.skins.insert(id, Skin { id, name, clusters: Vec::new() }),
                "Cluster" => scene.clusters.insert(id, read_cluster(node, id, name)),
                _ => {}
            },
            "AnimationCurve" => scene.anim_curves.insert(id, read_curve(node, id)),
            "AnimationCurveNode" => scene.curve_nodes.insert(id, AnimationCurveNode { id, name }),
            "AnimationStack" => scene.anim_stacks.insert(id, AnimationStack { id, name }),
            "AnimationLayer" => scene.anim_layers.insert(id, AnimationLayer { id, name }),
            _ => {}
        }
    }

    let graph = ConnectionGraph::new(&scene.connections);
    let owned: Vec<Vec<ObjectId>> = scene
        .skins
        .iter()
        .map(|skin| graph.clusters_of_skin(&scene, skin.id))
        .collect();
    for (skin, clusters) in scene.skins.items.iter_mut().zip(owned) {
        skin.clusters = clusters;
    }

    log::debug!(
        "fbx: extracted {} models, {} geometries, {} skins, {} clusters, {} curves, {} connections",
        scene.models.len(),
        scene.geometries.len(),
        scene.skins.len(),
        scene.clusters.len(),
        scene.anim_curves.len(),
        scene.connections.len()
    );
    Ok(scene)
}

fn read_connection(node: &BinaryNode) -> Option<Connection> {
    let kind = match node.property(0)?.as_str()? {
        "OO" => ConnectionKind::ObjectObject,
        "OP" => ConnectionKind::ObjectProperty,
        other => {
            log::debug!("fbx: `{}` connection ignored", other);
            return None;
        }
    };
    Some(Connection {
        kind,
        from: ObjectId(node.property(1)?.as_i64()?),
        to: ObjectId(node.property(2)?.as_i64()?),
        property: node.property(3).and_then(Property::as_str).map(str::to_string),
    })
}

/// Find a `Properties70` row by name.
fn property_row<'a>(node: &'a BinaryNode, name: &str) -> Option<&'a BinaryNode> {
    node.child("Properties70")?
        .children_named("P")
        .find(|row| row.property(0).and_then(Property::as_str) == Some(name))
}

/// Three floats at row indices 4, 5, 6.
fn row_vec3(row: &BinaryNode) -> Option<Vec3> {
    let axis = |i: usize| row.property(i).and_then(Property::as_f64).map(|v| v as f32);
    Some(Vec3::new(axis(4)?, axis(5)?, axis(6)?))
}

fn read_model(node: &BinaryNode, id: ObjectId, name: String, class: &str) -> Model {
    let vec3 = |key: &str| property_row(node, key).and_then(row_vec3);

    if let Some(order) = property_row(node, "RotationOrder")
        .and_then(|row| row.property(4))
        .and_then(Property::as_i64)
    {
        if order != 0 {
            log::warn!(
                "fbx: model `{}` uses rotation order {}; only XYZ is supported",
                name,
                order
            );
        }
    }

    Model {
        id,
        kind: class.to_string(),
        position: vec3("Lcl Translation").unwrap_or(Vec3::ZERO),
        rotation: vec3("Lcl Rotation").unwrap_or(Vec3::ZERO),
        scale: vec3("Lcl Scaling").unwrap_or(Vec3::ONE),
        pre_rotation: vec3("PreRotation"),
        name,
    }
}

fn read_geometry(node: &BinaryNode, id: ObjectId, name: String) -> Option<Geometry> {
    let vertices = match node.child_array("Vertices") {
        Some(data) => data.to_f32_vec(),
        None if node.child_array_undecoded("Vertices") => {
            log::warn!("fbx: geometry `{}` has unreadable vertices; mesh left empty", name);
            Vec::new()
        }
        // Shape and line geometries carry no vertex block.
        None => return None,
    };
    let vertex_count = vertices.len() / 3;
    let polygons = node
        .child_array("PolygonVertexIndex")
        .map(|data| data.to_i64_vec())
        .unwrap_or_default();
    let indices = triangulate(&polygons, vertex_count);

    Some(Geometry {
        id,
        name,
        vertex_count,
        vertices,
        indices,
    })
}

/// Fan-triangulate FBX polygons. A negative index `i` closes a polygon
/// and stands for vertex `!i`.
fn triangulate(polygons: &[i64], vertex_count: usize) -> Vec<u32> {
    let mut indices = Vec::with_capacity(polygons.len());
    let mut polygon: Vec<u32> = Vec::with_capacity(4);
    let mut dropped = 0usize;

    for &raw in polygons {
        let last = raw < 0;
        let index = if last { !raw } else { raw };
        polygon.push(index as u32);
        if !last {
            continue;
        }
        if polygon.len() >= 3 && polygon.iter().all(|&i| (i as usize) < vertex_count) {
            for k in 1..polygon.len() - 1 {
                indices.extend_from_slice(&[polygon[0], polygon[k], polygon[k + 1]]);
            }
        } else {
            dropped += 1;
        }
        polygon.clear();
    }
    if dropped > 0 {
        log::warn!("fbx: dropped {} degenerate or out-of-range polygons", dropped);
    }
    indices
}

fn read_matrix(node: &BinaryNode, name: &str) -> Option<DMat4> {
    let values = node.child_array(name)?.to_f64_vec();
    let cols: [f64; 16] = values.get(..16)?.try_into().ok()?;
    Some(DMat4::from_cols_array(&cols))
}

fn read_cluster(node: &BinaryNode, id: ObjectId, name: String) -> Cluster {
    let mut indexes: Vec<i32> = node
        .child_array("Indexes")
        .map(|data| data.to_i64_vec().into_iter().map(|i| i as i32).collect())
        .unwrap_or_default();
    let mut weights = node
        .child_array("Weights")
        .map(|data| data.to_f32_vec())
        .unwrap_or_default();
    if indexes.len() != weights.len() {
        log::warn!(
            "fbx: cluster `{}` has {} indexes but {} weights; extra entries ignored",
            name,
            indexes.len(),
            weights.len()
        );
        let n = indexes.len().min(weights.len());
        indexes.truncate(n);
        weights.truncate(n);
    }

    Cluster {
        id,
        indexes,
        weights,
        transform: read_matrix(node, "Transform"),
        transform_link: read_matrix(node, "TransformLink"),
        name,
    }
}

fn read_curve(node: &BinaryNode, id: ObjectId) -> AnimationCurve {
    let mut key_times: Vec<f32> = node
        .child_array("KeyTime")
        .map(|data| {
            data.to_i64_vec()
                .into_iter()
                .map(|ticks| (ticks as f64 / FBX_TIME_UNITS_PER_SECOND as f64) as f32)
                .collect()
        })
        .unwrap_or_default();
    let mut key_values = node
        .child_array("KeyValueFloat")
        .map(|data| data.to_f32_vec())
        .unwrap_or_default();
    if key_times.len() != key_values.len() {
        log::warn!(
            "fbx: curve {} has {} key times but {} values; channel truncated",
            id,
            key_times.len(),
            key_values.len()
        );
        let n = key_times.len().min(key_values.len());
        key_times.truncate(n);
        key_values.truncate(n);
    }
    AnimationCurve {
        id,
        key_times,
        key_values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::fbx::reader::parse_fbx_binary;
    use crate::assets::fbx::test_support::{ModelDesc, SceneBuilder, WriteArray};

    fn sample() -> SceneBuilder {
        let mut b = SceneBuilder::new();
        b.model(
            100,
            "Hips",
            "LimbNode",
            ModelDesc {
                translation: Vec3::new(0.0, 90.0, 0.0),
                rotation: Vec3::new(10.0, 20.0, 30.0),
                scale: Some(Vec3::splat(2.0)),
                pre_rotation: Some(Vec3::new(-90.0, 0.0, 0.0)),
            },
        )
        .model(101, "Body", "Mesh", ModelDesc::default())
        .geometry(
            200,
            "Body",
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            &[0, 1, 2, !3],
        )
        .skin(300)
        .cluster(400, "Hips", &[0, 1, 2, 3], &[1.0, 1.0, 0.5, 0.25], None)
        .stack(500, "Walk")
        .oo(101, 0)
        .oo(100, 0)
        .oo(200, 101)
        .oo(300, 200)
        .oo(400, 300)
        .oo(100, 400)
        .animate(100, "Lcl Rotation", 600, &[0.0, 1.0], [&[10.0, 40.0], &[20.0, 20.0], &[30.0, 0.0]]);
        b
    }

    fn extract(b: &SceneBuilder) -> FbxScene {
        let nodes = parse_fbx_binary(&b.to_bytes(7400, WriteArray::Zlib)).unwrap();
        extract_scene(&nodes).unwrap()
    }

    #[test]
    fn extracts_model_transform() {
        let scene = extract(&sample());
        let hips = scene.models.get(ObjectId(100)).unwrap();
        assert_eq!(hips.name, "Hips");
        assert_eq!(hips.kind, "LimbNode");
        assert_eq!(hips.position, Vec3::new(0.0, 90.0, 0.0));
        assert_eq!(hips.rotation, Vec3::new(10.0, 20.0, 30.0));
        assert_eq!(hips.scale, Vec3::splat(2.0));
        assert_eq!(hips.pre_rotation, Some(Vec3::new(-90.0, 0.0, 0.0)));

        let body = scene.models.get(ObjectId(101)).unwrap();
        assert_eq!(body.scale, Vec3::ONE);
        assert_eq!(body.pre_rotation, None);
    }

    #[test]
    fn extracts_geometry_and_triangulates_quads() {
        let scene = extract(&sample());
        let body = scene.geometries.get(ObjectId(200)).unwrap();
        assert_eq!(body.vertex_count, 4);
        assert_eq!(body.vertices.len(), 12);
        assert_eq!(body.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn extracts_skin_and_clusters() {
        let scene = extract(&sample());
        let skin = scene.skins.get(ObjectId(300)).unwrap();
        assert_eq!(skin.clusters, vec![ObjectId(400)]);
        let cluster = scene.clusters.get(ObjectId(400)).unwrap();
        assert_eq!(cluster.indexes, vec![0, 1, 2, 3]);
        assert_eq!(cluster.weights, vec![1.0, 1.0, 0.5, 0.25]);
        assert!(cluster.transform_link.is_none());
    }

    #[test]
    fn skins_own_only_their_clusters() {
        let mut b = sample();
        b.cluster(401, "Spine", &[0], &[1.0], None)
            .skin(301)
            .oo(401, 301)
            // Models linked to a skin are not its clusters.
            .oo(101, 301);
        let scene = extract(&b);
        assert_eq!(scene.skins.get(ObjectId(300)).unwrap().clusters, vec![ObjectId(400)]);
        assert_eq!(scene.skins.get(ObjectId(301)).unwrap().clusters, vec![ObjectId(401)]);
    }

    #[test]
    fn key_times_convert_to_seconds() {
        let scene = extract(&sample());
        let curve = scene.anim_curves.get(ObjectId(6001)).unwrap();
        assert_eq!(curve.key_times.len(), 2);
        assert!((curve.key_times[1] - 1.0).abs() < 1e-6);
        assert_eq!(curve.key_values, vec![10.0, 40.0]);
        assert_eq!(scene.anim_stacks.get(ObjectId(500)).unwrap().name, "Walk");
    }

    #[test]
    fn connections_keep_property_names() {
        let scene = extract(&sample());
        let op = scene
            .connections
            .iter()
            .find(|c| c.from == ObjectId(600))
            .unwrap();
        assert_eq!(op.kind, ConnectionKind::ObjectProperty);
        assert_eq!(op.to, ObjectId(100));
        assert_eq!(op.property.as_deref(), Some("Lcl Rotation"));
    }

    #[test]
    fn missing_objects_section_is_an_error() {
        let nodes = vec![BinaryNode::new("Connections")];
        assert!(matches!(
            extract_scene(&nodes),
            Err(FbxError::MissingSection("Objects"))
        ));
    }

    #[test]
    fn triangulate_skips_degenerate_polygons() {
        assert_eq!(triangulate(&[0, !1, 0, 1, 2, !3], 4), vec![0, 1, 2, 0, 2, 3]);
        assert!(triangulate(&[0, 1, !9], 4).is_empty());
    }
}
