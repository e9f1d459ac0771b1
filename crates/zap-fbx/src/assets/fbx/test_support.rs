//! In-memory FBX fixtures for tests: a binary writer, a scene builder and
//! a seedable generator for randomized data.

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use glam::{Mat4, Vec3};

use super::node::{ArrayData, ArrayKind, BinaryNode, Property};
use super::reader::{FBX_MAGIC, VERSION_64BIT};
use crate::assets::fbx::extract::FBX_TIME_UNITS_PER_SECOND;

/// How the writer encodes bulk arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteArray {
    Raw,
    Zlib,
}

/// Serializes a node tree into binary FBX.
pub struct FbxWriter {
    version: u32,
}

impl FbxWriter {
    pub fn new(version: u32) -> Self {
        Self { version }
    }

    fn wide(&self) -> bool {
        self.version >= VERSION_64BIT
    }

    pub fn write(&self, nodes: &[BinaryNode], arrays: WriteArray) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(FBX_MAGIC);
        out.write_u32::<LittleEndian>(self.version).unwrap();
        for node in nodes {
            self.write_node(&mut out, node, arrays);
        }
        self.write_null_record(&mut out);
        out
    }

    fn word(&self, out: &mut Vec<u8>, value: u64) {
        if self.wide() {
            out.write_u64::<LittleEndian>(value).unwrap();
        } else {
            out.write_u32::<LittleEndian>(value as u32).unwrap();
        }
    }

    fn patch_word(&self, out: &mut [u8], at: usize, value: u64) {
        if self.wide() {
            LittleEndian::write_u64(&mut out[at..at + 8], value);
        } else {
            LittleEndian::write_u32(&mut out[at..at + 4], value as u32);
        }
    }

    fn write_null_record(&self, out: &mut Vec<u8>) {
        let len = if self.wide() { 25 } else { 13 };
        out.extend(std::iter::repeat(0u8).take(len));
    }

    fn write_node(&self, out: &mut Vec<u8>, node: &BinaryNode, arrays: WriteArray) {
        let word_len = if self.wide() { 8 } else { 4 };
        let start = out.len();
        self.word(out, 0);
        self.word(out, node.properties.len() as u64);
        self.word(out, 0);
        out.push(node.name.len() as u8);
        out.extend_from_slice(node.name.as_bytes());

        let properties_start = out.len();
        for property in &node.properties {
            write_property(out, property, arrays);
        }
        let properties_len = (out.len() - properties_start) as u64;

        if !node.children.is_empty() {
            for child in &node.children {
                self.write_node(out, child, arrays);
            }
            self.write_null_record(out);
        }

        let end = out.len() as u64;
        self.patch_word(out, start, end);
        self.patch_word(out, start + 2 * word_len, properties_len);
    }
}

fn write_property(out: &mut Vec<u8>, property: &Property, arrays: WriteArray) {
    match property {
        Property::Int16(v) => {
            out.push(b'Y');
            out.write_i16::<LittleEndian>(*v).unwrap();
        }
        Property::Bool(v) => {
            out.push(b'C');
            out.push(*v as u8);
        }
        Property::Int32(v) => {
            out.push(b'I');
            out.write_i32::<LittleEndian>(*v).unwrap();
        }
        Property::Float32(v) => {
            out.push(b'F');
            out.write_f32::<LittleEndian>(*v).unwrap();
        }
        Property::Float64(v) => {
            out.push(b'D');
            out.write_f64::<LittleEndian>(*v).unwrap();
        }
        Property::Int64(v) => {
            out.push(b'L');
            out.write_i64::<LittleEndian>(*v).unwrap();
        }
        Property::String(s) => {
            out.push(b'S');
            out.write_u32::<LittleEndian>(s.len() as u32).unwrap();
            out.extend_from_slice(s.as_bytes());
        }
        Property::Bytes(b) => {
            out.push(b'R');
            out.write_u32::<LittleEndian>(b.len() as u32).unwrap();
            out.extend_from_slice(b);
        }
        Property::Array(data) => write_array(out, data, arrays),
        Property::UndecodedArray { kind, len } => {
            // A compressed array whose stream cannot be inflated.
            out.push(array_tag(*kind));
            out.write_u32::<LittleEndian>(*len as u32).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();
            out.write_u32::<LittleEndian>(2).unwrap();
            out.extend_from_slice(&[0xff, 0xff]);
        }
    }
}

fn array_tag(kind: ArrayKind) -> u8 {
    match kind {
        ArrayKind::F32 => b'f',
        ArrayKind::F64 => b'd',
        ArrayKind::I32 => b'i',
        ArrayKind::I64 => b'l',
        ArrayKind::Bool => b'b',
    }
}

fn write_array(out: &mut Vec<u8>, data: &ArrayData, arrays: WriteArray) {
    let mut raw = Vec::new();
    match data {
        ArrayData::F32(v) => v.iter().for_each(|&x| raw.write_f32::<LittleEndian>(x).unwrap()),
        ArrayData::F64(v) => v.iter().for_each(|&x| raw.write_f64::<LittleEndian>(x).unwrap()),
        ArrayData::I32(v) => v.iter().for_each(|&x| raw.write_i32::<LittleEndian>(x).unwrap()),
        ArrayData::I64(v) => v.iter().for_each(|&x| raw.write_i64::<LittleEndian>(x).unwrap()),
        ArrayData::Bool(v) => raw.extend(v.iter().map(|&b| b as u8)),
    }
    let (encoding, payload) = match arrays {
        WriteArray::Raw => (0u32, raw),
        WriteArray::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&raw).unwrap();
            (1u32, encoder.finish().unwrap())
        }
    };
    out.push(array_tag(data.kind()));
    out.write_u32::<LittleEndian>(data.len() as u32).unwrap();
    out.write_u32::<LittleEndian>(encoding).unwrap();
    out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
    out.extend_from_slice(&payload);
}

fn named(name: &str, class: &str) -> Property {
    Property::String(format!("{name}\0\u{1}{class}"))
}

fn p70_vec3(name: &str, v: Vec3) -> BinaryNode {
    let kind = if name.starts_with("Lcl") { name } else { "Vector3D" };
    let mut row = BinaryNode::new("P");
    row.properties = vec![
        Property::String(name.into()),
        Property::String(kind.into()),
        Property::String(String::new()),
        Property::String("A".into()),
        Property::Float64(v.x as f64),
        Property::Float64(v.y as f64),
        Property::Float64(v.z as f64),
    ];
    row
}

fn array_child(name: &str, data: ArrayData) -> BinaryNode {
    let mut node = BinaryNode::new(name);
    node.properties.push(Property::Array(data));
    node
}

fn matrix_child(name: &str, m: Mat4) -> BinaryNode {
    let cols = m.to_cols_array().iter().map(|&x| x as f64).collect();
    array_child(name, ArrayData::F64(cols))
}

/// Static transform of a fixture model.
#[derive(Debug, Clone, Copy)]
pub struct ModelDesc {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Option<Vec3>,
    pub pre_rotation: Option<Vec3>,
}

impl Default for ModelDesc {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: None,
            pre_rotation: None,
        }
    }
}

/// Builds the `Objects` and `Connections` sections of a fixture file.
#[derive(Default)]
pub struct SceneBuilder {
    objects: Vec<BinaryNode>,
    connections: Vec<BinaryNode>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&mut self, id: i64, name: &str, kind: &str, desc: ModelDesc) -> &mut Self {
        let mut node = BinaryNode::new("Model");
        node.properties = vec![Property::Int64(id), named(name, "Model"), Property::String(kind.into())];
        let mut p70 = BinaryNode::new("Properties70");
        p70.children.push(p70_vec3("Lcl Translation", desc.translation));
        p70.children.push(p70_vec3("Lcl Rotation", desc.rotation));
        if let Some(scale) = desc.scale {
            p70.children.push(p70_vec3("Lcl Scaling", scale));
        }
        if let Some(pre) = desc.pre_rotation {
            p70.children.push(p70_vec3("PreRotation", pre));
        }
        node.children.push(p70);
        self.objects.push(node);
        self
    }

    pub fn geometry(&mut self, id: i64, name: &str, vertices: &[f64], polygons: &[i32]) -> &mut Self {
        let mut node = BinaryNode::new("Geometry");
        node.properties = vec![Property::Int64(id), named(name, "Geometry"), Property::String("Mesh".into())];
        node.children.push(array_child("Vertices", ArrayData::F64(vertices.to_vec())));
        if !polygons.is_empty() {
            node.children
                .push(array_child("PolygonVertexIndex", ArrayData::I32(polygons.to_vec())));
        }
        self.objects.push(node);
        self
    }

    pub fn skin(&mut self, id: i64) -> &mut Self {
        let mut node = BinaryNode::new("Deformer");
        node.properties = vec![Property::Int64(id), named("Skin", "Deformer"), Property::String("Skin".into())];
        self.objects.push(node);
        self
    }

    pub fn cluster(
        &mut self,
        id: i64,
        name: &str,
        indexes: &[i32],
        weights: &[f64],
        transform_link: Option<Mat4>,
    ) -> &mut Self {
        let mut node = BinaryNode::new("Deformer");
        node.properties = vec![
            Property::Int64(id),
            named(name, "SubDeformer"),
            Property::String("Cluster".into()),
        ];
        if !indexes.is_empty() {
            node.children.push(array_child("Indexes", ArrayData::I32(indexes.to_vec())));
            node.children.push(array_child("Weights", ArrayData::F64(weights.to_vec())));
        }
        if let Some(link) = transform_link {
            node.children.push(matrix_child("Transform", Mat4::IDENTITY));
            node.children.push(matrix_child("TransformLink", link));
        }
        self.objects.push(node);
        self
    }

    pub fn stack(&mut self, id: i64, name: &str) -> &mut Self {
        let mut node = BinaryNode::new("AnimationStack");
        node.properties = vec![Property::Int64(id), named(name, "AnimStack"), Property::String(String::new())];
        self.objects.push(node);
        self
    }

    pub fn layer(&mut self, id: i64, name: &str) -> &mut Self {
        let mut node = BinaryNode::new("AnimationLayer");
        node.properties = vec![Property::Int64(id), named(name, "AnimLayer"), Property::String(String::new())];
        self.objects.push(node);
        self
    }

    pub fn curve_node(&mut self, id: i64, name: &str) -> &mut Self {
        let mut node = BinaryNode::new("AnimationCurveNode");
        node.properties = vec![Property::Int64(id), named(name, "AnimCurveNode"), Property::String(String::new())];
        self.objects.push(node);
        self
    }

    pub fn curve(&mut self, id: i64, times: &[f64], values: &[f32]) -> &mut Self {
        let mut node = BinaryNode::new("AnimationCurve");
        node.properties = vec![Property::Int64(id), named("", "AnimCurve"), Property::String(String::new())];
        let ticks = times
            .iter()
            .map(|&t| (t * FBX_TIME_UNITS_PER_SECOND as f64).round() as i64)
            .collect();
        node.children.push(array_child("KeyTime", ArrayData::I64(ticks)));
        node.children.push(array_child("KeyValueFloat", ArrayData::F32(values.to_vec())));
        self.objects.push(node);
        self
    }

    pub fn oo(&mut self, from: i64, to: i64) -> &mut Self {
        let mut c = BinaryNode::new("C");
        c.properties = vec![Property::String("OO".into()), Property::Int64(from), Property::Int64(to)];
        self.connections.push(c);
        self
    }

    pub fn op(&mut self, from: i64, to: i64, property: &str) -> &mut Self {
        let mut c = BinaryNode::new("C");
        c.properties = vec![
            Property::String("OP".into()),
            Property::Int64(from),
            Property::Int64(to),
            Property::String(property.into()),
        ];
        self.connections.push(c);
        self
    }

    /// Attach a 3-axis curve node to a model channel, one curve per axis.
    pub fn animate(
        &mut self,
        model: i64,
        channel: &str,
        node_id: i64,
        times: &[f64],
        axes: [&[f32]; 3],
    ) -> &mut Self {
        let short = match channel {
            "Lcl Translation" => "T",
            "Lcl Rotation" => "R",
            _ => "S",
        };
        self.curve_node(node_id, short);
        self.op(node_id, model, channel);
        for (i, (values, label)) in axes.iter().zip(["d|X", "d|Y", "d|Z"]).enumerate() {
            let curve_id = node_id * 10 + i as i64 + 1;
            self.curve(curve_id, times, values);
            self.op(curve_id, node_id, label);
        }
        self
    }

    pub fn nodes(&self) -> Vec<BinaryNode> {
        let mut version = BinaryNode::new("FBXHeaderExtension");
        let mut header_version = BinaryNode::new("FBXHeaderVersion");
        header_version.properties.push(Property::Int32(1003));
        version.children.push(header_version);

        let mut objects = BinaryNode::new("Objects");
        objects.children = self.objects.clone();
        let mut connections = BinaryNode::new("Connections");
        connections.children = self.connections.clone();
        vec![version, objects, connections]
    }

    pub fn to_bytes(&self, version: u32, arrays: WriteArray) -> Vec<u8> {
        FbxWriter::new(version).write(&self.nodes(), arrays)
    }
}

/// Seedable pseudo-random generator (xorshift64) for randomized fixtures.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Random integer in [0, upper_bound).
    pub fn below(&mut self, upper_bound: u32) -> u32 {
        (self.next_u64() % upper_bound as u64) as u32
    }

    /// Random float in [0, 1).
    pub fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}
