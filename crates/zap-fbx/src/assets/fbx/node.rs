//! Generic FBX node tree produced by the binary reader.
//!
//! Nodes are transient: the extractor walks them once and drops them.

/// Element type of a bulk array property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    F32,
    F64,
    I32,
    I64,
    Bool,
}

impl ArrayKind {
    /// Map a lowercase FBX type tag to an array kind.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'f' => Some(Self::F32),
            b'd' => Some(Self::F64),
            b'i' => Some(Self::I32),
            b'l' => Some(Self::I64),
            b'b' | b'c' => Some(Self::Bool),
            _ => None,
        }
    }

    /// Size in bytes of one packed element.
    pub fn stride(self) -> usize {
        match self {
            Self::F32 | Self::I32 => 4,
            Self::F64 | Self::I64 => 8,
            Self::Bool => 1,
        }
    }
}

/// Decoded contents of a bulk array property.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

impl ArrayData {
    pub fn kind(&self) -> ArrayKind {
        match self {
            Self::F32(_) => ArrayKind::F32,
            Self::F64(_) => ArrayKind::F64,
            Self::I32(_) => ArrayKind::I32,
            Self::I64(_) => ArrayKind::I64,
            Self::Bool(_) => ArrayKind::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric elements widened to f64. Bool arrays map to 0/1.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::F32(v) => v.iter().map(|&x| x as f64).collect(),
            Self::F64(v) => v.clone(),
            Self::I32(v) => v.iter().map(|&x| x as f64).collect(),
            Self::I64(v) => v.iter().map(|&x| x as f64).collect(),
            Self::Bool(v) => v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect(),
        }
    }

    /// Numeric elements narrowed to f32.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::F32(v) => v.clone(),
            _ => self.to_f64_vec().into_iter().map(|x| x as f32).collect(),
        }
    }

    /// Integer elements as i64. Float arrays are truncated.
    pub fn to_i64_vec(&self) -> Vec<i64> {
        match self {
            Self::I32(v) => v.iter().map(|&x| x as i64).collect(),
            Self::I64(v) => v.clone(),
            Self::F32(v) => v.iter().map(|&x| x as i64).collect(),
            Self::F64(v) => v.iter().map(|&x| x as i64).collect(),
            Self::Bool(v) => v.iter().map(|&x| x as i64).collect(),
        }
    }
}

/// One typed property value of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Int16(i16),
    Bool(bool),
    Int32(i32),
    Float32(f32),
    Float64(f64),
    Int64(i64),
    String(String),
    Bytes(Vec<u8>),
    Array(ArrayData),
    /// A compressed array whose payload failed to inflate (lenient reads only).
    UndecodedArray { kind: ArrayKind, len: usize },
}

impl Property {
    /// String value truncated at the first NUL.
    ///
    /// FBX names are stored as `Name\0\x01Class`; only the part before
    /// the NUL is the object name.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.split('\0').next().unwrap_or_default()),
            _ => None,
        }
    }

    /// Scalar integer value, widened to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int16(v) => Some(v as i64),
            Self::Int32(v) => Some(v as i64),
            Self::Int64(v) => Some(v),
            Self::Bool(v) => Some(v as i64),
            _ => None,
        }
    }

    /// Scalar numeric value, widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float32(v) => Some(v as f64),
            Self::Float64(v) => Some(v),
            Self::Int16(v) => Some(v as f64),
            Self::Int32(v) => Some(v as f64),
            Self::Int64(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayData> {
        match self {
            Self::Array(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_undecoded(&self) -> bool {
        matches!(self, Self::UndecodedArray { .. })
    }
}

/// A node of the FBX record tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinaryNode {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<BinaryNode>,
}

impl BinaryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&BinaryNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a BinaryNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    /// Array carried by the first property of the named child,
    /// e.g. `Vertices: *N { a: ... }`.
    pub fn child_array(&self, name: &str) -> Option<&ArrayData> {
        self.child(name)?.property(0)?.as_array()
    }

    /// Whether the named child holds an array that could not be decoded.
    pub fn child_array_undecoded(&self, name: &str) -> bool {
        self.child(name)
            .and_then(|c| c.property(0))
            .is_some_and(Property::is_undecoded)
    }
}

/// Find a top-level node by name.
pub fn find_root<'a>(nodes: &'a [BinaryNode], name: &str) -> Option<&'a BinaryNode> {
    nodes.iter().find(|n| n.name == name)
}
