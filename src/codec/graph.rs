//! Graph codec
//!
//! Writes the whole object graph with its type metadata. A dedicated serde
//! serializer flattens the value into a table of [`GraphNode`]s in
//! pre-order; every node carries its own handle and the handle of its
//! parent. Map entries are stored as key/value child pairs, so keys of any
//! type survive, and floats keep their exact bits. The table is stored
//! with bincode inside an [`Envelope`] that records the Rust type name of
//! the root. Decoding validates the handle references, refuses payloads
//! written for a different type and replays the rebuilt tree through a
//! self-describing deserializer. Type names come from
//! [`std::any::type_name`], so payloads are only portable between builds
//! that agree on them.

use std::fmt::Display;

use bincode::Options;
use serde::de::{self, DeserializeOwned, DeserializeSeed, Unexpected, Visitor};
use serde::ser;
use serde::{forward_to_deserialize_any, Deserialize, Serialize};

use super::{Codec, CodecFormat};
use crate::error::{Error, Result};

/// Marks a graph payload
const GRAPH_MAGIC: u32 = 0x5543_4731; // "UCG1"

/// Current envelope layout
const GRAPH_VERSION: u16 = 2;

/// Deepest nesting accepted in either direction
const MAX_DEPTH: usize = 128;

/// Node content without its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Kind {
    Unit,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    None,
    /// One child: the present value
    Some,
    /// Children are the elements
    Seq,
    /// Children alternate key, value
    Map,
    /// One child: the variant payload (`Unit` for unit variants)
    Variant(String),
}

/// One entry of the flattened object graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GraphNode {
    /// Position in the node table
    handle: u32,
    /// Handle of the containing node, `None` only for the root
    parent: Option<u32>,
    kind: Kind,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    magic: u32,
    version: u16,
    type_name: String,
    nodes: Vec<GraphNode>,
}

/// Error raised inside the graph serializer and deserializer
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct GraphError(String);

impl ser::Error for GraphError {
    fn custom<T: Display>(msg: T) -> Self {
        GraphError(msg.to_string())
    }
}

impl de::Error for GraphError {
    fn custom<T: Display>(msg: T) -> Self {
        GraphError(msg.to_string())
    }
}

type GraphResult<T> = std::result::Result<T, GraphError>;

// =============================================================================
// Serializer: value -> node table
// =============================================================================

fn push(nodes: &mut Vec<GraphNode>, parent: Option<u32>, kind: Kind) -> GraphResult<u32> {
    let handle = u32::try_from(nodes.len())
        .map_err(|_| GraphError("object graph has too many nodes".into()))?;
    nodes.push(GraphNode {
        handle,
        parent,
        kind,
    });
    Ok(handle)
}

/// Writes one value as a node under `parent`
struct NodeWriter<'a> {
    nodes: &'a mut Vec<GraphNode>,
    parent: Option<u32>,
}

impl<'a> NodeWriter<'a> {
    fn leaf(self, kind: Kind) -> GraphResult<()> {
        push(self.nodes, self.parent, kind).map(|_| ())
    }

    fn container(self, kind: Kind) -> GraphResult<Compound<'a>> {
        let handle = push(self.nodes, self.parent, kind)?;
        Ok(Compound {
            nodes: self.nodes,
            handle,
        })
    }
}

/// Open container node whose children are still being written
struct Compound<'a> {
    nodes: &'a mut Vec<GraphNode>,
    handle: u32,
}

impl Compound<'_> {
    fn child<T: ?Sized + Serialize>(&mut self, value: &T) -> GraphResult<()> {
        value.serialize(NodeWriter {
            nodes: &mut *self.nodes,
            parent: Some(self.handle),
        })
    }
}

impl<'a> ser::Serializer for NodeWriter<'a> {
    type Ok = ();
    type Error = GraphError;
    type SerializeSeq = Compound<'a>;
    type SerializeTuple = Compound<'a>;
    type SerializeTupleStruct = Compound<'a>;
    type SerializeTupleVariant = Compound<'a>;
    type SerializeMap = Compound<'a>;
    type SerializeStruct = Compound<'a>;
    type SerializeStructVariant = Compound<'a>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> GraphResult<()> {
        self.leaf(Kind::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> GraphResult<()> {
        self.leaf(Kind::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> GraphResult<()> {
        self.leaf(Kind::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> GraphResult<()> {
        self.leaf(Kind::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> GraphResult<()> {
        self.leaf(Kind::Int(v))
    }

    fn serialize_u8(self, v: u8) -> GraphResult<()> {
        self.leaf(Kind::UInt(v.into()))
    }

    fn serialize_u16(self, v: u16) -> GraphResult<()> {
        self.leaf(Kind::UInt(v.into()))
    }

    fn serialize_u32(self, v: u32) -> GraphResult<()> {
        self.leaf(Kind::UInt(v.into()))
    }

    fn serialize_u64(self, v: u64) -> GraphResult<()> {
        self.leaf(Kind::UInt(v))
    }

    fn serialize_f32(self, v: f32) -> GraphResult<()> {
        self.leaf(Kind::Float(v.into()))
    }

    fn serialize_f64(self, v: f64) -> GraphResult<()> {
        self.leaf(Kind::Float(v))
    }

    fn serialize_char(self, v: char) -> GraphResult<()> {
        self.leaf(Kind::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> GraphResult<()> {
        self.leaf(Kind::Str(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> GraphResult<()> {
        self.leaf(Kind::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> GraphResult<()> {
        self.leaf(Kind::None)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> GraphResult<()> {
        self.container(Kind::Some)?.child(value)
    }

    fn serialize_unit(self) -> GraphResult<()> {
        self.leaf(Kind::Unit)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> GraphResult<()> {
        self.leaf(Kind::Unit)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> GraphResult<()> {
        self.container(Kind::Variant(variant.to_string()))?.child(&())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> GraphResult<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> GraphResult<()> {
        self.container(Kind::Variant(variant.to_string()))?.child(value)
    }

    fn serialize_seq(self, _len: Option<usize>) -> GraphResult<Compound<'a>> {
        self.container(Kind::Seq)
    }

    fn serialize_tuple(self, _len: usize) -> GraphResult<Compound<'a>> {
        self.container(Kind::Seq)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> GraphResult<Compound<'a>> {
        self.container(Kind::Seq)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> GraphResult<Compound<'a>> {
        let variant = push(self.nodes, self.parent, Kind::Variant(variant.to_string()))?;
        NodeWriter {
            nodes: self.nodes,
            parent: Some(variant),
        }
        .container(Kind::Seq)
    }

    fn serialize_map(self, _len: Option<usize>) -> GraphResult<Compound<'a>> {
        self.container(Kind::Map)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> GraphResult<Compound<'a>> {
        self.container(Kind::Map)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> GraphResult<Compound<'a>> {
        let variant = push(self.nodes, self.parent, Kind::Variant(variant.to_string()))?;
        NodeWriter {
            nodes: self.nodes,
            parent: Some(variant),
        }
        .container(Kind::Map)
    }
}

impl ser::SerializeSeq for Compound<'_> {
    type Ok = ();
    type Error = GraphError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> GraphResult<()> {
        self.child(value)
    }

    fn end(self) -> GraphResult<()> {
        Ok(())
    }
}

impl ser::SerializeTuple for Compound<'_> {
    type Ok = ();
    type Error = GraphError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> GraphResult<()> {
        self.child(value)
    }

    fn end(self) -> GraphResult<()> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for Compound<'_> {
    type Ok = ();
    type Error = GraphError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> GraphResult<()> {
        self.child(value)
    }

    fn end(self) -> GraphResult<()> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for Compound<'_> {
    type Ok = ();
    type Error = GraphError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> GraphResult<()> {
        self.child(value)
    }

    fn end(self) -> GraphResult<()> {
        Ok(())
    }
}

impl ser::SerializeMap for Compound<'_> {
    type Ok = ();
    type Error = GraphError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> GraphResult<()> {
        self.child(key)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> GraphResult<()> {
        self.child(value)
    }

    fn end(self) -> GraphResult<()> {
        Ok(())
    }
}

impl ser::SerializeStruct for Compound<'_> {
    type Ok = ();
    type Error = GraphError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> GraphResult<()> {
        self.child(key)?;
        self.child(value)
    }

    fn end(self) -> GraphResult<()> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for Compound<'_> {
    type Ok = ();
    type Error = GraphError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> GraphResult<()> {
        self.child(key)?;
        self.child(value)
    }

    fn end(self) -> GraphResult<()> {
        Ok(())
    }
}

fn flatten<T: ?Sized + Serialize>(value: &T) -> GraphResult<Vec<GraphNode>> {
    let mut nodes = Vec::new();
    value.serialize(NodeWriter {
        nodes: &mut nodes,
        parent: None,
    })?;
    Ok(nodes)
}

// =============================================================================
// Node table -> tree
// =============================================================================

/// Rebuilt value tree
#[derive(Debug, Clone, PartialEq)]
enum Tree {
    Unit,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    None,
    Some(Box<Tree>),
    Seq(Vec<Tree>),
    Map(Vec<(Tree, Tree)>),
    Variant(String, Box<Tree>),
}

impl Tree {
    fn unexpected(&self) -> Unexpected<'_> {
        match self {
            Tree::Unit => Unexpected::Unit,
            Tree::Bool(b) => Unexpected::Bool(*b),
            Tree::Int(i) => Unexpected::Signed(*i),
            Tree::UInt(u) => Unexpected::Unsigned(*u),
            Tree::Float(f) => Unexpected::Float(*f),
            Tree::Str(s) => Unexpected::Str(s),
            Tree::Bytes(b) => Unexpected::Bytes(b),
            Tree::None | Tree::Some(_) => Unexpected::Option,
            Tree::Seq(_) => Unexpected::Seq,
            Tree::Map(_) => Unexpected::Map,
            Tree::Variant(..) => Unexpected::Enum,
        }
    }
}

/// Check handles, parent references and depth; returns each node's children.
///
/// Parents always precede their children in a valid table.
fn children_of(nodes: &[GraphNode]) -> GraphResult<Vec<Vec<usize>>> {
    if nodes.is_empty() {
        return Err(GraphError("empty node table".into()));
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut depth = vec![0usize; nodes.len()];
    for (index, node) in nodes.iter().enumerate() {
        if node.handle as usize != index {
            return Err(GraphError(format!(
                "node {} carries handle {}",
                index, node.handle
            )));
        }
        match node.parent {
            None if index == 0 => {}
            Some(parent) if (parent as usize) < index => {
                let parent = parent as usize;
                depth[index] = depth[parent] + 1;
                if depth[index] > MAX_DEPTH {
                    return Err(GraphError(format!(
                        "object graph nested deeper than {}",
                        MAX_DEPTH
                    )));
                }
                children[parent].push(index);
            }
            other => {
                return Err(GraphError(format!(
                    "node {} has invalid parent {:?}",
                    index, other
                )))
            }
        }
    }
    Ok(children)
}

/// Rebuild the value tree from a node table.
///
/// Walking the table backwards finishes every child before its parent.
fn rebuild(nodes: Vec<GraphNode>) -> GraphResult<Tree> {
    let mut children = children_of(&nodes)?;
    let mut kinds: Vec<Kind> = nodes.into_iter().map(|n| n.kind).collect();
    let mut built: Vec<Option<Tree>> = (0..kinds.len()).map(|_| None).collect();

    for index in (0..kinds.len()).rev() {
        let kids = std::mem::take(&mut children[index])
            .into_iter()
            .map(|child| take(&mut built, child))
            .collect::<GraphResult<Vec<_>>>()?;

        let tree = match std::mem::replace(&mut kinds[index], Kind::Unit) {
            Kind::Seq => Tree::Seq(kids),
            Kind::Map => Tree::Map(pairs(kids, index)?),
            Kind::Some => Tree::Some(Box::new(only_child(kids, index)?)),
            Kind::Variant(name) => Tree::Variant(name, Box::new(only_child(kids, index)?)),
            _ if !kids.is_empty() => {
                return Err(GraphError(format!("leaf node {} has children", index)))
            }
            Kind::Unit => Tree::Unit,
            Kind::Bool(b) => Tree::Bool(b),
            Kind::Int(i) => Tree::Int(i),
            Kind::UInt(u) => Tree::UInt(u),
            Kind::Float(f) => Tree::Float(f),
            Kind::Str(s) => Tree::Str(s),
            Kind::Bytes(b) => Tree::Bytes(b),
            Kind::None => Tree::None,
        };
        built[index] = Some(tree);
    }

    take(&mut built, 0)
}

fn take(built: &mut [Option<Tree>], index: usize) -> GraphResult<Tree> {
    built[index]
        .take()
        .ok_or_else(|| GraphError(format!("node {} was not built", index)))
}

fn only_child(kids: Vec<Tree>, index: usize) -> GraphResult<Tree> {
    let count = kids.len();
    let mut kids = kids.into_iter();
    match (kids.next(), count) {
        (Some(kid), 1) => Ok(kid),
        _ => Err(GraphError(format!(
            "node {} needs one child, has {}",
            index, count
        ))),
    }
}

fn pairs(kids: Vec<Tree>, index: usize) -> GraphResult<Vec<(Tree, Tree)>> {
    if kids.len() % 2 != 0 {
        return Err(GraphError(format!(
            "map node {} has a key without a value",
            index
        )));
    }
    let mut entries = Vec::with_capacity(kids.len() / 2);
    let mut kids = kids.into_iter();
    while let (Some(key), Some(value)) = (kids.next(), kids.next()) {
        entries.push((key, value));
    }
    Ok(entries)
}

// =============================================================================
// Deserializer: tree -> value
// =============================================================================

struct TreeDeserializer(Tree);

impl<'de> de::Deserializer<'de> for TreeDeserializer {
    type Error = GraphError;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> GraphResult<V::Value> {
        match self.0 {
            Tree::Unit => visitor.visit_unit(),
            Tree::Bool(b) => visitor.visit_bool(b),
            Tree::Int(i) => visitor.visit_i64(i),
            Tree::UInt(u) => visitor.visit_u64(u),
            Tree::Float(f) => visitor.visit_f64(f),
            Tree::Str(s) => visitor.visit_string(s),
            Tree::Bytes(b) => visitor.visit_byte_buf(b),
            Tree::None => visitor.visit_none(),
            Tree::Some(inner) => visitor.visit_some(TreeDeserializer(*inner)),
            Tree::Seq(items) => visit_seq(items, visitor),
            Tree::Map(entries) => visit_map(entries, visitor),
            Tree::Variant(name, payload) => visit_map(vec![(Tree::Str(name), *payload)], visitor),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> GraphResult<V::Value> {
        match self.0 {
            Tree::None => visitor.visit_none(),
            Tree::Some(inner) => visitor.visit_some(TreeDeserializer(*inner)),
            other => visitor.visit_some(TreeDeserializer(other)),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> GraphResult<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> GraphResult<V::Value> {
        match self.0 {
            Tree::Variant(variant, payload) => visitor.visit_enum(EnumAccessor {
                variant,
                payload: *payload,
            }),
            Tree::Str(variant) => visitor.visit_enum(EnumAccessor {
                variant,
                payload: Tree::Unit,
            }),
            other => Err(de::Error::invalid_type(other.unexpected(), &"enum variant")),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

fn visit_seq<'de, V: Visitor<'de>>(items: Vec<Tree>, visitor: V) -> GraphResult<V::Value> {
    let mut access = SeqAccessor {
        items: items.into_iter(),
    };
    let value = visitor.visit_seq(&mut access)?;
    match access.items.len() {
        0 => Ok(value),
        left => Err(GraphError(format!("{} unread sequence elements", left))),
    }
}

fn visit_map<'de, V: Visitor<'de>>(entries: Vec<(Tree, Tree)>, visitor: V) -> GraphResult<V::Value> {
    let mut access = MapAccessor {
        entries: entries.into_iter(),
        value: None,
    };
    let value = visitor.visit_map(&mut access)?;
    match access.entries.len() {
        0 => Ok(value),
        left => Err(GraphError(format!("{} unread map entries", left))),
    }
}

struct SeqAccessor {
    items: std::vec::IntoIter<Tree>,
}

impl<'de> de::SeqAccess<'de> for SeqAccessor {
    type Error = GraphError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> GraphResult<Option<T::Value>> {
        self.items
            .next()
            .map(|item| seed.deserialize(TreeDeserializer(item)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct MapAccessor {
    entries: std::vec::IntoIter<(Tree, Tree)>,
    value: Option<Tree>,
}

impl<'de> de::MapAccess<'de> for MapAccessor {
    type Error = GraphError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> GraphResult<Option<K::Value>> {
        match self.entries.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(TreeDeserializer(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> GraphResult<V::Value> {
        let value = self
            .value
            .take()
            .ok_or_else(|| GraphError("map value read before its key".into()))?;
        seed.deserialize(TreeDeserializer(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct EnumAccessor {
    variant: String,
    payload: Tree,
}

impl<'de> de::EnumAccess<'de> for EnumAccessor {
    type Error = GraphError;
    type Variant = VariantAccessor;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> GraphResult<(V::Value, VariantAccessor)> {
        let variant = seed.deserialize(TreeDeserializer(Tree::Str(self.variant)))?;
        Ok((variant, VariantAccessor(self.payload)))
    }
}

struct VariantAccessor(Tree);

impl<'de> de::VariantAccess<'de> for VariantAccessor {
    type Error = GraphError;

    fn unit_variant(self) -> GraphResult<()> {
        match self.0 {
            Tree::Unit => Ok(()),
            other => Err(de::Error::invalid_type(other.unexpected(), &"unit variant")),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> GraphResult<T::Value> {
        seed.deserialize(TreeDeserializer(self.0))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> GraphResult<V::Value> {
        match self.0 {
            Tree::Seq(items) => visit_seq(items, visitor),
            other => Err(de::Error::invalid_type(other.unexpected(), &"tuple variant")),
        }
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> GraphResult<V::Value> {
        match self.0 {
            Tree::Map(entries) => visit_map(entries, visitor),
            other => Err(de::Error::invalid_type(other.unexpected(), &"struct variant")),
        }
    }
}

// =============================================================================
// Codec
// =============================================================================

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

/// Self-describing object graph codec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphCodec;

impl GraphCodec {
    fn fail(reason: impl ToString) -> Error {
        Error::serialization(CodecFormat::Graph.name(), reason)
    }
}

impl Codec for GraphCodec {
    fn format(&self) -> CodecFormat {
        CodecFormat::Graph
    }

    fn serialize<T: Serialize>(&self, value: Option<&T>) -> Result<Vec<u8>> {
        let Some(value) = value else {
            return Ok(Vec::new());
        };

        let nodes = flatten(value).map_err(Self::fail)?;
        // refuse what decode would refuse
        children_of(&nodes).map_err(Self::fail)?;

        let envelope = Envelope {
            magic: GRAPH_MAGIC,
            version: GRAPH_VERSION,
            type_name: std::any::type_name::<T>().to_string(),
            nodes,
        };

        bincode_options().serialize(&envelope).map_err(Self::fail)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Option<T>> {
        if bytes.is_empty() {
            return Ok(None);
        }

        let envelope: Envelope = bincode_options()
            .with_limit(bytes.len() as u64)
            .deserialize(bytes)
            .map_err(Self::fail)?;

        if envelope.magic != GRAPH_MAGIC {
            return Err(Self::fail(format!(
                "bad magic {:#010x}, not a graph payload",
                envelope.magic
            )));
        }
        if envelope.version != GRAPH_VERSION {
            return Err(Self::fail(format!(
                "unsupported graph version {}",
                envelope.version
            )));
        }

        let expected = std::any::type_name::<T>();
        if envelope.type_name != expected {
            return Err(Self::fail(format!(
                "type mismatch: payload holds {}, expected {}",
                envelope.type_name, expected
            )));
        }

        let tree = rebuild(envelope.nodes).map_err(Self::fail)?;
        T::deserialize(TreeDeserializer(tree))
            .map(Some)
            .map_err(Self::fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CacheProjection;
    use std::collections::BTreeMap;

    fn roundtrip<T: Serialize + DeserializeOwned>(value: &T) -> T {
        let bytes = GraphCodec.serialize(Some(value)).unwrap();
        GraphCodec.deserialize(&bytes).unwrap().unwrap()
    }

    #[test]
    fn test_roundtrip_projection() {
        let value = CacheProjection::new(123_456, "dave", true);
        assert!(roundtrip(&value).same_fields(&value));
    }

    #[test]
    fn test_roundtrip_all_absent() {
        let bytes = GraphCodec.serialize(Some(&CacheProjection::empty())).unwrap();
        assert!(!bytes.is_empty());

        let back: CacheProjection = GraphCodec.deserialize(&bytes).unwrap().unwrap();
        assert!(back.same_fields(&CacheProjection::empty()));
    }

    #[test]
    fn test_nested_structures() {
        let mut nested: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        nested.insert("a".into(), vec![Some(1.5), None, Some(-2.25)]);
        nested.insert("b".into(), vec![]);

        assert_eq!(roundtrip(&nested), nested);
    }

    #[test]
    fn test_non_finite_floats_survive() {
        let values = vec![1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY];
        let back = roundtrip(&values);

        assert_eq!(back.len(), 4);
        assert_eq!(back[0], 1.0);
        assert!(back[1].is_nan());
        assert_eq!(back[2], f64::INFINITY);
        assert_eq!(back[3], f64::NEG_INFINITY);
    }

    #[test]
    fn test_non_string_map_keys() {
        let mut by_pair: BTreeMap<(u8, u8), String> = BTreeMap::new();
        by_pair.insert((1, 2), "a".into());
        by_pair.insert((3, 4), "b".into());
        assert_eq!(roundtrip(&by_pair), by_pair);

        let mut by_id: BTreeMap<i64, bool> = BTreeMap::new();
        by_id.insert(-7, true);
        by_id.insert(42, false);
        assert_eq!(roundtrip(&by_id), by_id);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Channel {
        Off,
        Email(String),
        Sms(u8, u8),
        Push { device: u32, quiet: Option<bool> },
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper(u16);

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Marker;

    #[test]
    fn test_enums_and_newtypes() {
        let channels = vec![
            Channel::Off,
            Channel::Email("a@b.c".into()),
            Channel::Sms(1, 2),
            Channel::Push {
                device: 9,
                quiet: None,
            },
        ];
        assert_eq!(roundtrip(&channels), channels);

        let mut keyed: BTreeMap<String, Channel> = BTreeMap::new();
        keyed.insert("x".into(), Channel::Sms(3, 4));
        assert_eq!(roundtrip(&keyed), keyed);

        assert_eq!(roundtrip(&Wrapper(7)), Wrapper(7));
        assert_eq!(roundtrip(&Marker), Marker);
        assert_eq!(roundtrip(&Some(Some(3u8))), Some(Some(3u8)));
        assert_eq!(roundtrip(&Some(None::<u8>)), Some(None));
        assert_eq!(roundtrip(&('z', ())), ('z', ()));
    }

    #[test]
    fn test_type_mismatch_detected() {
        let bytes = GraphCodec
            .serialize(Some(&CacheProjection::new(1, "x", false)))
            .unwrap();

        let err = GraphCodec
            .deserialize::<Vec<CacheProjection>>(&bytes)
            .unwrap_err();

        match err {
            Error::Serialization { format, reason } => {
                assert_eq!(format, "graph");
                assert!(reason.contains("type mismatch"), "{}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_payload_fails() {
        let bytes = GraphCodec
            .serialize(Some(&CacheProjection::new(9, "frank", true)))
            .unwrap();

        let result = GraphCodec.deserialize::<CacheProjection>(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(Error::Serialization { .. })));
    }

    #[test]
    fn test_large_unsigned_values() {
        assert_eq!(roundtrip(&u64::MAX), u64::MAX);
    }

    #[test]
    fn test_flatten_records_parents() {
        let mut value: BTreeMap<&str, Vec<u8>> = BTreeMap::new();
        value.insert("tags", vec![1, 2]);
        let nodes = flatten(&value).unwrap();

        // map, key, seq, two elements
        assert_eq!(nodes.len(), 5);
        assert_eq!(nodes[0].parent, None);
        assert!(nodes.iter().enumerate().all(|(i, n)| n.handle as usize == i));
        assert!(nodes[1..].iter().all(|n| n.parent.unwrap() < n.handle));

        assert_eq!(
            rebuild(nodes).unwrap(),
            Tree::Map(vec![(
                Tree::Str("tags".into()),
                Tree::Seq(vec![Tree::UInt(1), Tree::UInt(2)])
            )])
        );
    }

    #[test]
    fn test_forward_parent_rejected() {
        let mut nodes = flatten(&vec![1u8, 2]).unwrap();
        nodes[1].parent = Some(2);
        assert!(rebuild(nodes).is_err());
    }

    #[test]
    fn test_map_key_without_value_rejected() {
        let mut by_id: BTreeMap<u8, u8> = BTreeMap::new();
        by_id.insert(1, 2);
        let mut nodes = flatten(&by_id).unwrap();
        nodes.pop();
        assert!(rebuild(nodes).is_err());
    }

    #[test]
    fn test_excessive_depth_rejected() {
        let mut value = serde_json::json!(0);
        for _ in 0..=MAX_DEPTH {
            value = serde_json::json!([value]);
        }
        assert!(matches!(
            GraphCodec.serialize(Some(&value)),
            Err(Error::Serialization { .. })
        ));
    }
}
