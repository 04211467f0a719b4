//! Materialized document trees and the definitions their nodes point to.
//!
//! A [`Document`] is an arena of nodes addressed by [`NodeId`]. Every
//! non-document node references a shared [`Definition`] that declares its
//! let bindings and constraints. Definitions are immutable once built and may
//! be read by any number of validation runs at once.

use std::sync::{Arc, OnceLock};

use crate::builder::DefinitionBuilder;
use crate::enums::*;
use crate::types::*;

// ─── Definition ─────────────────────────────────────────────────────────────

/// A schema definition: name, kind, let bindings and declared constraints.
#[derive(Debug)]
pub struct Definition {
    name: String,
    kind: DefinitionKind,
    lets: Vec<Let>,
    constraints: Vec<Arc<Constraint>>,
    by_kind: OnceLock<ConstraintSet>,
}

/// A definition's constraints partitioned by kind, each list in declaration order.
#[derive(Debug, Default)]
pub struct ConstraintSet {
    pub expect: Vec<Arc<Constraint>>,
    pub allowed_values: Vec<Arc<Constraint>>,
    pub index_has_key: Vec<Arc<Constraint>>,
    pub matches: Vec<Arc<Constraint>>,
    pub cardinality: Vec<Arc<Constraint>>,
    pub index: Vec<Arc<Constraint>>,
    pub unique: Vec<Arc<Constraint>>,
}

impl ConstraintSet {
    fn partition(constraints: &[Arc<Constraint>]) -> Self {
        let mut set = ConstraintSet::default();
        for c in constraints {
            let bucket = match &c.kind {
                ConstraintKind::Expect(_) => &mut set.expect,
                ConstraintKind::AllowedValues(_) => &mut set.allowed_values,
                ConstraintKind::IndexHasKey(_) => &mut set.index_has_key,
                ConstraintKind::Matches(_) => &mut set.matches,
                ConstraintKind::Cardinality(_) => &mut set.cardinality,
                ConstraintKind::Index(_) => &mut set.index,
                ConstraintKind::Unique(_) => &mut set.unique,
            };
            bucket.push(Arc::clone(c));
        }
        set
    }
}

impl Definition {
    pub fn builder(name: impl Into<String>, kind: DefinitionKind) -> DefinitionBuilder {
        DefinitionBuilder::new(name, kind)
    }

    pub(crate) fn new(
        name: String,
        kind: DefinitionKind,
        lets: Vec<Let>,
        constraints: Vec<Arc<Constraint>>,
    ) -> Self {
        Self {
            name,
            kind,
            lets,
            constraints,
            by_kind: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DefinitionKind {
        self.kind
    }

    pub fn lets(&self) -> &[Let] {
        &self.lets
    }

    pub fn constraints(&self) -> &[Arc<Constraint>] {
        &self.constraints
    }

    /// Constraints grouped by kind, computed once on first use.
    pub fn constraint_set(&self) -> &ConstraintSet {
        self.by_kind
            .get_or_init(|| ConstraintSet::partition(&self.constraints))
    }
}

// ─── Document ───────────────────────────────────────────────────────────────

/// Index of a node within its [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    name: String,
    definition: Option<Arc<Definition>>,
    value: Option<String>,
    parent: Option<NodeId>,
    flags: Vec<NodeId>,
    children: Vec<NodeId>,
}

/// A fully materialized document tree.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    uri: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document holding only its document node.
    pub fn new() -> Self {
        Document {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                name: String::new(),
                definition: None,
                value: None,
                parent: None,
                flags: Vec::new(),
                children: Vec::new(),
            }],
            uri: None,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The root assembly, if one has been added.
    pub fn root_assembly(&self) -> Option<NodeId> {
        self.nodes[0].children.first().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        debug_assert!(id.0 < self.nodes.len(), "node id out of range");
        NodeRef { doc: self, id }
    }

    /// Add an assembly under the document node or another assembly.
    ///
    /// # Panics
    ///
    /// Panics if `definition` is not an assembly definition, if `parent` is a
    /// field or flag, or if `parent` is the document node and it already has
    /// a root assembly.
    pub fn add_assembly(&mut self, parent: NodeId, definition: &Arc<Definition>) -> NodeId {
        assert_eq!(definition.kind(), DefinitionKind::Assembly);
        let parent_kind = self.nodes[parent.0].kind;
        assert!(
            matches!(parent_kind, NodeKind::Document | NodeKind::Assembly),
            "assemblies nest only under the document or an assembly"
        );
        assert!(
            parent_kind != NodeKind::Document || self.nodes[parent.0].children.is_empty(),
            "a document has exactly one root assembly"
        );
        self.push_child(parent, NodeKind::Assembly, definition, None)
    }

    /// Add a field with a value under an assembly.
    ///
    /// # Panics
    ///
    /// Panics if `definition` is not a field definition or `parent` is not an assembly.
    pub fn add_field(
        &mut self,
        parent: NodeId,
        definition: &Arc<Definition>,
        value: impl Into<String>,
    ) -> NodeId {
        self.insert_field(parent, definition, Some(value.into()))
    }

    /// Add a field whose value is absent.
    ///
    /// # Panics
    ///
    /// Same conditions as [`Document::add_field`].
    pub fn add_field_without_value(
        &mut self,
        parent: NodeId,
        definition: &Arc<Definition>,
    ) -> NodeId {
        self.insert_field(parent, definition, None)
    }

    /// Add a flag under an assembly or field.
    ///
    /// # Panics
    ///
    /// Panics if `definition` is not a flag definition or `parent` is neither
    /// an assembly nor a field.
    pub fn add_flag(
        &mut self,
        parent: NodeId,
        definition: &Arc<Definition>,
        value: impl Into<String>,
    ) -> NodeId {
        assert_eq!(definition.kind(), DefinitionKind::Flag);
        assert!(
            matches!(
                self.nodes[parent.0].kind,
                NodeKind::Assembly | NodeKind::Field
            ),
            "flags attach only to assemblies and fields"
        );
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind: NodeKind::Flag,
            name: definition.name().to_string(),
            definition: Some(Arc::clone(definition)),
            value: Some(value.into()),
            parent: Some(parent),
            flags: Vec::new(),
            children: Vec::new(),
        });
        self.nodes[parent.0].flags.push(id);
        id
    }

    fn insert_field(
        &mut self,
        parent: NodeId,
        definition: &Arc<Definition>,
        value: Option<String>,
    ) -> NodeId {
        assert_eq!(definition.kind(), DefinitionKind::Field);
        assert_eq!(
            self.nodes[parent.0].kind,
            NodeKind::Assembly,
            "fields nest only under assemblies"
        );
        self.push_child(parent, NodeKind::Field, definition, value)
    }

    fn push_child(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        definition: &Arc<Definition>,
        value: Option<String>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            name: definition.name().to_string(),
            definition: Some(Arc::clone(definition)),
            value,
            parent: Some(parent),
            flags: Vec::new(),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }
}

// ─── NodeRef ────────────────────────────────────────────────────────────────

/// A borrowed view of one node.
#[derive(Clone, Copy, Debug)]
pub struct NodeRef<'d> {
    doc: &'d Document,
    id: NodeId,
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl<'d> NodeRef<'d> {
    fn data(&self) -> &'d NodeData {
        &self.doc.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'d Document {
        self.doc
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    pub fn name(&self) -> &'d str {
        &self.data().name
    }

    pub fn definition(&self) -> Option<&'d Arc<Definition>> {
        self.data().definition.as_ref()
    }

    pub fn value(&self) -> Option<&'d str> {
        self.data().value.as_deref()
    }

    /// Whether the node's value is resolved. Structural nodes always are.
    pub fn has_value(&self) -> bool {
        match self.kind() {
            NodeKind::Document | NodeKind::Assembly => true,
            NodeKind::Field | NodeKind::Flag => self.data().value.is_some(),
        }
    }

    pub fn parent(&self) -> Option<NodeRef<'d>> {
        self.data().parent.map(|id| self.doc.node(id))
    }

    pub fn flags(&self) -> impl Iterator<Item = NodeRef<'d>> + use<'d> {
        let doc = self.doc;
        self.data().flags.iter().map(move |id| doc.node(*id))
    }

    pub fn flag(&self, name: &str) -> Option<NodeRef<'d>> {
        self.flags().find(|f| f.name() == name)
    }

    /// Model children (assemblies and fields) in document order.
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'d>> + use<'d> {
        let doc = self.doc;
        self.data().children.iter().map(move |id| doc.node(*id))
    }

    /// 1-based position among same-named siblings; flags are always 1.
    pub fn position(&self) -> usize {
        if self.kind() == NodeKind::Flag {
            return 1;
        }
        match self.parent() {
            Some(parent) => {
                parent
                    .children()
                    .filter(|c| c.name() == self.name())
                    .take_while(|c| c.id != self.id)
                    .count()
                    + 1
            }
            None => 1,
        }
    }

    /// This node and its ancestors, nearest first.
    pub fn ancestors_or_self(&self) -> impl Iterator<Item = NodeRef<'d>> + use<'d> {
        std::iter::successors(Some(*self), |n| n.parent())
    }
}

// ─── Item ───────────────────────────────────────────────────────────────────

/// One item of a query result sequence.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Item {
    Node(NodeId),
    Atomic(String),
}

impl Item {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Item::Node(id) => Some(*id),
            Item::Atomic(_) => None,
        }
    }

    /// The textual value of the item, if it has one.
    pub fn string_value<'a>(&'a self, doc: &'a Document) -> Option<&'a str> {
        match self {
            Item::Node(id) => doc.node(*id).value(),
            Item::Atomic(s) => Some(s),
        }
    }
}
