use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::datatype::DataType;
use crate::enums::*;
use crate::error::EvaluationError;
use crate::evaluate::{EvaluationContext, QueryEvaluator};
use crate::node::{Item, NodeRef};

// ─── Expression ─────────────────────────────────────────────────────────────

/// A target or test expression in the query language.
///
/// The core treats expression text as opaque; only the configured
/// [`QueryEvaluator`](crate::evaluate::QueryEvaluator) interprets it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Expression(Arc<str>);

impl Expression {
    pub fn new(text: impl AsRef<str>) -> Self {
        Expression(Arc::from(text.as_ref().trim()))
    }

    /// The expression selecting the context node itself.
    pub fn context() -> Self {
        Expression(Arc::from("."))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_context(&self) -> bool {
        &*self.0 == "."
    }
}

impl Default for Expression {
    fn default() -> Self {
        Expression::context()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Supporting value types ─────────────────────────────────────────────────

/// A namespace-qualified property name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl QName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn with_namespace(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Where a constraint came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub kind: SourceKind,
    /// Locator of the resource that declared the constraint, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Source {
    pub fn model() -> Self {
        Source::default()
    }

    pub fn external(location: Option<String>) -> Self {
        Source {
            kind: SourceKind::External,
            location,
        }
    }
}

/// A named, expression-derived variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Let {
    pub name: String,
    pub expression: Expression,
    pub remarks: Option<String>,
}

impl Let {
    pub fn new(name: impl Into<String>, expression: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            expression: Expression::new(expression),
            remarks: None,
        }
    }
}

/// A compiled regular expression that must match a whole value.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub(crate) fn compile(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// Apply the pattern as a normalization step.
    ///
    /// The whole value must match. A pattern with exactly one capture group
    /// yields that group; otherwise the value is kept as is.
    pub fn normalize<'v>(&self, value: &'v str) -> Option<&'v str> {
        let caps = self.regex.captures(value)?;
        if self.regex.captures_len() == 2 {
            Some(caps.get(1).map_or("", |m| m.as_str()))
        } else {
            Some(value)
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

/// One component of a composite key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyField {
    pub target: Expression,
    pub pattern: Option<Pattern>,
    pub remarks: Option<String>,
}

/// One literal accepted by an allowed-values constraint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AllowedValue {
    pub value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_since: Option<String>,
}

impl AllowedValue {
    pub fn new(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: description.into(),
            deprecated_since: None,
        }
    }
}

// ─── Constraint kinds ───────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedValues {
    /// Allowed literals in declaration order; literals are unique.
    pub values: Vec<AllowedValue>,
    pub allow_other: bool,
    pub extensible: Extensible,
}

impl AllowedValues {
    pub fn allowed_value(&self, value: &str) -> Option<&AllowedValue> {
        self.values.iter().find(|v| v.value == value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matches {
    pub pattern: Option<Pattern>,
    pub datatype: Option<DataType>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expect {
    pub test: Expression,
    /// Message template; `{ expr }` segments are interpolated.
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cardinality {
    pub min_occurs: Option<usize>,
    pub max_occurs: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub key_fields: Vec<KeyField>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexHasKey {
    pub index_name: String,
    pub key_fields: Vec<KeyField>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unique {
    pub key_fields: Vec<KeyField>,
}

/// The seven constraint kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    AllowedValues(AllowedValues),
    Matches(Matches),
    Expect(Expect),
    Cardinality(Cardinality),
    Index(IndexDef),
    IndexHasKey(IndexHasKey),
    Unique(Unique),
}

impl ConstraintKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::AllowedValues(_) => "allowed-values",
            ConstraintKind::Matches(_) => "matches",
            ConstraintKind::Expect(_) => "expect",
            ConstraintKind::Cardinality(_) => "cardinality",
            ConstraintKind::Index(_) => "index",
            ConstraintKind::IndexHasKey(_) => "index-has-key",
            ConstraintKind::Unique(_) => "unique",
        }
    }

    /// Cardinality, index and unique constraints only apply to assemblies.
    pub fn is_assembly_only(&self) -> bool {
        matches!(
            self,
            ConstraintKind::Cardinality(_) | ConstraintKind::Index(_) | ConstraintKind::Unique(_)
        )
    }

    /// Key fields shared by index, index-has-key and unique constraints.
    pub fn key_fields(&self) -> Option<&[KeyField]> {
        match self {
            ConstraintKind::Index(c) => Some(&c.key_fields),
            ConstraintKind::IndexHasKey(c) => Some(&c.key_fields),
            ConstraintKind::Unique(c) => Some(&c.key_fields),
            _ => None,
        }
    }
}

// ─── Constraint ─────────────────────────────────────────────────────────────

/// A single immutable rule. Build one with
/// [`ConstraintBuilder`](crate::builder::ConstraintBuilder).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub id: Option<String>,
    pub formal_name: Option<String>,
    pub description: Option<String>,
    pub source: Source,
    pub level: Level,
    pub target: Expression,
    pub properties: BTreeMap<QName, BTreeSet<String>>,
    pub remarks: Option<String>,
    /// Variables bound before this constraint's expressions are evaluated.
    pub lets: Vec<Let>,
    pub kind: ConstraintKind,
}

impl Constraint {
    /// The identifier if present, otherwise a description derived from the target.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("'{}'", id),
            None => format!("{} targeting '{}'", self.kind.name(), self.target),
        }
    }

    pub fn property(&self, name: &QName) -> Option<&BTreeSet<String>> {
        self.properties.get(name)
    }

    /// Nodes selected by the target, evaluated with `node` as the context.
    ///
    /// A context node without a value matches nothing and the target is not
    /// evaluated. Atomic results are skipped.
    pub fn match_targets<'d>(
        &self,
        evaluator: &dyn QueryEvaluator,
        node: NodeRef<'d>,
        context: &EvaluationContext<'_>,
    ) -> Result<Vec<NodeRef<'d>>, EvaluationError> {
        if !node.has_value() {
            return Ok(Vec::new());
        }
        let doc = node.document();
        let items = evaluator.select(&self.target, node, context)?;
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Item::Node(id) => Some(doc.node(id)),
                Item::Atomic(value) => {
                    debug!("ignoring atomic target '{}' of {}", value, self.label());
                    None
                }
            })
            .collect())
    }
}
