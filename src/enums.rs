//! Closed enumerations shared by the constraint model and the validator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Constraint severity level.
///
/// Totally ordered: `Informational < Warning < Error < Critical`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Informational,
    Warning,
    #[default]
    Error,
    Critical,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Informational => "informational",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// How permissive an allowed-values constraint is toward values outside its list.
///
/// Ordered from most to least permissive: `External < Model < None`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Extensible {
    #[default]
    External,
    Model,
    None,
}

impl fmt::Display for Extensible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Extensible::External => "external",
            Extensible::Model => "model",
            Extensible::None => "none",
        };
        f.write_str(s)
    }
}

/// The structural kind of a node in a document tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    Assembly,
    Field,
    Flag,
}

impl NodeKind {
    /// Flags and fields carry a scalar value; documents and assemblies are structural.
    pub fn is_value_bearing(self) -> bool {
        matches!(self, NodeKind::Field | NodeKind::Flag)
    }
}

/// The kind of definition a constraint set is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    Assembly,
    Field,
    Flag,
}

impl DefinitionKind {
    pub fn node_kind(self) -> NodeKind {
        match self {
            DefinitionKind::Assembly => NodeKind::Assembly,
            DefinitionKind::Field => NodeKind::Field,
            DefinitionKind::Flag => NodeKind::Flag,
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DefinitionKind::Assembly => "assembly",
            DefinitionKind::Field => "field",
            DefinitionKind::Flag => "flag",
        };
        f.write_str(s)
    }
}

/// Where a constraint was declared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Declared inline in the schema module.
    #[default]
    Model,
    /// Supplied by an external constraint document.
    External,
}

/// Which node-path notation the reference handlers render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathFormat {
    #[default]
    Metapath,
    JsonPointer,
}
