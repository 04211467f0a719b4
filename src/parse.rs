//! Loading constraint definitions from YAML or JSON documents.
//!
//! ```yaml
//! definitions:
//!   - name: catalog
//!     kind: assembly
//!     let:
//!       - var: party-ids
//!         expression: "//party/@id"
//!     constraints:
//!       - type: index
//!         id: party-index
//!         target: party
//!         name: parties
//!         key-fields:
//!           - target: "@id"
//! ```
//!
//! Every constraint goes through the validating builders; loaded constraints
//! are marked as externally sourced.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::datatype::DataType;
use crate::enums::{DefinitionKind, Extensible, Level};
use crate::error::{ConfigurationError, ParseError, ParseErrorKind};
use crate::node::Definition;
use crate::types::{AllowedValue, Constraint, KeyField, QName, Source};

// ─── Schema ─────────────────────────────────────────────────────────────────

/// Definitions loaded from one document, by name.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    location: Option<String>,
    definitions: BTreeMap<String, Arc<Definition>>,
}

impl Schema {
    /// The resource locator the schema was loaded from.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Definition>> {
        self.definitions.get(name)
    }

    /// Like [`get`](Self::get), failing with [`ParseErrorKind::UnknownDefinition`].
    pub fn require(&self, name: &str) -> Result<&Arc<Definition>, ParseError> {
        self.get(name).ok_or_else(|| ParseError {
            kind: ParseErrorKind::UnknownDefinition,
            message: format!("no definition named '{}'", name),
            path: None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Definition>)> {
        self.definitions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

// ─── Raw document shape ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSchema {
    definitions: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefinition {
    name: String,
    kind: DefinitionKind,
    #[serde(default, rename = "let")]
    lets: Vec<RawLet>,
    #[serde(default)]
    constraints: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLet {
    var: String,
    expression: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawConstraint {
    id: Option<String>,
    formal_name: Option<String>,
    description: Option<String>,
    level: Option<Level>,
    target: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Vec<String>>,
    remarks: Option<String>,
    #[serde(default, rename = "let")]
    lets: Vec<RawLet>,
    #[serde(flatten)]
    kind: RawKind,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
enum RawKind {
    AllowedValues {
        values: Vec<AllowedValue>,
        #[serde(default)]
        allow_other: bool,
        #[serde(default)]
        extensible: Extensible,
    },
    Matches {
        pattern: Option<String>,
        datatype: Option<DataType>,
    },
    Expect {
        test: String,
        message: Option<String>,
    },
    Cardinality {
        min_occurs: Option<usize>,
        max_occurs: Option<usize>,
    },
    Index {
        name: String,
        key_fields: Vec<RawKeyField>,
    },
    IndexHasKey {
        name: String,
        key_fields: Vec<RawKeyField>,
    },
    Unique {
        key_fields: Vec<RawKeyField>,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKeyField {
    target: String,
    pattern: Option<String>,
    remarks: Option<String>,
}

// ─── Parsing ────────────────────────────────────────────────────────────────

/// Parse a YAML (or JSON) constraint definition document.
///
/// `location` is recorded as the source of every loaded constraint.
pub fn parse_schema(input: &str, location: Option<&str>) -> Result<Schema, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError {
            kind: ParseErrorKind::Syntax,
            message: "empty input".to_string(),
            path: None,
        });
    }

    // YAML → serde_json::Value → typed records
    let value: serde_json::Value = serde_saphyr::from_str(input).map_err(|e| {
        let msg = e.to_string();
        ParseError {
            kind: classify_error(&msg),
            message: msg,
            path: None,
        }
    })?;

    if !value.is_object() {
        return Err(ParseError {
            kind: ParseErrorKind::TypeMismatch,
            message: "document root must be a mapping".to_string(),
            path: None,
        });
    }

    let raw: RawSchema = from_value(value, None)?;
    let source = Source::external(location.map(str::to_string));
    let mut definitions = BTreeMap::new();

    for (i, value) in raw.definitions.into_iter().enumerate() {
        let path = format!("definitions[{}]", i);
        let definition = parse_definition(value, &path, &source)?;
        let name = definition.name().to_string();
        if definitions.insert(name.clone(), definition).is_some() {
            return Err(ParseError {
                kind: ParseErrorKind::Configuration,
                message: format!("definition '{}' is declared more than once", name),
                path: Some(path),
            });
        }
    }

    Ok(Schema {
        location: location.map(str::to_string),
        definitions,
    })
}

fn parse_definition(
    value: serde_json::Value,
    path: &str,
    source: &Source,
) -> Result<Arc<Definition>, ParseError> {
    let raw: RawDefinition = from_value(value, Some(path))?;
    let mut builder = Definition::builder(raw.name, raw.kind);
    for binding in raw.lets {
        builder = builder.let_binding(binding.var, binding.expression);
    }
    for (j, value) in raw.constraints.into_iter().enumerate() {
        let path = format!("{}.constraints[{}]", path, j);
        let raw: RawConstraint = from_value(value, Some(&path))?;
        let constraint = build_constraint(raw, source).map_err(|e| configuration(e, &path))?;
        builder = builder.constraint(constraint);
    }
    builder.build().map_err(|e| configuration(e, path))
}

fn build_constraint(raw: RawConstraint, source: &Source) -> Result<Constraint, ConfigurationError> {
    let mut builder = Constraint::builder().source(source.clone());
    if let Some(id) = raw.id {
        builder = builder.id(id);
    }
    if let Some(name) = raw.formal_name {
        builder = builder.formal_name(name);
    }
    if let Some(description) = raw.description {
        builder = builder.description(description);
    }
    if let Some(level) = raw.level {
        builder = builder.level(level);
    }
    if let Some(target) = raw.target {
        builder = builder.target(target);
    }
    if let Some(remarks) = raw.remarks {
        builder = builder.remarks(remarks);
    }
    for (name, values) in raw.properties {
        let name = parse_qname(&name);
        for value in values {
            builder = builder.property(name.clone(), value);
        }
    }
    for binding in raw.lets {
        builder = builder.let_binding(binding.var, binding.expression);
    }

    match raw.kind {
        RawKind::AllowedValues {
            values,
            allow_other,
            extensible,
        } => builder.allowed_values(values, allow_other, extensible),
        RawKind::Matches { pattern, datatype } => builder.matches(pattern.as_deref(), datatype),
        RawKind::Expect { test, message } => builder.expect(&test, message.as_deref()),
        RawKind::Cardinality {
            min_occurs,
            max_occurs,
        } => builder.cardinality(min_occurs, max_occurs),
        RawKind::Index { name, key_fields } => builder.index(&name, key_fields_of(key_fields)?),
        RawKind::IndexHasKey { name, key_fields } => {
            builder.index_has_key(&name, key_fields_of(key_fields)?)
        }
        RawKind::Unique { key_fields } => builder.unique(key_fields_of(key_fields)?),
    }
}

fn key_fields_of(raw: Vec<RawKeyField>) -> Result<Vec<KeyField>, ConfigurationError> {
    raw.into_iter()
        .map(|f| {
            let field = KeyField::new(&f.target, f.pattern.as_deref())?;
            Ok(match f.remarks {
                Some(remarks) => field.with_remarks(remarks),
                None => field,
            })
        })
        .collect()
}

/// `{namespace}name` or a bare `name`.
fn parse_qname(text: &str) -> QName {
    if let Some(rest) = text.strip_prefix('{')
        && let Some((namespace, name)) = rest.split_once('}')
    {
        return QName::with_namespace(namespace, name);
    }
    QName::new(text)
}

fn from_value<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    path: Option<&str>,
) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|e| {
        let msg = e.to_string();
        ParseError {
            kind: classify_error(&msg),
            message: msg,
            path: path.map(str::to_string),
        }
    })
}

fn configuration(error: ConfigurationError, path: &str) -> ParseError {
    ParseError {
        kind: ParseErrorKind::Configuration,
        message: error.to_string(),
        path: Some(path.to_string()),
    }
}

fn classify_error(msg: &str) -> ParseErrorKind {
    let lower = msg.to_lowercase();
    if lower.contains("unknown variant")
        || lower.contains("unknown field")
        || lower.contains("missing field")
        || lower.contains("invalid type")
        || lower.contains("invalid value")
    {
        ParseErrorKind::TypeMismatch
    } else {
        ParseErrorKind::Syntax
    }
}
