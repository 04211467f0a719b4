//! Validating builders for constraints and definitions.
//!
//! Every required combination is checked when the terminal method runs;
//! failures are [`ConfigurationError`]s and never reach the validator.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use crate::datatype::DataType;
use crate::enums::*;
use crate::error::ConfigurationError;
use crate::node::Definition;
use crate::types::*;

fn compile_pattern(pattern: &str) -> Result<Pattern, ConfigurationError> {
    Pattern::compile(pattern).map_err(|e| ConfigurationError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn expression(text: &str, what: &'static str) -> Result<Expression, ConfigurationError> {
    let expr = Expression::new(text);
    if expr.as_str().is_empty() {
        return Err(ConfigurationError::EmptyExpression(what));
    }
    Ok(expr)
}

fn check_lets(lets: &[Let]) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    for binding in lets {
        if binding.expression.as_str().is_empty() {
            return Err(ConfigurationError::EmptyExpression("let"));
        }
        if !seen.insert(binding.name.as_str()) {
            return Err(ConfigurationError::DuplicateLet(binding.name.clone()));
        }
    }
    Ok(())
}

impl KeyField {
    /// Build a key field from a target expression and an optional pattern.
    pub fn new(target: &str, pattern: Option<&str>) -> Result<Self, ConfigurationError> {
        Ok(KeyField {
            target: expression(target, "key field target")?,
            pattern: pattern.map(compile_pattern).transpose()?,
            remarks: None,
        })
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }
}

impl Constraint {
    pub fn builder() -> ConstraintBuilder {
        ConstraintBuilder::default()
    }
}

/// Collects the properties common to every constraint kind; a terminal
/// method supplies the kind-specific part and validates the whole.
#[derive(Clone, Debug, Default)]
pub struct ConstraintBuilder {
    id: Option<String>,
    formal_name: Option<String>,
    description: Option<String>,
    source: Source,
    level: Level,
    target: Option<String>,
    properties: BTreeMap<QName, BTreeSet<String>>,
    remarks: Option<String>,
    lets: Vec<Let>,
}

impl ConstraintBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn formal_name(mut self, name: impl Into<String>) -> Self {
        self.formal_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Target expression; defaults to the context node.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Add one value to a (possibly multi-valued) property.
    pub fn property(mut self, name: QName, value: impl Into<String>) -> Self {
        self.properties.entry(name).or_default().insert(value.into());
        self
    }

    pub fn remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    pub fn let_binding(mut self, name: impl Into<String>, expression: impl AsRef<str>) -> Self {
        self.lets.push(Let::new(name, expression));
        self
    }

    pub fn allowed_values(
        self,
        values: impl IntoIterator<Item = AllowedValue>,
        allow_other: bool,
        extensible: Extensible,
    ) -> Result<Constraint, ConfigurationError> {
        let mut seen = HashSet::new();
        let mut list = Vec::new();
        for value in values {
            if !seen.insert(value.value.clone()) {
                return Err(ConfigurationError::DuplicateAllowedValue(value.value));
            }
            list.push(value);
        }
        self.finish(ConstraintKind::AllowedValues(AllowedValues {
            values: list,
            allow_other,
            extensible,
        }))
    }

    pub fn matches(
        self,
        pattern: Option<&str>,
        datatype: Option<DataType>,
    ) -> Result<Constraint, ConfigurationError> {
        if pattern.is_none() && datatype.is_none() {
            return Err(ConfigurationError::MissingMatchRule);
        }
        let pattern = pattern.map(compile_pattern).transpose()?;
        self.finish(ConstraintKind::Matches(Matches { pattern, datatype }))
    }

    pub fn expect(
        self,
        test: &str,
        message: Option<&str>,
    ) -> Result<Constraint, ConfigurationError> {
        let test = expression(test, "expect test")?;
        self.finish(ConstraintKind::Expect(Expect {
            test,
            message: message.map(str::to_string),
        }))
    }

    pub fn cardinality(
        self,
        min_occurs: Option<usize>,
        max_occurs: Option<usize>,
    ) -> Result<Constraint, ConfigurationError> {
        match (min_occurs, max_occurs) {
            (None, None) => return Err(ConfigurationError::MissingOccurrence),
            (Some(min), Some(max)) if min > max => {
                return Err(ConfigurationError::InvertedOccurrence { min, max });
            }
            _ => {}
        }
        self.finish(ConstraintKind::Cardinality(Cardinality {
            min_occurs,
            max_occurs,
        }))
    }

    pub fn index(
        self,
        name: &str,
        key_fields: Vec<KeyField>,
    ) -> Result<Constraint, ConfigurationError> {
        if name.trim().is_empty() {
            return Err(ConfigurationError::MissingIndexName("index"));
        }
        if key_fields.is_empty() {
            return Err(ConfigurationError::MissingKeyFields("index"));
        }
        self.finish(ConstraintKind::Index(IndexDef {
            name: name.trim().to_string(),
            key_fields,
        }))
    }

    pub fn index_has_key(
        self,
        index_name: &str,
        key_fields: Vec<KeyField>,
    ) -> Result<Constraint, ConfigurationError> {
        if index_name.trim().is_empty() {
            return Err(ConfigurationError::MissingIndexName("index-has-key"));
        }
        if key_fields.is_empty() {
            return Err(ConfigurationError::MissingKeyFields("index-has-key"));
        }
        self.finish(ConstraintKind::IndexHasKey(IndexHasKey {
            index_name: index_name.trim().to_string(),
            key_fields,
        }))
    }

    pub fn unique(self, key_fields: Vec<KeyField>) -> Result<Constraint, ConfigurationError> {
        if key_fields.is_empty() {
            return Err(ConfigurationError::MissingKeyFields("unique"));
        }
        self.finish(ConstraintKind::Unique(Unique { key_fields }))
    }

    fn finish(self, kind: ConstraintKind) -> Result<Constraint, ConfigurationError> {
        let target = match &self.target {
            Some(t) => expression(t, "target")?,
            None => Expression::context(),
        };
        check_lets(&self.lets)?;
        Ok(Constraint {
            id: self.id,
            formal_name: self.formal_name,
            description: self.description,
            source: self.source,
            level: self.level,
            target,
            properties: self.properties,
            remarks: self.remarks,
            lets: self.lets,
            kind,
        })
    }
}

/// Builds an immutable, shareable [`Definition`].
#[derive(Clone, Debug)]
pub struct DefinitionBuilder {
    name: String,
    kind: DefinitionKind,
    lets: Vec<Let>,
    constraints: Vec<Arc<Constraint>>,
}

impl DefinitionBuilder {
    pub(crate) fn new(name: impl Into<String>, kind: DefinitionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            lets: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn let_binding(mut self, name: impl Into<String>, expression: impl AsRef<str>) -> Self {
        self.lets.push(Let::new(name, expression));
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn constraints(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints
            .extend(constraints.into_iter().map(Arc::new));
        self
    }

    pub fn build(self) -> Result<Arc<Definition>, ConfigurationError> {
        check_lets(&self.lets)?;
        if self.kind != DefinitionKind::Assembly
            && let Some(c) = self.constraints.iter().find(|c| c.kind.is_assembly_only())
        {
            return Err(ConfigurationError::AssemblyOnly {
                constraint: c.kind.name(),
                kind: self.kind.to_string(),
                definition: self.name,
            });
        }
        Ok(Arc::new(Definition::new(
            self.name,
            self.kind,
            self.lets,
            self.constraints,
        )))
    }
}
