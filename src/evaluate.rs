//! Query evaluation boundary.
//!
//! The validator never interprets expressions itself. It hands compiled
//! [`Expression`]s, a focus node and an [`EvaluationContext`] to a
//! [`QueryEvaluator`] and only looks at the result shape.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::*;
use crate::metapath;
use crate::node::{Document, Item, NodeRef};
use crate::types::{Expression, Let};

// ─── EvaluationContext ──────────────────────────────────────────────────────

/// A variable scope, chained to the scope it was created from.
#[derive(Debug, Default)]
pub struct EvaluationContext<'p> {
    parent: Option<&'p EvaluationContext<'p>>,
    variables: HashMap<String, Vec<Item>>,
}

impl EvaluationContext<'static> {
    pub fn new() -> Self {
        EvaluationContext::default()
    }
}

impl<'p> EvaluationContext<'p> {
    /// A new, empty scope whose lookups fall back to `self`.
    pub fn child(&self) -> EvaluationContext<'_> {
        EvaluationContext {
            parent: Some(self),
            variables: HashMap::new(),
        }
    }

    /// Bind a variable in this scope, shadowing any outer binding.
    pub fn bind(&mut self, name: impl Into<String>, items: Vec<Item>) {
        self.variables.insert(name.into(), items);
    }

    pub fn variable(&self, name: &str) -> Option<&[Item]> {
        match self.variables.get(name) {
            Some(items) => Some(items),
            None => self.parent.and_then(|p| p.variable(name)),
        }
    }

    /// Every visible binding, innermost scope winning.
    pub fn visible_variables(&self) -> HashMap<&str, &[Item]> {
        let mut out = match self.parent {
            Some(p) => p.visible_variables(),
            None => HashMap::new(),
        };
        for (name, items) in &self.variables {
            out.insert(name.as_str(), items.as_slice());
        }
        out
    }

    /// Number of scopes between this one and the outermost.
    pub fn depth(&self) -> usize {
        self.parent.map_or(0, |p| p.depth() + 1)
    }
}

// ─── QueryEvaluator ─────────────────────────────────────────────────────────

/// Extension point for the query language.
pub trait QueryEvaluator {
    /// Evaluate `expression` relative to `focus` and return the result sequence.
    fn select(
        &self,
        expression: &Expression,
        focus: NodeRef<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Vec<Item>, EvaluationError>;

    /// Evaluate `expression` relative to `focus` as a boolean test.
    fn test(
        &self,
        expression: &Expression,
        focus: NodeRef<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<bool, EvaluationError>;
}

/// Evaluate `lets` in order against `focus`, each seeing the ones before it.
///
/// Returns `None` when there is nothing to bind so the caller can keep
/// using `context` unchanged.
pub fn bind_lets<'c>(
    evaluator: &dyn QueryEvaluator,
    lets: &[Let],
    focus: NodeRef<'_>,
    context: &'c EvaluationContext<'_>,
) -> Result<Option<EvaluationContext<'c>>, EvaluationError> {
    if lets.is_empty() {
        return Ok(None);
    }
    let mut scope = context.child();
    for binding in lets {
        let items = evaluator.select(&binding.expression, focus, &scope)?;
        scope.bind(binding.name.clone(), items);
    }
    Ok(Some(scope))
}

/// String values of a result sequence; items without a value are skipped.
pub fn item_strings(doc: &Document, items: &[Item]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| i.string_value(doc))
        .map(str::to_string)
        .collect()
}

static TEMPLATE_EXPR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*([^{}]+?)\s*\}").unwrap());

/// Interpolate `{ expr }` segments of a message template.
///
/// Each segment is evaluated with [`QueryEvaluator::select`] against `focus`;
/// a segment that fails to evaluate is left in place verbatim.
pub fn render_message(
    evaluator: &dyn QueryEvaluator,
    template: &str,
    focus: NodeRef<'_>,
    context: &EvaluationContext<'_>,
) -> String {
    TEMPLATE_EXPR_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let expr = Expression::new(&caps[1]);
            match evaluator.select(&expr, focus, context) {
                Ok(items) => item_strings(focus.document(), &items).join(", "),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

// ─── DefaultEvaluator ───────────────────────────────────────────────────────

/// Path-based evaluator backed by [`metapath`].
///
/// Tests use the effective boolean value of the selected sequence: empty is
/// false, a single atomic `"false"`, `"0"` or `""` is false, anything else is true.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultEvaluator;

impl QueryEvaluator for DefaultEvaluator {
    fn select(
        &self,
        expression: &Expression,
        focus: NodeRef<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Vec<Item>, EvaluationError> {
        metapath::parse(expression.as_str())?.evaluate(focus, context)
    }

    fn test(
        &self,
        expression: &Expression,
        focus: NodeRef<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<bool, EvaluationError> {
        let items = self.select(expression, focus, context)?;
        Ok(match items.as_slice() {
            [] => false,
            [Item::Atomic(s)] => !matches!(s.as_str(), "" | "false" | "0"),
            _ => true,
        })
    }
}

// ─── CelEvaluator (behind `cel-eval` feature) ───────────────────────────────

/// Evaluator that selects with paths and tests with CEL via the `cel` crate.
///
/// A test sees these bindings:
/// - `value`: the focus value (string or null)
/// - `name`: the focus node name
/// - `flags`: map of flag name to value
/// - `node`: JSON projection of the focus subtree (`name`, `value`, `flags`,
///   `children`), built only for expressions that reference it
/// - `vars`: every visible let variable; those with CEL-compatible names are
///   also bound directly
///
/// A variable holding one item is a string, otherwise a list of strings.
#[cfg(feature = "cel-eval")]
#[derive(Clone, Copy, Debug, Default)]
pub struct CelEvaluator {
    paths: DefaultEvaluator,
}

#[cfg(feature = "cel-eval")]
impl CelEvaluator {
    pub fn new() -> Self {
        CelEvaluator::default()
    }
}

#[cfg(feature = "cel-eval")]
static CEL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_a-zA-Z][_a-zA-Z0-9]*$").unwrap());

#[cfg(feature = "cel-eval")]
const RESERVED_BINDINGS: [&str; 5] = ["value", "name", "flags", "node", "vars"];

#[cfg(feature = "cel-eval")]
impl QueryEvaluator for CelEvaluator {
    fn select(
        &self,
        expression: &Expression,
        focus: NodeRef<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Vec<Item>, EvaluationError> {
        self.paths.select(expression, focus, context)
    }

    fn test(
        &self,
        expression: &Expression,
        focus: NodeRef<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<bool, EvaluationError> {
        let program = cel::Program::compile(expression.as_str()).map_err(|e| {
            EvaluationError::new(
                EvaluationErrorKind::CelError,
                format!("CEL compile error: {}", e),
            )
        })?;

        let with_node = program.references().has_variable("node");
        let bindings = cel_bindings(focus, context, with_node);
        let mut cel_ctx = cel::Context::default();
        if let serde_json::Value::Object(map) = &bindings {
            for (key, value) in map {
                cel_ctx.add_variable_from_value(key.as_str(), json_to_cel(value));
            }
        }

        match program.execute(&cel_ctx) {
            Ok(cel::Value::Bool(b)) => Ok(b),
            Ok(other) => Err(EvaluationError::new(
                EvaluationErrorKind::TypeError,
                format!("test expression must produce a boolean, got {:?}", other),
            )),
            // Missing map keys and unbound names read as a failed test.
            Err(cel::ExecutionError::NoSuchKey(_))
            | Err(cel::ExecutionError::UndeclaredReference(_)) => Ok(false),
            Err(e) => Err(EvaluationError::new(
                EvaluationErrorKind::CelError,
                format!("CEL execution error: {}", e),
            )),
        }
    }
}

#[cfg(feature = "cel-eval")]
fn cel_bindings(
    focus: NodeRef<'_>,
    context: &EvaluationContext<'_>,
    with_node: bool,
) -> serde_json::Value {
    use serde_json::{Map, Value, json};

    let doc = focus.document();
    let mut vars = Map::new();
    for (name, items) in context.visible_variables() {
        let strings = item_strings(doc, items);
        let value = match strings.as_slice() {
            [single] if items.len() == 1 => Value::String(single.clone()),
            _ => json!(strings),
        };
        vars.insert(name.to_string(), value);
    }

    let mut root = Map::new();
    for (name, value) in &vars {
        if CEL_ID_RE.is_match(name) && !RESERVED_BINDINGS.contains(&name.as_str()) {
            root.insert(name.clone(), value.clone());
        }
    }
    root.insert(
        "value".to_string(),
        focus.value().map_or(Value::Null, |v| json!(v)),
    );
    root.insert("name".to_string(), json!(focus.name()));
    root.insert("flags".to_string(), flag_map(focus));
    if with_node {
        root.insert("node".to_string(), project(focus));
    }
    root.insert("vars".to_string(), Value::Object(vars));
    Value::Object(root)
}

#[cfg(feature = "cel-eval")]
fn flag_map(node: NodeRef<'_>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = node
        .flags()
        .map(|f| {
            (
                f.name().to_string(),
                serde_json::Value::String(f.value().unwrap_or_default().to_string()),
            )
        })
        .collect();
    serde_json::Value::Object(map)
}

#[cfg(feature = "cel-eval")]
fn project(node: NodeRef<'_>) -> serde_json::Value {
    serde_json::json!({
        "name": node.name(),
        "value": node.value(),
        "flags": flag_map(node),
        "children": node.children().map(project).collect::<Vec<_>>(),
    })
}

/// Convert serde_json::Value → cel::Value.
#[cfg(feature = "cel-eval")]
fn json_to_cel(value: &serde_json::Value) -> cel::Value {
    use serde_json::Value;
    use std::sync::Arc;

    match value {
        Value::Null => cel::Value::Null,
        Value::Bool(b) => cel::Value::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                cel::Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                cel::Value::UInt(u)
            } else if let Some(f) = n.as_f64() {
                cel::Value::Float(f)
            } else {
                cel::Value::Null
            }
        }
        Value::String(s) => cel::Value::String(Arc::new(s.clone())),
        Value::Array(arr) => cel::Value::List(Arc::new(arr.iter().map(json_to_cel).collect())),
        Value::Object(map) => {
            let entries: HashMap<String, cel::Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), json_to_cel(v)))
                .collect();
            entries.into()
        }
    }
}
