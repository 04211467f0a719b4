//! The path subset understood by [`DefaultEvaluator`](crate::evaluate::DefaultEvaluator).
//!
//! ```text
//! expr   := path ( '|' path )*  |  'literal'
//! path   := '/'  |  [ '/' | '//' ] step ( ( '/' | '//' ) step )*
//! step   := '.' | '..' | '*' | '@*' | '@' name | name | '$' name
//! ```
//!
//! `$name` is only valid as the first step. Results preserve traversal order
//! with duplicates removed.

use std::collections::HashSet;

use crate::error::{EvaluationError, EvaluationErrorKind};
use crate::evaluate::EvaluationContext;
use crate::node::{Document, Item, NodeId, NodeRef};

/// A parsed expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathExpr {
    Literal(String),
    Union(Vec<Path>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    pub start: Start,
    pub steps: Vec<(Axis, Step)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Start {
    Context,
    Root,
    Variable(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Child,
    DescendantOrSelf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    SelfNode,
    Parent,
    Named(String),
    AnyChild,
    Flag(String),
    AnyFlag,
}

fn syntax(expr: &str, message: &str) -> EvaluationError {
    EvaluationError::new(
        EvaluationErrorKind::Syntax,
        format!("invalid path '{}': {}", expr, message),
    )
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// ─── Parsing ────────────────────────────────────────────────────────────────

/// Parse an expression.
pub fn parse(expr: &str) -> Result<PathExpr, EvaluationError> {
    let text = expr.trim();
    if text.is_empty() {
        return Err(syntax(expr, "empty expression"));
    }
    if let Some(literal) = parse_literal(text) {
        return Ok(PathExpr::Literal(literal.to_string()));
    }
    let mut paths = Vec::new();
    for branch in text.split('|') {
        paths.push(parse_path(branch.trim(), expr)?);
    }
    Ok(PathExpr::Union(paths))
}

fn parse_literal(text: &str) -> Option<&str> {
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            let inner = &text[1..text.len() - 1];
            if !inner.contains(quote) {
                return Some(inner);
            }
        }
    }
    None
}

fn parse_path(text: &str, expr: &str) -> Result<Path, EvaluationError> {
    if text.is_empty() {
        return Err(syntax(expr, "empty union branch"));
    }
    if text == "/" {
        return Ok(Path {
            start: Start::Root,
            steps: Vec::new(),
        });
    }

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    let mut start = Start::Context;
    let mut axis = Axis::Child;
    let mut steps = Vec::new();

    if chars[0] == '/' {
        start = Start::Root;
        i = 1;
        if chars.get(1) == Some(&'/') {
            axis = Axis::DescendantOrSelf;
            i = 2;
        }
    }

    let mut current = String::new();
    let mut first = true;
    loop {
        let at_end = i >= chars.len();
        if at_end || chars[i] == '/' {
            if current.is_empty() {
                return Err(syntax(expr, "empty step"));
            }
            let step_text = current.trim().to_string();
            current.clear();
            if let Some(var) = step_text.strip_prefix('$') {
                if !first || start != Start::Context {
                    return Err(syntax(expr, "a variable may only start a path"));
                }
                if !is_name(var) {
                    return Err(syntax(expr, &format!("invalid variable name '{}'", var)));
                }
                start = Start::Variable(var.to_string());
            } else {
                steps.push((axis, parse_step(&step_text, expr)?));
            }
            first = false;
            if at_end {
                break;
            }
            // consume separator(s)
            i += 1;
            axis = Axis::Child;
            if i < chars.len() && chars[i] == '/' {
                axis = Axis::DescendantOrSelf;
                i += 1;
            }
            if i >= chars.len() {
                return Err(syntax(expr, "trailing separator"));
            }
        } else {
            current.push(chars[i]);
            i += 1;
        }
    }

    Ok(Path { start, steps })
}

fn parse_step(text: &str, expr: &str) -> Result<Step, EvaluationError> {
    match text {
        "." => Ok(Step::SelfNode),
        ".." => Ok(Step::Parent),
        "*" => Ok(Step::AnyChild),
        "@*" => Ok(Step::AnyFlag),
        _ => {
            if let Some(flag) = text.strip_prefix('@') {
                if is_name(flag) {
                    return Ok(Step::Flag(flag.to_string()));
                }
                return Err(syntax(expr, &format!("invalid flag name '{}'", flag)));
            }
            if is_name(text) {
                Ok(Step::Named(text.to_string()))
            } else {
                Err(syntax(expr, &format!("unexpected step '{}'", text)))
            }
        }
    }
}

// ─── Evaluation ─────────────────────────────────────────────────────────────

impl PathExpr {
    /// Evaluate against `focus`, resolving variables from `context`.
    pub fn evaluate(
        &self,
        focus: NodeRef<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Vec<Item>, EvaluationError> {
        match self {
            PathExpr::Literal(s) => Ok(vec![Item::Atomic(s.clone())]),
            PathExpr::Union(paths) => {
                let mut out = Vec::new();
                let mut seen = HashSet::new();
                for path in paths {
                    for item in path.evaluate(focus, context)? {
                        if seen.insert(item.clone()) {
                            out.push(item);
                        }
                    }
                }
                Ok(out)
            }
        }
    }
}

impl Path {
    fn evaluate(
        &self,
        focus: NodeRef<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Vec<Item>, EvaluationError> {
        let doc = focus.document();
        let mut current: Vec<Item> = match &self.start {
            Start::Context => vec![Item::Node(focus.id())],
            Start::Root => vec![Item::Node(doc.root())],
            Start::Variable(name) => context
                .variable(name)
                .map(<[Item]>::to_vec)
                .ok_or_else(|| {
                    EvaluationError::new(
                        EvaluationErrorKind::UnknownVariable,
                        format!("variable '${}' is not bound", name),
                    )
                })?,
        };

        for (axis, step) in &self.steps {
            let mut next = Vec::new();
            let mut seen = HashSet::new();
            for item in &current {
                let node = match item {
                    Item::Node(id) => *id,
                    Item::Atomic(_) if *step == Step::SelfNode && *axis == Axis::Child => {
                        if seen.insert(item.clone()) {
                            next.push(item.clone());
                        }
                        continue;
                    }
                    Item::Atomic(s) => {
                        return Err(EvaluationError::new(
                            EvaluationErrorKind::TypeError,
                            format!("cannot navigate from atomic value '{}'", s),
                        ));
                    }
                };
                let contexts = match axis {
                    Axis::Child => vec![node],
                    Axis::DescendantOrSelf => descendants_or_self(doc, node),
                };
                for ctx in contexts {
                    for id in apply_step(doc.node(ctx), step) {
                        if seen.insert(Item::Node(id)) {
                            next.push(Item::Node(id));
                        }
                    }
                }
            }
            current = next;
        }
        Ok(current)
    }
}

fn descendants_or_self(doc: &Document, id: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![id];
    while let Some(next) = stack.pop() {
        out.push(next);
        let node = doc.node(next);
        let children: Vec<NodeId> = node.children().map(|c| c.id()).collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

fn apply_step(node: NodeRef<'_>, step: &Step) -> Vec<NodeId> {
    match step {
        Step::SelfNode => vec![node.id()],
        Step::Parent => node.parent().map(|p| p.id()).into_iter().collect(),
        Step::Named(name) => node
            .children()
            .filter(|c| c.name() == name)
            .map(|c| c.id())
            .collect(),
        Step::AnyChild => node.children().map(|c| c.id()).collect(),
        Step::Flag(name) => node.flag(name).map(|f| f.id()).into_iter().collect(),
        Step::AnyFlag => node.flags().map(|f| f.id()).collect(),
    }
}
