//! The validation orchestrator.
//!
//! A [`ConstraintValidator`] walks a document depth-first and applies the
//! constraints declared on each node's definition, in this order:
//!
//! ```text
//! expect → allowed-values → index-has-key (deferred) → matches
//!        → cardinality → index → unique            (assemblies only)
//! ```
//!
//! A node's own constraints run before its flags and model children are
//! visited. Allowed-values conformance of a flag or field is decided once the
//! node and its flags have been visited, or at finalize when
//! [`ValidationOptions::defer_value_resolution`] is set. Index references are
//! only resolved by [`ConstraintValidator::finalize`], after every index has
//! been built.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use crate::allowed_values::ValueStatus;
use crate::enums::{NodeKind, PathFormat};
use crate::error::*;
use crate::evaluate::{DefaultEvaluator, EvaluationContext, QueryEvaluator, bind_lets};
use crate::finding::{FindingCollectingHandler, ValidationResult};
use crate::handler::ConstraintValidationHandler;
use crate::index::Index;
use crate::key::derive_key;
use crate::node::{Definition, Document, Item, NodeId, NodeRef};
use crate::path::{PathFormatter, formatter_for};
use crate::types::{Constraint, ConstraintKind};

// ─── Options ────────────────────────────────────────────────────────────────

/// Per-run settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ValidationOptions {
    /// Path syntax used in run-aborting errors and by
    /// [`validate_with_options`] for findings.
    pub path_format: PathFormat,
    /// Decide allowed-values conformance of flags and fields at finalize
    /// instead of when the walk leaves them, so that constraints reaching a
    /// node later in the walk (`..` or absolute targets) join its verdict.
    /// When unset, a constraint reaching a node whose verdict was already
    /// reached is checked for scope conflicts and otherwise ignored, and nodes
    /// first reached after the walk left them are resolved at finalize.
    pub defer_value_resolution: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            path_format: PathFormat::default(),
            defer_value_resolution: false,
        }
    }
}

// ─── ConstraintValidator ────────────────────────────────────────────────────

/// An index-has-key check recorded during the walk.
#[derive(Debug)]
struct DeferredKeyReference {
    node: NodeId,
    targets: Vec<NodeId>,
    constraint: Arc<Constraint>,
    /// Variables visible when the targets were selected.
    bindings: Vec<(String, Vec<Item>)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunState {
    Walking,
    Finalized,
}

/// Working state for one validation run.
///
/// Call [`validate`](Self::validate) once per subtree, then
/// [`finalize`](Self::finalize) exactly once. A validator is not reusable;
/// construct a new one for each run.
pub struct ConstraintValidator<'a> {
    document: &'a Document,
    evaluator: &'a dyn QueryEvaluator,
    handler: &'a mut dyn ConstraintValidationHandler,
    options: ValidationOptions,
    formatter: Arc<dyn PathFormatter>,
    value_status: BTreeMap<NodeId, ValueStatus>,
    indexes: HashMap<String, Index>,
    deferred: VecDeque<DeferredKeyReference>,
    state: RunState,
}

impl<'a> ConstraintValidator<'a> {
    pub fn new(
        document: &'a Document,
        evaluator: &'a dyn QueryEvaluator,
        handler: &'a mut dyn ConstraintValidationHandler,
    ) -> Self {
        Self::with_options(document, evaluator, handler, ValidationOptions::default())
    }

    pub fn with_options(
        document: &'a Document,
        evaluator: &'a dyn QueryEvaluator,
        handler: &'a mut dyn ConstraintValidationHandler,
        options: ValidationOptions,
    ) -> Self {
        Self {
            document,
            evaluator,
            handler,
            formatter: formatter_for(options.path_format),
            options,
            value_status: BTreeMap::new(),
            indexes: HashMap::new(),
            deferred: VecDeque::new(),
            state: RunState::Walking,
        }
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Names of the indexes built so far.
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    /// Number of index-has-key checks waiting for [`finalize`](Self::finalize).
    pub fn pending_references(&self) -> usize {
        self.deferred.len()
    }

    /// Walk the subtree rooted at `root`.
    pub fn validate(
        &mut self,
        root: NodeId,
        context: &EvaluationContext<'_>,
    ) -> Result<(), ValidationError> {
        if self.state == RunState::Finalized {
            return Err(ValidationError::AlreadyFinalized);
        }
        self.visit(root, context)
    }

    /// Resolve every deferred index reference and any unresolved value statuses.
    ///
    /// May only be called once.
    pub fn finalize(&mut self, context: &EvaluationContext<'_>) -> Result<(), ValidationError> {
        if self.state == RunState::Finalized {
            return Err(ValidationError::AlreadyFinalized);
        }
        self.state = RunState::Finalized;
        debug!(
            "finalizing: {} deferred references, {} indexes",
            self.deferred.len(),
            self.indexes.len()
        );

        while let Some(reference) = self.deferred.pop_front() {
            let mut scope = context.child();
            for (name, items) in reference.bindings {
                scope.bind(name, items);
            }
            self.resolve_reference(&reference.constraint, reference.node, &reference.targets, &scope);
        }

        let doc = self.document;
        let unresolved: Vec<NodeId> = self
            .value_status
            .iter()
            .filter(|(_, status)| !status.is_resolved())
            .map(|(&id, _)| id)
            .collect();
        for id in unresolved {
            let node = doc.node(id);
            match node.kind() {
                NodeKind::Flag | NodeKind::Field => self.resolve_value(node),
                NodeKind::Assembly | NodeKind::Document => {
                    debug!(
                        "discarding allowed-values status of structural node {}",
                        self.path(node)
                    );
                }
            }
        }
        self.value_status.clear();
        Ok(())
    }

    fn path(&self, node: NodeRef<'_>) -> String {
        self.formatter.format(node)
    }

    fn wrap(&self, constraint: &Constraint, node: NodeRef<'_>, source: EvaluationError) -> ValidationError {
        ValidationError::Evaluation {
            constraint: constraint.label(),
            path: self.path(node),
            source,
        }
    }

    // ─── Walk ───────────────────────────────────────────────────────────────

    fn visit(&mut self, id: NodeId, context: &EvaluationContext<'_>) -> Result<(), ValidationError> {
        let doc = self.document;
        let node = doc.node(id);
        trace!("visiting {:?} {}", node.kind(), self.path(node));

        let Some(definition) = node.definition() else {
            for child in node.children() {
                self.visit(child.id(), context)?;
            }
            return Ok(());
        };

        let scope = bind_lets(self.evaluator, definition.lets(), node, context).map_err(|source| {
            ValidationError::Evaluation {
                constraint: format!("let bindings of '{}'", definition.name()),
                path: self.path(node),
                source,
            }
        })?;
        let context = scope.as_ref().unwrap_or(context);

        self.apply_constraints(node, definition, context)?;

        for flag in node.flags() {
            self.visit(flag.id(), context)?;
        }
        for child in node.children() {
            self.visit(child.id(), context)?;
        }

        if node.kind().is_value_bearing() && !self.options.defer_value_resolution {
            self.resolve_value(node);
        }
        Ok(())
    }

    fn apply_constraints(
        &mut self,
        node: NodeRef<'a>,
        definition: &Definition,
        context: &EvaluationContext<'_>,
    ) -> Result<(), ValidationError> {
        let set = definition.constraint_set();
        for c in &set.expect {
            self.apply(c, node, context, Self::validate_expect)?;
        }
        for c in &set.allowed_values {
            self.apply(c, node, context, Self::validate_allowed_values)?;
        }
        for c in &set.index_has_key {
            self.apply(c, node, context, Self::defer_index_has_key)?;
        }
        for c in &set.matches {
            self.apply(c, node, context, Self::validate_matches)?;
        }
        if node.kind() == NodeKind::Assembly {
            for c in &set.cardinality {
                self.apply(c, node, context, Self::validate_cardinality)?;
            }
            for c in &set.index {
                self.apply(c, node, context, Self::validate_index)?;
            }
            for c in &set.unique {
                self.apply(c, node, context, Self::validate_unique)?;
            }
        }
        Ok(())
    }

    /// Bind the constraint's own lets, select its targets and run `check`.
    fn apply(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'a>,
        context: &EvaluationContext<'_>,
        check: fn(
            &mut Self,
            &Arc<Constraint>,
            NodeRef<'a>,
            Vec<NodeRef<'a>>,
            &EvaluationContext<'_>,
        ) -> Result<(), ValidationError>,
    ) -> Result<(), ValidationError> {
        trace!(
            "applying {} constraint {} at {}",
            constraint.kind.name(),
            constraint.label(),
            self.path(node)
        );
        let scope = bind_lets(self.evaluator, &constraint.lets, node, context)
            .map_err(|e| self.wrap(constraint, node, e))?;
        let context = scope.as_ref().unwrap_or(context);
        let targets = self.match_targets(constraint, node, context)?;
        check(self, constraint, node, targets, context)
    }

    fn match_targets(
        &self,
        constraint: &Constraint,
        node: NodeRef<'a>,
        context: &EvaluationContext<'_>,
    ) -> Result<Vec<NodeRef<'a>>, ValidationError> {
        constraint
            .match_targets(self.evaluator, node, context)
            .map_err(|e| self.wrap(constraint, node, e))
    }

    // ─── Per-kind checks ────────────────────────────────────────────────────

    fn validate_expect(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'a>,
        targets: Vec<NodeRef<'a>>,
        context: &EvaluationContext<'_>,
    ) -> Result<(), ValidationError> {
        let ConstraintKind::Expect(expect) = &constraint.kind else {
            return Ok(());
        };
        for target in targets {
            let passed = self
                .evaluator
                .test(&expect.test, target, context)
                .map_err(|e| self.wrap(constraint, target, e))?;
            if !passed {
                self.handler
                    .handle_expect_violation(constraint, node, target, self.evaluator, context);
            }
        }
        Ok(())
    }

    fn validate_allowed_values(
        &mut self,
        constraint: &Arc<Constraint>,
        _node: NodeRef<'a>,
        targets: Vec<NodeRef<'a>>,
        _context: &EvaluationContext<'_>,
    ) -> Result<(), ValidationError> {
        for target in targets {
            let formatter = Arc::clone(&self.formatter);
            let status = self
                .value_status
                .entry(target.id())
                .or_insert_with(|| ValueStatus::new(target.id()));
            status.register(constraint, || formatter.format(target))?;
            if status.is_resolved() {
                debug!(
                    "{} reached {} after its value was resolved; not included in the verdict",
                    constraint.label(),
                    formatter.format(target)
                );
            }
        }
        Ok(())
    }

    fn defer_index_has_key(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'a>,
        targets: Vec<NodeRef<'a>>,
        context: &EvaluationContext<'_>,
    ) -> Result<(), ValidationError> {
        if targets.is_empty() {
            return Ok(());
        }
        let bindings = context
            .visible_variables()
            .into_iter()
            .map(|(name, items)| (name.to_string(), items.to_vec()))
            .collect();
        self.deferred.push_back(DeferredKeyReference {
            node: node.id(),
            targets: targets.iter().map(|t| t.id()).collect(),
            constraint: Arc::clone(constraint),
            bindings,
        });
        Ok(())
    }

    fn validate_matches(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'a>,
        targets: Vec<NodeRef<'a>>,
        _context: &EvaluationContext<'_>,
    ) -> Result<(), ValidationError> {
        let ConstraintKind::Matches(matches) = &constraint.kind else {
            return Ok(());
        };
        for target in targets {
            let Some(value) = target.value() else {
                continue;
            };
            if let Some(pattern) = &matches.pattern
                && !pattern.is_match(value)
            {
                self.handler
                    .handle_match_pattern_violation(constraint, node, target, value);
            }
            if let Some(datatype) = matches.datatype
                && let Err(error) = datatype.validate(value)
            {
                self.handler
                    .handle_match_datatype_violation(constraint, node, target, value, &error);
            }
        }
        Ok(())
    }

    fn validate_cardinality(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'a>,
        targets: Vec<NodeRef<'a>>,
        _context: &EvaluationContext<'_>,
    ) -> Result<(), ValidationError> {
        let ConstraintKind::Cardinality(cardinality) = &constraint.kind else {
            return Ok(());
        };
        let count = targets.len();
        if let Some(min) = cardinality.min_occurs
            && count < min
        {
            self.handler
                .handle_cardinality_minimum_violation(constraint, node, &targets);
        }
        if let Some(max) = cardinality.max_occurs
            && count > max
        {
            self.handler
                .handle_cardinality_maximum_violation(constraint, node, &targets);
        }
        Ok(())
    }

    fn validate_index(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'a>,
        targets: Vec<NodeRef<'a>>,
        context: &EvaluationContext<'_>,
    ) -> Result<(), ValidationError> {
        let ConstraintKind::Index(def) = &constraint.kind else {
            return Ok(());
        };
        if self.indexes.contains_key(&def.name) {
            self.handler.handle_index_duplicate_violation(constraint, node);
            return Ok(());
        }

        let doc = self.document;
        let mut index = Index::new(def.key_fields.clone());
        for target in targets {
            match index.put(self.evaluator, target, context) {
                Ok(None) => {}
                Ok(Some((old, key))) => self.handler.handle_index_duplicate_key_violation(
                    constraint,
                    node,
                    doc.node(old),
                    target,
                    &key,
                ),
                Err(KeyError::Evaluation { source, .. }) => {
                    return Err(self.wrap(constraint, target, source));
                }
                Err(error) => self
                    .handler
                    .handle_key_match_error(constraint, node, target, &error),
            }
        }
        debug!("built index '{}' with {} keys", def.name, index.len());
        self.indexes.insert(def.name.clone(), index);
        Ok(())
    }

    fn validate_unique(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'a>,
        targets: Vec<NodeRef<'a>>,
        context: &EvaluationContext<'_>,
    ) -> Result<(), ValidationError> {
        let ConstraintKind::Unique(unique) = &constraint.kind else {
            return Ok(());
        };
        let doc = self.document;
        let mut index = Index::new(unique.key_fields.clone());
        for target in targets {
            match index.put(self.evaluator, target, context) {
                Ok(None) => {}
                Ok(Some((old, key))) => {
                    let old = doc.node(old);
                    self.handler
                        .handle_unique_key_violation(constraint, node, old, target, &key);
                    return Err(ValidationError::UniqueViolation {
                        constraint: constraint.label(),
                        path: self.path(node),
                        message: format!(
                            "key {} of '{}' was already used by '{}'",
                            key,
                            self.path(target),
                            self.path(old)
                        ),
                    });
                }
                Err(KeyError::Evaluation { source, .. }) => {
                    return Err(self.wrap(constraint, target, source));
                }
                Err(error) => self
                    .handler
                    .handle_key_match_error(constraint, node, target, &error),
            }
        }
        Ok(())
    }

    // ─── Resolution ─────────────────────────────────────────────────────────

    /// Reach the single allowed-values verdict for `node`, if it has a status.
    fn resolve_value(&mut self, node: NodeRef<'_>) {
        let Some(status) = self.value_status.get_mut(&node.id()) else {
            return;
        };
        if status.is_resolved() {
            return;
        }
        status.mark_resolved();
        let failed = node.value().and_then(|value| status.resolve(value));
        if let Some(failed) = failed {
            self.handler.handle_allowed_values_violation(&failed, node);
        }
    }

    fn resolve_reference(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeId,
        targets: &[NodeId],
        context: &EvaluationContext<'_>,
    ) {
        let ConstraintKind::IndexHasKey(reference) = &constraint.kind else {
            return;
        };
        let doc = self.document;
        let node = doc.node(node);
        for &id in targets {
            let target = doc.node(id);
            let key = match derive_key(self.evaluator, target, &reference.key_fields, context) {
                Ok(key) => key,
                Err(error) => {
                    self.handler
                        .handle_key_match_error(constraint, node, target, &error);
                    continue;
                }
            };
            match self.indexes.get(&reference.index_name) {
                None => {
                    let message = format!(
                        "index '{}' referenced by {} at '{}' is not defined",
                        reference.index_name,
                        constraint.label(),
                        self.path(target)
                    );
                    self.handler
                        .handle_missing_index_violation(constraint, node, target, &message);
                }
                Some(index) => {
                    if index.get(&key).is_none() {
                        self.handler.handle_index_miss(constraint, node, target, &key);
                    }
                }
            }
        }
    }
}

// ─── Entry points ───────────────────────────────────────────────────────────

/// Validate the whole document and finalize, reporting to `handler`.
pub fn validate_document(
    document: &Document,
    evaluator: &dyn QueryEvaluator,
    handler: &mut dyn ConstraintValidationHandler,
    options: ValidationOptions,
) -> Result<(), ValidationError> {
    let context = EvaluationContext::new();
    let mut validator = ConstraintValidator::with_options(document, evaluator, handler, options);
    validator.validate(document.root(), &context)?;
    validator.finalize(&context)
}

/// Validate with the path evaluator and collect findings.
pub fn validate(document: &Document) -> Result<ValidationResult, ValidationError> {
    validate_with_options(document, ValidationOptions::default())
}

/// Like [`validate`], with findings rendered in `options.path_format`.
pub fn validate_with_options(
    document: &Document,
    options: ValidationOptions,
) -> Result<ValidationResult, ValidationError> {
    let mut handler = FindingCollectingHandler::with_formatter(formatter_for(options.path_format));
    validate_document(document, &DefaultEvaluator, &mut handler, options)?;
    Ok(handler.into_result())
}
