//! Findings and the handler that collects them.

use serde::{Serialize, Serializer};
use std::sync::Arc;

use crate::enums::Level;
use crate::error::KeyError;
use crate::evaluate::{EvaluationContext, QueryEvaluator};
use crate::handler::{ConstraintValidationHandler, Messages, ViolationKind, allowed_values_level};
use crate::key::CompositeKey;
use crate::node::{NodeId, NodeRef};
use crate::path::PathFormatter;
use crate::types::Constraint;

/// One reported outcome of applying a constraint to data.
#[derive(Clone, Debug, Serialize)]
pub struct Finding {
    pub kind: ViolationKind,
    pub severity: Level,
    /// The constraints responsible; more than one only for allowed-values.
    #[serde(serialize_with = "serialize_constraints")]
    pub constraints: Vec<Arc<Constraint>>,
    #[serde(skip)]
    pub node_id: NodeId,
    /// Path of the offending node.
    pub node: String,
    #[serde(skip)]
    pub target_ids: Vec<NodeId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    pub message: String,
    /// The underlying fault, for key derivation and datatype failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

fn serialize_constraints<S: Serializer>(
    constraints: &[Arc<Constraint>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(constraints.iter().map(|c| match &c.id {
        Some(id) => id.clone(),
        None => format!("{}({})", c.kind.name(), c.target),
    }))
}

/// The findings of one validation run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationResult {
    pub findings: Vec<Finding>,
    /// The highest severity among `findings`, `None` when there are none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_severity: Option<Level>,
}

impl ValidationResult {
    /// True when no finding reached [`Level::Error`].
    pub fn is_valid(&self) -> bool {
        self.highest_severity.is_none_or(|level| level < Level::Error)
    }

    pub fn findings_of(&self, kind: ViolationKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }
}

// ─── FindingCollectingHandler ───────────────────────────────────────────────

/// Accumulates findings in the order they are reported.
#[derive(Debug, Default)]
pub struct FindingCollectingHandler {
    messages: Messages,
    result: ValidationResult,
}

struct Draft<'a> {
    kind: ViolationKind,
    severity: Level,
    constraints: Vec<Arc<Constraint>>,
    node: NodeRef<'a>,
    targets: &'a [NodeRef<'a>],
    message: String,
    cause: Option<String>,
}

impl FindingCollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formatter(formatter: Arc<dyn PathFormatter>) -> Self {
        Self {
            messages: Messages::new(formatter),
            result: ValidationResult::default(),
        }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.result.findings
    }

    pub fn highest_severity(&self) -> Option<Level> {
        self.result.highest_severity
    }

    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
    }

    pub fn result(&self) -> &ValidationResult {
        &self.result
    }

    pub fn into_result(self) -> ValidationResult {
        self.result
    }

    fn push(&mut self, draft: Draft<'_>) {
        let finding = Finding {
            kind: draft.kind,
            severity: draft.severity,
            constraints: draft.constraints,
            node_id: draft.node.id(),
            node: self.messages.path(draft.node),
            target_ids: draft.targets.iter().map(|t| t.id()).collect(),
            targets: self.messages.paths(draft.targets),
            message: draft.message,
            cause: draft.cause,
        };
        self.result.highest_severity = self.result.highest_severity.max(Some(finding.severity));
        self.result.findings.push(finding);
    }
}

fn shared(constraint: &Arc<Constraint>) -> Vec<Arc<Constraint>> {
    vec![Arc::clone(constraint)]
}

impl ConstraintValidationHandler for FindingCollectingHandler {
    fn handle_cardinality_minimum_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        targets: &[NodeRef<'_>],
    ) {
        let message = self.messages.cardinality_minimum(constraint, targets.len());
        self.push(Draft {
            kind: ViolationKind::CardinalityMinimum,
            severity: constraint.level,
            constraints: shared(constraint),
            node,
            targets,
            message,
            cause: None,
        });
    }

    fn handle_cardinality_maximum_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        targets: &[NodeRef<'_>],
    ) {
        let message = self.messages.cardinality_maximum(constraint, targets.len());
        self.push(Draft {
            kind: ViolationKind::CardinalityMaximum,
            severity: constraint.level,
            constraints: shared(constraint),
            node,
            targets,
            message,
            cause: None,
        });
    }

    fn handle_index_duplicate_key_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        old: NodeRef<'_>,
        new: NodeRef<'_>,
        key: &CompositeKey,
    ) {
        let message = self.messages.index_duplicate_key(constraint, old, new, key);
        self.push(Draft {
            kind: ViolationKind::IndexDuplicateKey,
            severity: constraint.level,
            constraints: shared(constraint),
            node,
            targets: &[old, new],
            message,
            cause: None,
        });
    }

    fn handle_unique_key_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        old: NodeRef<'_>,
        new: NodeRef<'_>,
        key: &CompositeKey,
    ) {
        let message = self.messages.unique_key(constraint, old, new, key);
        self.push(Draft {
            kind: ViolationKind::UniqueKey,
            severity: constraint.level,
            constraints: shared(constraint),
            node,
            targets: &[old, new],
            message,
            cause: None,
        });
    }

    fn handle_key_match_error(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        error: &KeyError,
    ) {
        let message = self.messages.key_match(target, error);
        self.push(Draft {
            kind: ViolationKind::KeyMatch,
            severity: constraint.level,
            constraints: shared(constraint),
            node,
            targets: &[target],
            message,
            cause: Some(error.to_string()),
        });
    }

    fn handle_match_pattern_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        value: &str,
    ) {
        let message = self.messages.match_pattern(constraint, target, value);
        self.push(Draft {
            kind: ViolationKind::MatchPattern,
            severity: constraint.level,
            constraints: shared(constraint),
            node,
            targets: &[target],
            message,
            cause: None,
        });
    }

    fn handle_match_datatype_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        value: &str,
        error: &str,
    ) {
        let message = self.messages.match_datatype(constraint, target, value, error);
        self.push(Draft {
            kind: ViolationKind::MatchDatatype,
            severity: constraint.level,
            constraints: shared(constraint),
            node,
            targets: &[target],
            message,
            cause: Some(error.to_string()),
        });
    }

    fn handle_expect_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        evaluator: &dyn QueryEvaluator,
        context: &EvaluationContext<'_>,
    ) {
        let message = self.messages.expect(constraint, target, evaluator, context);
        self.push(Draft {
            kind: ViolationKind::Expect,
            severity: constraint.level,
            constraints: shared(constraint),
            node,
            targets: &[target],
            message,
            cause: None,
        });
    }

    fn handle_allowed_values_violation(&mut self, failed: &[Arc<Constraint>], target: NodeRef<'_>) {
        let message = self.messages.allowed_values(failed, target);
        self.push(Draft {
            kind: ViolationKind::AllowedValues,
            severity: allowed_values_level(failed),
            constraints: failed.to_vec(),
            node: target,
            targets: &[target],
            message,
            cause: None,
        });
    }

    fn handle_index_duplicate_violation(&mut self, constraint: &Arc<Constraint>, node: NodeRef<'_>) {
        let message = self.messages.index_duplicate(constraint);
        self.push(Draft {
            kind: ViolationKind::IndexDuplicateName,
            severity: Level::Critical,
            constraints: shared(constraint),
            node,
            targets: &[],
            message,
            cause: None,
        });
    }

    fn handle_index_miss(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        key: &CompositeKey,
    ) {
        let message = self.messages.index_miss(constraint, target, key);
        self.push(Draft {
            kind: ViolationKind::IndexMiss,
            severity: constraint.level,
            constraints: shared(constraint),
            node,
            targets: &[target],
            message,
            cause: None,
        });
    }

    fn handle_missing_index_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        message: &str,
    ) {
        self.push(Draft {
            kind: ViolationKind::MissingIndex,
            severity: constraint.level,
            constraints: shared(constraint),
            node,
            targets: &[target],
            message: message.to_string(),
            cause: None,
        });
    }
}
