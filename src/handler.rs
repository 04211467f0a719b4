//! Violation reporting interface and the message text shared by the
//! reference handlers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::enums::Level;
use crate::error::KeyError;
use crate::evaluate::{EvaluationContext, QueryEvaluator, render_message};
use crate::key::CompositeKey;
use crate::node::NodeRef;
use crate::path::{MetapathFormatter, PathFormatter};
use crate::types::{AllowedValue, Constraint, ConstraintKind};

/// The kind of violation a finding reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    CardinalityMinimum,
    CardinalityMaximum,
    IndexDuplicateKey,
    UniqueKey,
    KeyMatch,
    MatchPattern,
    MatchDatatype,
    Expect,
    AllowedValues,
    IndexDuplicateName,
    IndexMiss,
    MissingIndex,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::CardinalityMinimum => "cardinality-minimum",
            ViolationKind::CardinalityMaximum => "cardinality-maximum",
            ViolationKind::IndexDuplicateKey => "index-duplicate-key",
            ViolationKind::UniqueKey => "unique-key",
            ViolationKind::KeyMatch => "key-match",
            ViolationKind::MatchPattern => "match-pattern",
            ViolationKind::MatchDatatype => "match-datatype",
            ViolationKind::Expect => "expect",
            ViolationKind::AllowedValues => "allowed-values",
            ViolationKind::IndexDuplicateName => "index-duplicate-name",
            ViolationKind::IndexMiss => "index-miss",
            ViolationKind::MissingIndex => "missing-index",
        };
        f.write_str(s)
    }
}

// ─── ConstraintValidationHandler ────────────────────────────────────────────

/// Receives violations as the validator finds them.
///
/// `node` is the node whose definition declared the constraint; `target` is
/// the item the constraint was applied to.
pub trait ConstraintValidationHandler {
    fn handle_cardinality_minimum_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        targets: &[NodeRef<'_>],
    );

    fn handle_cardinality_maximum_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        targets: &[NodeRef<'_>],
    );

    /// `old` keeps its place in the index; `new` was not inserted.
    fn handle_index_duplicate_key_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        old: NodeRef<'_>,
        new: NodeRef<'_>,
        key: &CompositeKey,
    );

    fn handle_unique_key_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        old: NodeRef<'_>,
        new: NodeRef<'_>,
        key: &CompositeKey,
    );

    fn handle_key_match_error(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        error: &KeyError,
    );

    fn handle_match_pattern_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        value: &str,
    );

    fn handle_match_datatype_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        value: &str,
        error: &str,
    );

    /// `evaluator` and `context` are the ones the test ran with, for
    /// interpolating the constraint's message template.
    fn handle_expect_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        evaluator: &dyn QueryEvaluator,
        context: &EvaluationContext<'_>,
    );

    /// `failed` holds every constraint responsible for the rejection.
    fn handle_allowed_values_violation(&mut self, failed: &[Arc<Constraint>], target: NodeRef<'_>);

    /// Always reported as [`Level::Critical`].
    fn handle_index_duplicate_violation(&mut self, constraint: &Arc<Constraint>, node: NodeRef<'_>);

    fn handle_index_miss(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        key: &CompositeKey,
    );

    fn handle_missing_index_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        message: &str,
    );
}

/// Severity reported for an allowed-values violation: the highest level
/// among the responsible constraints.
pub fn allowed_values_level(failed: &[Arc<Constraint>]) -> Level {
    failed
        .iter()
        .map(|c| c.level)
        .max()
        .unwrap_or_default()
}

// ─── Messages ───────────────────────────────────────────────────────────────

/// Builds the human-readable text of each violation kind.
#[derive(Clone)]
pub struct Messages {
    formatter: Arc<dyn PathFormatter>,
}

impl Default for Messages {
    fn default() -> Self {
        Messages::new(Arc::new(MetapathFormatter))
    }
}

impl fmt::Debug for Messages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messages").finish_non_exhaustive()
    }
}

fn index_name(constraint: &Constraint) -> &str {
    match &constraint.kind {
        ConstraintKind::Index(def) => &def.name,
        ConstraintKind::IndexHasKey(def) => &def.index_name,
        _ => "",
    }
}

impl Messages {
    pub fn new(formatter: Arc<dyn PathFormatter>) -> Self {
        Self { formatter }
    }

    pub fn formatter(&self) -> &dyn PathFormatter {
        self.formatter.as_ref()
    }

    pub fn path(&self, node: NodeRef<'_>) -> String {
        self.formatter.format(node)
    }

    pub fn paths(&self, nodes: &[NodeRef<'_>]) -> Vec<String> {
        nodes.iter().map(|n| self.path(*n)).collect()
    }

    pub fn cardinality_minimum(&self, constraint: &Constraint, count: usize) -> String {
        let min = match &constraint.kind {
            ConstraintKind::Cardinality(c) => c.min_occurs.unwrap_or_default(),
            _ => 0,
        };
        format!(
            "cardinality {} is below required minimum {} for items matching '{}'",
            count, min, constraint.target
        )
    }

    pub fn cardinality_maximum(&self, constraint: &Constraint, count: usize) -> String {
        let max = match &constraint.kind {
            ConstraintKind::Cardinality(c) => c.max_occurs.unwrap_or_default(),
            _ => 0,
        };
        format!(
            "cardinality {} exceeds required maximum {} for items matching '{}'",
            count, max, constraint.target
        )
    }

    pub fn index_duplicate_key(
        &self,
        constraint: &Constraint,
        old: NodeRef<'_>,
        new: NodeRef<'_>,
        key: &CompositeKey,
    ) -> String {
        format!(
            "index '{}' has duplicate key {} for '{}', first defined at '{}'",
            index_name(constraint),
            key,
            self.path(new),
            self.path(old)
        )
    }

    pub fn unique_key(
        &self,
        constraint: &Constraint,
        old: NodeRef<'_>,
        new: NodeRef<'_>,
        key: &CompositeKey,
    ) -> String {
        format!(
            "unique constraint {} has duplicate key {} for '{}', first defined at '{}'",
            constraint.label(),
            key,
            self.path(new),
            self.path(old)
        )
    }

    pub fn key_match(&self, target: NodeRef<'_>, error: &KeyError) -> String {
        format!("key derivation failed for '{}': {}", self.path(target), error)
    }

    pub fn match_pattern(&self, constraint: &Constraint, target: NodeRef<'_>, value: &str) -> String {
        let pattern = match &constraint.kind {
            ConstraintKind::Matches(m) => m.pattern.as_ref().map(|p| p.as_str()).unwrap_or(""),
            _ => "",
        };
        format!(
            "value '{}' at '{}' does not match the pattern '{}'",
            value,
            self.path(target),
            pattern
        )
    }

    pub fn match_datatype(
        &self,
        constraint: &Constraint,
        target: NodeRef<'_>,
        value: &str,
        error: &str,
    ) -> String {
        let datatype = match &constraint.kind {
            ConstraintKind::Matches(m) => m.datatype.map(|d| d.name()).unwrap_or(""),
            _ => "",
        };
        format!(
            "value '{}' at '{}' is not a valid {}: {}",
            value,
            self.path(target),
            datatype,
            error
        )
    }

    /// The constraint's interpolated message template, or a default naming the test.
    pub fn expect(
        &self,
        constraint: &Constraint,
        target: NodeRef<'_>,
        evaluator: &dyn QueryEvaluator,
        context: &EvaluationContext<'_>,
    ) -> String {
        let ConstraintKind::Expect(expect) = &constraint.kind else {
            return format!("expect constraint {} failed", constraint.label());
        };
        match &expect.message {
            Some(template) => render_message(evaluator, template, target, context),
            None => format!(
                "expect test '{}' did not pass for '{}'",
                expect.test,
                self.path(target)
            ),
        }
    }

    pub fn allowed_values(&self, failed: &[Arc<Constraint>], target: NodeRef<'_>) -> String {
        let mut listed: Vec<&str> = Vec::new();
        for constraint in failed {
            if let ConstraintKind::AllowedValues(av) = &constraint.kind {
                for AllowedValue { value, .. } in &av.values {
                    if !listed.contains(&value.as_str()) {
                        listed.push(value);
                    }
                }
            }
        }
        format!(
            "value '{}' at '{}' is not one of the allowed values: {}",
            target.value().unwrap_or_default(),
            self.path(target),
            listed.join(", ")
        )
    }

    pub fn index_duplicate(&self, constraint: &Constraint) -> String {
        format!(
            "index '{}' is already defined; constraint {} was not applied",
            index_name(constraint),
            constraint.label()
        )
    }

    pub fn index_miss(&self, constraint: &Constraint, target: NodeRef<'_>, key: &CompositeKey) -> String {
        format!(
            "key {} derived from '{}' was not found in index '{}'",
            key,
            self.path(target),
            index_name(constraint)
        )
    }
}
