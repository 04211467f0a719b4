//! A handler that writes each violation to the `log` facade.

use log::log_enabled;
use std::sync::Arc;

use crate::enums::Level;
use crate::error::KeyError;
use crate::evaluate::{EvaluationContext, QueryEvaluator};
use crate::handler::{ConstraintValidationHandler, Messages, ViolationKind, allowed_values_level};
use crate::key::CompositeKey;
use crate::node::NodeRef;
use crate::path::PathFormatter;
use crate::types::Constraint;

/// Log target used for every violation record.
pub const LOG_TARGET: &str = "metaschema_constraints::validation";

/// The `log` level a severity is written at.
pub fn log_level(level: Level) -> log::Level {
    match level {
        Level::Critical | Level::Error => log::Level::Error,
        Level::Warning => log::Level::Warn,
        Level::Informational => log::Level::Info,
    }
}

/// Emits one log record per violation and keeps nothing.
///
/// Messages are only rendered when the mapped level is enabled.
#[derive(Debug, Default)]
pub struct LoggingHandler {
    messages: Messages,
}

impl LoggingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formatter(formatter: Arc<dyn PathFormatter>) -> Self {
        Self {
            messages: Messages::new(formatter),
        }
    }

    fn emit(
        &self,
        kind: ViolationKind,
        severity: Level,
        node: NodeRef<'_>,
        message: impl FnOnce(&Messages) -> String,
    ) {
        let level = log_level(severity);
        if !log_enabled!(target: LOG_TARGET, level) {
            return;
        }
        log::log!(
            target: LOG_TARGET,
            level,
            "[{}] {}: {}",
            kind,
            self.messages.path(node),
            message(&self.messages)
        );
    }
}

impl ConstraintValidationHandler for LoggingHandler {
    fn handle_cardinality_minimum_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        targets: &[NodeRef<'_>],
    ) {
        self.emit(ViolationKind::CardinalityMinimum, constraint.level, node, |m| {
            m.cardinality_minimum(constraint, targets.len())
        });
    }

    fn handle_cardinality_maximum_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        targets: &[NodeRef<'_>],
    ) {
        self.emit(ViolationKind::CardinalityMaximum, constraint.level, node, |m| {
            m.cardinality_maximum(constraint, targets.len())
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
        self.emit(ViolationKind::IndexDuplicateKey, constraint.level, node, |m| {
            m.index_duplicate_key(constraint, old, new, key)
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
        self.emit(ViolationKind::UniqueKey, constraint.level, node, |m| {
            m.unique_key(constraint, old, new, key)
        });
    }

    fn handle_key_match_error(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        error: &KeyError,
    ) {
        self.emit(ViolationKind::KeyMatch, constraint.level, node, |m| {
            m.key_match(target, error)
        });
    }

    fn handle_match_pattern_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        value: &str,
    ) {
        self.emit(ViolationKind::MatchPattern, constraint.level, node, |m| {
            m.match_pattern(constraint, target, value)
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
        self.emit(ViolationKind::MatchDatatype, constraint.level, node, |m| {
            m.match_datatype(constraint, target, value, error)
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
        self.emit(ViolationKind::Expect, constraint.level, node, |m| {
            m.expect(constraint, target, evaluator, context)
        });
    }

    fn handle_allowed_values_violation(&mut self, failed: &[Arc<Constraint>], target: NodeRef<'_>) {
        self.emit(
            ViolationKind::AllowedValues,
            allowed_values_level(failed),
            target,
            |m| m.allowed_values(failed, target),
        );
    }

    fn handle_index_duplicate_violation(&mut self, constraint: &Arc<Constraint>, node: NodeRef<'_>) {
        self.emit(ViolationKind::IndexDuplicateName, Level::Critical, node, |m| {
            m.index_duplicate(constraint)
        });
    }

    fn handle_index_miss(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        target: NodeRef<'_>,
        key: &CompositeKey,
    ) {
        self.emit(ViolationKind::IndexMiss, constraint.level, node, |m| {
            m.index_miss(constraint, target, key)
        });
    }

    fn handle_missing_index_violation(
        &mut self,
        constraint: &Arc<Constraint>,
        node: NodeRef<'_>,
        _target: NodeRef<'_>,
        message: &str,
    ) {
        self.emit(ViolationKind::MissingIndex, constraint.level, node, |_| {
            message.to_string()
        });
    }
}
