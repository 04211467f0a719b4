//! Per-node aggregation of allowed-values constraints.
//!
//! Every allowed-values constraint that targets a node is registered on that
//! node's [`ValueStatus`]; conformance is decided once per node. A status stays
//! registered after its verdict so that later constraints are still checked for
//! scope conflicts with the earlier ones.

use log::debug;
use std::sync::Arc;

use crate::enums::Extensible;
use crate::error::ValidationError;
use crate::node::NodeId;
use crate::types::{AllowedValues, Constraint, ConstraintKind};

/// The allowed-values constraints registered against one node.
#[derive(Clone, Debug)]
pub struct ValueStatus {
    node: NodeId,
    constraints: Vec<Arc<Constraint>>,
    allow_other: bool,
    extensible: Extensible,
    resolved: bool,
}

fn allowed_values(constraint: &Constraint) -> Option<&AllowedValues> {
    match &constraint.kind {
        ConstraintKind::AllowedValues(av) => Some(av),
        _ => None,
    }
}

impl ValueStatus {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            constraints: Vec::new(),
            allow_other: true,
            extensible: Extensible::External,
            resolved: false,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn constraints(&self) -> &[Arc<Constraint>] {
        &self.constraints
    }

    /// False once any registered constraint has forbidden other values.
    pub fn allow_other(&self) -> bool {
        self.allow_other
    }

    /// The most restrictive extensibility scope registered so far.
    pub fn extensible(&self) -> Extensible {
        self.extensible
    }

    /// True once a verdict has been reached for this node.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn mark_resolved(&mut self) {
        self.resolved = true;
    }

    /// Register an allowed-values constraint that matched this node.
    ///
    /// A stricter scope replaces the recorded one. A second `none` scope is a
    /// conflict, and a looser scope after a stricter one is a scope violation;
    /// both abort the run. `path` renders the node location for those errors.
    ///
    /// Constraints of any other kind are ignored.
    pub fn register(
        &mut self,
        constraint: &Arc<Constraint>,
        path: impl FnOnce() -> String,
    ) -> Result<(), ValidationError> {
        let Some(av) = allowed_values(constraint) else {
            return Ok(());
        };
        self.constraints.push(Arc::clone(constraint));
        if !av.allow_other {
            self.allow_other = false;
        }

        let incoming = av.extensible;
        if incoming > self.extensible {
            self.extensible = incoming;
        } else if incoming == Extensible::None && self.extensible == Extensible::None {
            return Err(ValidationError::AllowedValuesConflict { path: path() });
        } else if incoming < self.extensible {
            return Err(ValidationError::AllowedValuesScope {
                incoming,
                recorded: self.extensible,
                path: path(),
            });
        }
        Ok(())
    }

    /// Decide conformance of `value`.
    ///
    /// Returns the constraints to report when the value does not conform:
    /// only the closed (`none`) constraint if it rejects the value, otherwise
    /// every constraint when none of them lists the value and other values are
    /// not allowed. Returns `None` when the value conforms.
    pub fn resolve(&self, value: &str) -> Option<Vec<Arc<Constraint>>> {
        if self.constraints.is_empty() {
            return None;
        }

        let mut matched = false;
        let mut failed = Vec::new();
        for constraint in &self.constraints {
            let Some(av) = allowed_values(constraint) else {
                continue;
            };
            match av.allowed_value(value) {
                Some(allowed) => {
                    if let Some(version) = &allowed.deprecated_since {
                        debug!("value '{}' is deprecated since {}", value, version);
                    }
                    matched = true;
                }
                None if av.extensible == Extensible::None => {
                    return Some(vec![Arc::clone(constraint)]);
                }
                None => failed.push(Arc::clone(constraint)),
            }
        }

        if !matched && !self.allow_other {
            Some(failed)
        } else {
            None
        }
    }
}
