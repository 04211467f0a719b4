use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Produced by the constraint and definition builders when a required
/// combination of properties is missing or malformed.
///
/// This is a schema-build-time failure; it never occurs during validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("cardinality constraint requires min-occurs or max-occurs")]
    MissingOccurrence,
    #[error("cardinality constraint has min-occurs {min} greater than max-occurs {max}")]
    InvertedOccurrence { min: usize, max: usize },
    #[error("matches constraint requires a pattern or a datatype")]
    MissingMatchRule,
    #[error("{0} constraint requires at least one key field")]
    MissingKeyFields(&'static str),
    #[error("{0} constraint requires an index name")]
    MissingIndexName(&'static str),
    #[error("allowed-values constraint declares value '{0}' more than once")]
    DuplicateAllowedValue(String),
    #[error("{0} expression must not be empty")]
    EmptyExpression(&'static str),
    #[error("invalid regular expression '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("let binding '{0}' is declared more than once")]
    DuplicateLet(String),
    #[error("{constraint} constraints may only be declared on assembly definitions, not on {kind} '{definition}'")]
    AssemblyOnly {
        constraint: &'static str,
        kind: String,
        definition: String,
    },
}

/// Error kind for query evaluator failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationErrorKind {
    Syntax,
    UnknownVariable,
    TypeError,
    CelError,
    Unsupported,
}

/// Produced by a [`QueryEvaluator`](crate::evaluate::QueryEvaluator) when an
/// expression cannot be evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct EvaluationError {
    pub kind: EvaluationErrorKind,
    pub message: String,
}

impl EvaluationError {
    pub fn new(kind: EvaluationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Failure to derive a composite key from an item.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key field '{field}' could not be evaluated: {source}")]
    Evaluation {
        field: String,
        #[source]
        source: EvaluationError,
    },
    #[error("key field '{field}' did not produce a value")]
    MissingValue { field: String },
    #[error("key field declares the pattern '{pattern}' which does not match the value '{value}'")]
    PatternMismatch { pattern: String, value: String },
}

/// A run-aborting failure returned by
/// [`ConstraintValidator::validate`](crate::validate::ConstraintValidator::validate)
/// or [`ConstraintValidator::finalize`](crate::validate::ConstraintValidator::finalize).
#[derive(Clone, Debug, Error)]
pub enum ValidationError {
    #[error("unable to evaluate {constraint} at '{path}': {source}")]
    Evaluation {
        /// Constraint identifier, or its target expression when it has none.
        constraint: String,
        path: String,
        #[source]
        source: EvaluationError,
    },
    #[error(
        "an allowed-values constraint with extensibility scope '{incoming}' exceeds the allowed scope '{recorded}' at '{path}'"
    )]
    AllowedValuesScope {
        incoming: crate::enums::Extensible,
        recorded: crate::enums::Extensible,
        path: String,
    },
    #[error("multiple allowed-values constraints have extensibility scope 'none' at '{path}'")]
    AllowedValuesConflict { path: String },
    #[error("unique constraint {constraint} found a duplicate key at '{path}': {message}")]
    UniqueViolation {
        constraint: String,
        path: String,
        message: String,
    },
    #[error("validation run has already been finalized")]
    AlreadyFinalized,
}

/// Error kind for constraint definition document failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    Syntax,
    TypeMismatch,
    Configuration,
    UnknownDefinition,
}

/// Produced by [`parse_schema`](crate::parse::parse_schema) when a constraint
/// definition document cannot be loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{}{message}", .path.as_ref().map(|p| format!("{}: ", p)).unwrap_or_default())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Report serialization failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SerializeError {
    pub message: String,
}
