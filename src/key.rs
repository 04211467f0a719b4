//! Composite key derivation for index, index-has-key and unique constraints.

use serde::Serialize;
use std::fmt;

use crate::error::{EvaluationError, EvaluationErrorKind, KeyError};
use crate::evaluate::{EvaluationContext, QueryEvaluator};
use crate::node::NodeRef;
use crate::types::KeyField;

/// An ordered sequence of strings, one per key field.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CompositeKey(Vec<String>);

impl CompositeKey {
    pub fn new(components: Vec<String>) -> Self {
        CompositeKey(components)
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CompositeKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        CompositeKey(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Derive `item`'s key from `key_fields`, in declaration order.
///
/// Each field's target must select exactly one item with a value. When the
/// field declares a pattern the value must match it in full; a pattern with
/// a single capture group contributes that group instead of the whole value.
pub fn derive_key(
    evaluator: &dyn QueryEvaluator,
    item: NodeRef<'_>,
    key_fields: &[KeyField],
    context: &EvaluationContext<'_>,
) -> Result<CompositeKey, KeyError> {
    let doc = item.document();
    let mut components = Vec::with_capacity(key_fields.len());

    for field in key_fields {
        let selected = evaluator
            .select(&field.target, item, context)
            .map_err(|source| KeyError::Evaluation {
                field: field.target.to_string(),
                source,
            })?;

        let value = match selected.as_slice() {
            [] => None,
            [single] => single.string_value(doc),
            many => {
                return Err(KeyError::Evaluation {
                    field: field.target.to_string(),
                    source: EvaluationError::new(
                        EvaluationErrorKind::TypeError,
                        format!("key field selected {} items, expected one", many.len()),
                    ),
                });
            }
        };
        let value = value.ok_or_else(|| KeyError::MissingValue {
            field: field.target.to_string(),
        })?;

        let component = match &field.pattern {
            Some(pattern) => pattern
                .normalize(value)
                .ok_or_else(|| KeyError::PatternMismatch {
                    pattern: pattern.as_str().to_string(),
                    value: value.to_string(),
                })?,
            None => value,
        };
        components.push(component.to_string());
    }

    Ok(CompositeKey(components))
}
