//! Insertion-ordered, first-write-wins key index.

use log::debug;
use std::collections::HashMap;

use crate::error::KeyError;
use crate::evaluate::{EvaluationContext, QueryEvaluator};
use crate::key::{CompositeKey, derive_key};
use crate::node::{NodeId, NodeRef};
use crate::types::KeyField;

/// Maps composite keys to the first item inserted under them.
///
/// Lives for one validation run.
#[derive(Clone, Debug)]
pub struct Index {
    key_fields: Vec<KeyField>,
    slots: HashMap<CompositeKey, usize>,
    entries: Vec<(CompositeKey, NodeId)>,
}

impl Index {
    pub fn new(key_fields: Vec<KeyField>) -> Self {
        Self {
            key_fields,
            slots: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn key_fields(&self) -> &[KeyField] {
        &self.key_fields
    }

    /// Derive `item`'s key and insert it.
    ///
    /// Returns the item already stored under the key together with the key,
    /// if any; the stored item is kept. Items without a value, and items whose
    /// key fields select no value, are skipped and yield `Ok(None)`.
    pub fn put(
        &mut self,
        evaluator: &dyn QueryEvaluator,
        item: NodeRef<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Option<(NodeId, CompositeKey)>, KeyError> {
        if !item.has_value() {
            return Ok(None);
        }
        match derive_key(evaluator, item, &self.key_fields, context) {
            Ok(key) => Ok(self.insert(key.clone(), item.id()).map(|old| (old, key))),
            Err(KeyError::MissingValue { field }) => {
                debug!(
                    "excluding node {} from index: key field '{}' has no value",
                    item.id().index(),
                    field
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Insert under an already derived key. First write wins.
    pub fn insert(&mut self, key: CompositeKey, item: NodeId) -> Option<NodeId> {
        if let Some(&slot) = self.slots.get(&key) {
            return Some(self.entries[slot].1);
        }
        self.slots.insert(key.clone(), self.entries.len());
        self.entries.push((key, item));
        None
    }

    pub fn get(&self, key: &CompositeKey) -> Option<NodeId> {
        self.slots.get(key).map(|&slot| self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, NodeId)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }
}
