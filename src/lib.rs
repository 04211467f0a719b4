//! Constraint model and validation engine for
//! [Metaschema](https://pages.nist.gov/metaschema/) document trees.
//!
//! Definitions declare constraints (allowed values, pattern and datatype
//! matches, expectations, cardinality, indexes, index references and
//! uniqueness). A validator walks an already materialized document, applies
//! every constraint in a fixed order, resolves cross-document index
//! references once the walk is done and reports violations to a handler:
//!
//! ```text
//! parse_schema(yaml) → Schema → Definitions ─┐
//!                                            ├→ ConstraintValidator → handler → ValidationResult
//! Document (built against the definitions) ──┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use metaschema_constraints::{Constraint, Definition, DefinitionKind, Document, KeyField};
//!
//! let id = Definition::builder("id", DefinitionKind::Flag).build()?;
//! let party = Definition::builder("party", DefinitionKind::Assembly).build()?;
//! let catalog = Definition::builder("catalog", DefinitionKind::Assembly)
//!     .constraint(
//!         Constraint::builder()
//!             .id("party-index")
//!             .target("party")
//!             .index("parties", vec![KeyField::new("@id", None)?])?,
//!     )
//!     .build()?;
//!
//! let mut doc = Document::new();
//! let root = doc.add_assembly(doc.root(), &catalog);
//! for value in ["a", "a"] {
//!     let p = doc.add_assembly(root, &party);
//!     doc.add_flag(p, &id, value);
//! }
//!
//! let result = metaschema_constraints::validate(&doc)?;
//! assert_eq!(result.findings.len(), 1);
//! assert!(!result.is_valid());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Feature Flags
//!
//! | Feature    | Default | Description |
//! |------------|---------|-------------|
//! | `cel-eval` | yes     | CEL test expressions via the [`cel`] crate. Enables [`evaluate::CelEvaluator`]. |

pub mod allowed_values;
pub mod builder;
pub mod datatype;
pub mod enums;
pub mod error;
pub mod evaluate;
pub mod finding;
pub mod handler;
pub mod index;
pub mod key;
pub mod logging;
pub mod metapath;
pub mod node;
pub mod parse;
pub mod path;
pub mod serialize;
pub mod types;
pub mod validate;

pub use enums::*;
pub use error::*;
pub use types::*;

pub use builder::{ConstraintBuilder, DefinitionBuilder};
pub use datatype::DataType;
pub use evaluate::{DefaultEvaluator, EvaluationContext, QueryEvaluator};
pub use finding::{Finding, FindingCollectingHandler, ValidationResult};
pub use handler::{ConstraintValidationHandler, ViolationKind};
pub use key::CompositeKey;
pub use logging::LoggingHandler;
pub use node::{Definition, Document, Item, NodeId, NodeRef};
pub use parse::{Schema, parse_schema};
pub use path::{JsonPointerFormatter, MetapathFormatter, PathFormatter};

// Entry points at the crate root.
pub use validate::{ConstraintValidator, ValidationOptions, validate, validate_document};

#[cfg(feature = "cel-eval")]
pub use evaluate::CelEvaluator;
