//! Definitions and documents shared by the conformance suites.

use metaschema_constraints::*;
use std::sync::Arc;

pub fn flag(name: &str) -> Arc<Definition> {
    Definition::builder(name, DefinitionKind::Flag)
        .build()
        .unwrap()
}

pub fn flag_with(name: &str, constraints: Vec<Constraint>) -> Arc<Definition> {
    Definition::builder(name, DefinitionKind::Flag)
        .constraints(constraints)
        .build()
        .unwrap()
}

pub fn field_with(name: &str, constraints: Vec<Constraint>) -> Arc<Definition> {
    Definition::builder(name, DefinitionKind::Field)
        .constraints(constraints)
        .build()
        .unwrap()
}

pub fn assembly(name: &str, constraints: Vec<Constraint>) -> Arc<Definition> {
    Definition::builder(name, DefinitionKind::Assembly)
        .constraints(constraints)
        .build()
        .unwrap()
}

pub fn key(target: &str) -> Vec<KeyField> {
    vec![KeyField::new(target, None).unwrap()]
}

pub fn values(list: &[&str]) -> Vec<AllowedValue> {
    list.iter().map(|v| AllowedValue::new(*v, "")).collect()
}

/// A `catalog` root holding one `party` per entry of `ids`, each with an `@id` flag.
pub fn catalog_of_parties(catalog: &Arc<Definition>, ids: &[&str]) -> (Document, Vec<NodeId>) {
    let party = assembly("party", vec![]);
    let id = flag("id");
    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), catalog);
    let parties = ids
        .iter()
        .map(|value| {
            let p = doc.add_assembly(root, &party);
            doc.add_flag(p, &id, *value);
            p
        })
        .collect();
    (doc, parties)
}

pub fn run(doc: &Document) -> ValidationResult {
    validate(doc).expect("validation run should not abort")
}

pub fn kinds(result: &ValidationResult) -> Vec<ViolationKind> {
    result.findings.iter().map(|f| f.kind).collect()
}
