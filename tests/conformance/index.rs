use metaschema_constraints::index::Index;
use metaschema_constraints::*;

use super::common::*;

fn index_constraint(name: &str, level: Level) -> Constraint {
    Constraint::builder()
        .id(format!("{}-index", name))
        .level(level)
        .target("party")
        .index(name, key("@id"))
        .unwrap()
}

#[test]
fn duplicate_key_keeps_first_item() {
    let catalog = assembly("catalog", vec![index_constraint("ids", Level::Error)]);
    let (doc, parties) = catalog_of_parties(&catalog, &["a", "a"]);

    let mut handler = FindingCollectingHandler::new();
    let ctx = EvaluationContext::new();
    let mut validator = ConstraintValidator::new(&doc, &DefaultEvaluator, &mut handler);
    validator.validate(doc.root(), &ctx).unwrap();

    let index = validator.index("ids").unwrap();
    let key: CompositeKey = ["a"].into_iter().collect();
    assert_eq!(index.get(&key), Some(parties[0]));
    assert_eq!(index.len(), 1);
    validator.finalize(&ctx).unwrap();

    let findings = handler.findings();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, ViolationKind::IndexDuplicateKey);
    assert_eq!(findings[0].target_ids, vec![parties[0], parties[1]]);
}

#[test]
fn duplicate_keys_do_not_abort_the_run() {
    let catalog = assembly(
        "catalog",
        vec![
            index_constraint("ids", Level::Warning),
            Constraint::builder()
                .target("party")
                .cardinality(None, Some(2))
                .unwrap(),
        ],
    );
    let (doc, _) = catalog_of_parties(&catalog, &["a", "a", "a"]);
    let result = run(&doc);
    assert_eq!(
        kinds(&result),
        vec![
            ViolationKind::CardinalityMaximum,
            ViolationKind::IndexDuplicateKey,
            ViolationKind::IndexDuplicateKey,
        ]
    );
}

#[test]
fn second_index_with_same_name_is_critical_and_skipped() {
    let catalog = assembly(
        "catalog",
        vec![
            index_constraint("ids", Level::Informational),
            Constraint::builder()
                .id("shadow")
                .level(Level::Informational)
                .target("party")
                .index("ids", key("@id"))
                .unwrap(),
        ],
    );
    let (doc, parties) = catalog_of_parties(&catalog, &["a", "b"]);

    let mut handler = FindingCollectingHandler::new();
    let ctx = EvaluationContext::new();
    let mut validator = ConstraintValidator::new(&doc, &DefaultEvaluator, &mut handler);
    validator.validate(doc.root(), &ctx).unwrap();
    assert_eq!(validator.index_names().count(), 1);
    assert_eq!(
        validator.index("ids").unwrap().get(&["b"].into_iter().collect()),
        Some(parties[1])
    );
    validator.finalize(&ctx).unwrap();

    let findings = handler.findings();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, ViolationKind::IndexDuplicateName);
    assert_eq!(findings[0].severity, Level::Critical);
    assert_eq!(handler.highest_severity(), Some(Level::Critical));
}

#[test]
fn unique_duplicate_aborts_the_run() {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .id("unique-party")
                .target("party")
                .unique(key("@id"))
                .unwrap(),
        ],
    );
    let (doc, _) = catalog_of_parties(&catalog, &["a", "b", "a", "b"]);

    let mut handler = FindingCollectingHandler::new();
    let err = validate_document(
        &doc,
        &DefaultEvaluator,
        &mut handler,
        ValidationOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::UniqueViolation { .. }));
    assert!(err.to_string().contains("'unique-party'"));

    // reported once, then the run stopped
    assert_eq!(handler.findings().len(), 1);
    assert_eq!(handler.findings()[0].kind, ViolationKind::UniqueKey);
}

#[test]
fn unique_indexes_are_private() {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .target("party")
                .unique(key("@id"))
                .unwrap(),
            Constraint::builder()
                .target("party")
                .index_has_key("ids", key("@id"))
                .unwrap(),
        ],
    );
    let (doc, _) = catalog_of_parties(&catalog, &["a"]);
    let result = run(&doc);
    assert_eq!(kinds(&result), vec![ViolationKind::MissingIndex]);
}

#[test]
fn direct_insertion_is_first_write_wins() {
    let catalog = assembly("catalog", vec![]);
    let (_, parties) = catalog_of_parties(&catalog, &["a", "b"]);
    let mut index = Index::new(key("@id"));
    let k: CompositeKey = ["k"].into_iter().collect();
    assert_eq!(index.insert(k.clone(), parties[0]), None);
    assert_eq!(index.insert(k.clone(), parties[1]), Some(parties[0]));
    assert_eq!(index.get(&k), Some(parties[0]));
}
