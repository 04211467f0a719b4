use metaschema_constraints::*;

use super::common::*;

#[test]
fn key_constraints_require_fields() {
    assert!(matches!(
        Constraint::builder().index("ids", vec![]),
        Err(ConfigurationError::MissingKeyFields("index"))
    ));
    assert!(matches!(
        Constraint::builder().unique(vec![]),
        Err(ConfigurationError::MissingKeyFields("unique"))
    ));
    assert!(matches!(
        Constraint::builder().index_has_key(" ", key("@id")),
        Err(ConfigurationError::MissingIndexName("index-has-key"))
    ));
}

#[test]
fn invalid_key_pattern_is_a_configuration_error() {
    assert!(matches!(
        KeyField::new("@id", Some("(")),
        Err(ConfigurationError::InvalidPattern { .. })
    ));
}

#[test]
fn target_defaults_to_context() {
    let c = Constraint::builder()
        .allowed_values(values(&["a"]), false, Extensible::External)
        .unwrap();
    assert!(c.target.is_context());
    assert_eq!(c.level, Level::Error);
    assert_eq!(c.source.kind, SourceKind::Model);
}

#[test]
fn properties_hold_multiple_values() {
    let name = QName::new("status");
    let c = Constraint::builder()
        .property(name.clone(), "draft")
        .property(name.clone(), "final")
        .property(name.clone(), "draft")
        .expect(".", None)
        .unwrap();
    let set = c.property(&name).unwrap();
    assert_eq!(set.len(), 2);
    assert!(set.contains("final"));
}

#[test]
fn assembly_only_kinds_rejected_on_flags() {
    let err = Definition::builder("id", DefinitionKind::Flag)
        .constraint(Constraint::builder().cardinality(Some(1), None).unwrap())
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::AssemblyOnly { .. }));
}

#[test]
fn constraint_sets_partition_by_kind_once() {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder().expect(".", None).unwrap(),
            Constraint::builder()
                .target("party")
                .unique(key("@id"))
                .unwrap(),
            Constraint::builder().expect("party", None).unwrap(),
        ],
    );
    let first = catalog.constraint_set() as *const _;
    let set = catalog.constraint_set();
    assert_eq!(set.expect.len(), 2);
    assert_eq!(set.unique.len(), 1);
    assert!(set.index.is_empty());
    assert!(std::ptr::eq(first, set));
}

#[test]
fn definitions_are_shared_across_threads() {
    let catalog = assembly(
        "catalog",
        vec![Constraint::builder().expect(".", None).unwrap()],
    );
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let def = std::sync::Arc::clone(&catalog);
            std::thread::spawn(move || def.constraint_set().expect.len())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
}

#[test]
fn constraints_match_their_targets() {
    let catalog = assembly("catalog", vec![]);
    let (doc, parties) = catalog_of_parties(&catalog, &["a", "b"]);
    let ctx = EvaluationContext::new();
    let root = doc.node(doc.root_assembly().unwrap());

    let by_party = Constraint::builder()
        .target("party")
        .cardinality(Some(1), None)
        .unwrap();
    let matched: Vec<_> = by_party
        .match_targets(&DefaultEvaluator, root, &ctx)
        .unwrap()
        .iter()
        .map(|n| n.id())
        .collect();
    assert_eq!(matched, parties);

    // atomic results are not targets
    let literal = Constraint::builder()
        .target("'text'")
        .expect(".", None)
        .unwrap();
    assert!(literal
        .match_targets(&DefaultEvaluator, root, &ctx)
        .unwrap()
        .is_empty());

    let broken = Constraint::builder()
        .target("party/")
        .expect(".", None)
        .unwrap();
    let err = broken
        .match_targets(&DefaultEvaluator, root, &ctx)
        .unwrap_err();
    assert_eq!(err.kind, EvaluationErrorKind::Syntax);
}

#[test]
fn contexts_without_a_value_match_nothing() {
    let title = field_with("title", vec![]);
    let catalog = assembly("catalog", vec![]);
    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), &catalog);
    let empty = doc.add_field_without_value(root, &title);
    let broken = Constraint::builder()
        .target("party/")
        .expect(".", None)
        .unwrap();
    let matched = broken
        .match_targets(&DefaultEvaluator, doc.node(empty), &EvaluationContext::new())
        .unwrap();
    assert!(matched.is_empty());
}
