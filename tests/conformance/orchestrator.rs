use metaschema_constraints::*;

use super::common::*;

#[test]
fn cardinality_minimum_counts_zero_targets() {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .target("party")
                .cardinality(Some(1), None)
                .unwrap(),
        ],
    );
    let (doc, _) = catalog_of_parties(&catalog, &[]);
    let result = run(&doc);
    assert_eq!(kinds(&result), vec![ViolationKind::CardinalityMinimum]);
    assert!(result.findings[0].message.contains("cardinality 0"));
    assert!(result.findings[0].targets.is_empty());
    assert_eq!(result.findings[0].node, "/catalog[1]");
}

#[test]
fn cardinality_within_bounds_is_silent() {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .target("party")
                .cardinality(Some(1), Some(2))
                .unwrap(),
        ],
    );
    let (doc, _) = catalog_of_parties(&catalog, &["a", "b"]);
    assert!(run(&doc).findings.is_empty());
}

/// `catalog` references `ids` from a `link` field; `ids` is built by a
/// `registry` assembly visited later.
fn reference_before_index(link_value: &str) -> Document {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .id("link-resolves")
                .target("link")
                .index_has_key("ids", key("."))
                .unwrap(),
        ],
    );
    let registry = assembly(
        "registry",
        vec![
            Constraint::builder()
                .target("party")
                .index("ids", key("@id"))
                .unwrap(),
        ],
    );
    let party = assembly("party", vec![]);
    let id = flag("id");
    let link = field_with("link", vec![]);

    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), &catalog);
    doc.add_field(root, &link, link_value);
    let reg = doc.add_assembly(root, &registry);
    for value in ["a", "b"] {
        let p = doc.add_assembly(reg, &party);
        doc.add_flag(p, &id, value);
    }
    doc
}

#[test]
fn references_resolve_against_indexes_built_later() {
    assert!(run(&reference_before_index("b")).findings.is_empty());

    let result = run(&reference_before_index("c"));
    assert_eq!(kinds(&result), vec![ViolationKind::IndexMiss]);
    let finding = &result.findings[0];
    assert_eq!(finding.targets, vec!["/catalog[1]/link[1]"]);
    assert!(finding.message.contains("[c]"));
    assert!(finding.message.contains("'ids'"));
}

#[test]
fn unfinalized_runs_report_no_index_misses() {
    let doc = reference_before_index("c");
    let mut handler = FindingCollectingHandler::new();
    let ctx = EvaluationContext::new();
    {
        let mut validator = ConstraintValidator::new(&doc, &DefaultEvaluator, &mut handler);
        validator.validate(doc.root(), &ctx).unwrap();
        assert_eq!(validator.pending_references(), 1);
        assert!(validator.index("ids").is_some());
    }
    assert!(handler.findings().is_empty());
}

#[test]
fn subtrees_share_one_run() {
    let doc = reference_before_index("c");
    let root = doc.root_assembly().unwrap();
    let mut subtrees = doc.node(root).children().map(|c| c.id());
    let link = subtrees.next().unwrap();
    let registry = subtrees.next().unwrap();

    let mut handler = FindingCollectingHandler::new();
    let ctx = EvaluationContext::new();
    {
        let mut validator = ConstraintValidator::new(&doc, &DefaultEvaluator, &mut handler);
        validator.validate(registry, &ctx).unwrap();
        validator.validate(link, &ctx).unwrap();
        // the reference lives on the catalog, which was never visited
        assert_eq!(validator.pending_references(), 0);
        validator.validate(root, &ctx).unwrap();
        assert_eq!(validator.pending_references(), 1);
        validator.finalize(&ctx).unwrap();
    }
    let findings = handler.findings();
    // registry was visited twice, so its index name is taken the second time
    assert_eq!(
        findings.iter().map(|f| f.kind).collect::<Vec<_>>(),
        vec![ViolationKind::IndexDuplicateName, ViolationKind::IndexMiss]
    );
}

#[test]
fn pattern_and_datatype_are_checked_independently() {
    let count = field_with(
        "count",
        vec![
            Constraint::builder()
                .matches(Some("[0-9]+"), Some(DataType::PositiveInteger))
                .unwrap(),
        ],
    );
    let catalog = assembly("catalog", vec![]);
    let cases = [
        ("x", vec![ViolationKind::MatchPattern, ViolationKind::MatchDatatype]),
        ("0", vec![ViolationKind::MatchDatatype]),
        ("12", vec![]),
    ];
    for (value, expected) in cases {
        let mut doc = Document::new();
        let root = doc.add_assembly(doc.root(), &catalog);
        doc.add_field(root, &count, value);
        assert_eq!(kinds(&run(&doc)), expected, "value {}", value);
    }
}

#[test]
fn fields_without_values_are_skipped() {
    let note = field_with(
        "note",
        vec![
            Constraint::builder().matches(Some("x"), None).unwrap(),
            Constraint::builder().expect("'false'", None).unwrap(),
        ],
    );
    let catalog = assembly("catalog", vec![]);
    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), &catalog);
    doc.add_field_without_value(root, &note);
    assert!(run(&doc).findings.is_empty());
}

#[test]
fn definition_lets_are_visible_to_descendants() {
    let catalog = Definition::builder("catalog", DefinitionKind::Assembly)
        .let_binding("owner", "@owner")
        .build()
        .unwrap();
    let party = assembly(
        "party",
        vec![Constraint::builder().expect("$owner", None).unwrap()],
    );
    let owner = flag("owner");

    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), &catalog);
    doc.add_assembly(root, &party);
    assert_eq!(kinds(&run(&doc)), vec![ViolationKind::Expect]);

    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), &catalog);
    doc.add_flag(root, &owner, "acme");
    doc.add_assembly(root, &party);
    assert!(run(&doc).findings.is_empty());
}

#[test]
fn constraint_lets_stay_local() {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .let_binding("parties", "party")
                .expect("$parties", None)
                .unwrap(),
            Constraint::builder().expect("$parties", None).unwrap(),
        ],
    );
    let (doc, _) = catalog_of_parties(&catalog, &["a"]);
    let err = validate(&doc).unwrap_err();
    let ValidationError::Evaluation { path, source, .. } = err else {
        panic!("expected an evaluation error, got {err:?}");
    };
    assert_eq!(path, "/catalog[1]");
    assert_eq!(source.kind, EvaluationErrorKind::UnknownVariable);
}

#[test]
fn malformed_expressions_abort_with_context() {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .id("broken")
                .target("party/")
                .cardinality(Some(1), None)
                .unwrap(),
        ],
    );
    let (doc, _) = catalog_of_parties(&catalog, &["a"]);
    let err = validate(&doc).unwrap_err();
    assert!(matches!(
        &err,
        ValidationError::Evaluation { constraint, source, .. }
            if constraint == "'broken'" && source.kind == EvaluationErrorKind::Syntax
    ));
}

#[test]
fn flag_constraints_on_parent_field_resolve_with_the_field() {
    let kind = flag_with(
        "kind",
        vec![
            Constraint::builder()
                .target("..")
                .allowed_values(values(&["ok"]), false, Extensible::Model)
                .unwrap(),
        ],
    );
    let status = field_with("status", vec![]);
    let catalog = assembly("catalog", vec![]);
    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), &catalog);
    let field = doc.add_field(root, &status, "bad");
    doc.add_flag(field, &kind, "any");

    let result = run(&doc);
    assert_eq!(kinds(&result), vec![ViolationKind::AllowedValues]);
    assert_eq!(result.findings[0].node, "/catalog[1]/status[1]");
}

#[test]
fn nodes_without_constraints_still_descend() {
    let catalog = assembly("catalog", vec![]);
    let wrapper = assembly("wrapper", vec![]);
    let count = field_with(
        "count",
        vec![
            Constraint::builder()
                .matches(None, Some(DataType::Integer))
                .unwrap(),
        ],
    );
    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), &catalog);
    let w = doc.add_assembly(root, &wrapper);
    doc.add_field(w, &count, "1.5");
    let result = run(&doc);
    assert_eq!(kinds(&result), vec![ViolationKind::MatchDatatype]);
    assert_eq!(result.findings[0].node, "/catalog[1]/wrapper[1]/count[1]");
}
