use metaschema_constraints::*;
use proptest::prelude::*;
use std::collections::HashSet;

fn parties_with_ids(ids: &[String]) -> Document {
    let catalog = Definition::builder("catalog", DefinitionKind::Assembly)
        .constraint(
            Constraint::builder()
                .target("party")
                .index("ids", vec![KeyField::new("@id", None).unwrap()])
                .unwrap(),
        )
        .build()
        .unwrap();
    let party = Definition::builder("party", DefinitionKind::Assembly)
        .build()
        .unwrap();
    let id = Definition::builder("id", DefinitionKind::Flag).build().unwrap();

    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), &catalog);
    for value in ids {
        let p = doc.add_assembly(root, &party);
        doc.add_flag(p, &id, value.as_str());
    }
    doc
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // One duplicate-key finding per repeated id, and the first holder keeps the key
    #[test]
    fn duplicates_are_counted_and_first_wins(ids in prop::collection::vec("[a-d]", 0..12)) {
        let doc = parties_with_ids(&ids);
        let distinct: HashSet<&String> = ids.iter().collect();

        let mut handler = FindingCollectingHandler::new();
        let ctx = EvaluationContext::new();
        let mut validator = ConstraintValidator::new(&doc, &DefaultEvaluator, &mut handler);
        validator.validate(doc.root(), &ctx).unwrap();

        let index = validator.index("ids").unwrap();
        prop_assert_eq!(index.len(), distinct.len());
        let root = doc.root_assembly().unwrap();
        let parties: Vec<NodeId> = doc.node(root).children().map(|c| c.id()).collect();
        for value in &distinct {
            let first = ids.iter().position(|v| v == *value).unwrap();
            let key: CompositeKey = [value.as_str()].into_iter().collect();
            prop_assert_eq!(index.get(&key), Some(parties[first]));
        }
        validator.finalize(&ctx).unwrap();

        prop_assert_eq!(handler.findings().len(), ids.len() - distinct.len());
    }

    // The same document always yields the same findings in the same order
    #[test]
    fn runs_are_deterministic(ids in prop::collection::vec("[a-c]", 0..10)) {
        let doc = parties_with_ids(&ids);
        let first = validate(&doc).unwrap();
        let second = validate(&doc).unwrap();
        let messages = |r: &ValidationResult| {
            r.findings.iter().map(|f| f.message.clone()).collect::<Vec<_>>()
        };
        prop_assert_eq!(messages(&first), messages(&second));
    }
}
