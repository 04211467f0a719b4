use metaschema_constraints::allowed_values::ValueStatus;
use metaschema_constraints::*;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn arb_extensible() -> impl Strategy<Value = Extensible> {
    prop_oneof![
        Just(Extensible::External),
        Just(Extensible::Model),
        Just(Extensible::None),
    ]
}

/// Small value sets drawn from a shared alphabet so overlaps are common.
fn arb_values() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-e]", 1..4)
}

fn constraint(values: &BTreeSet<String>, extensible: Extensible) -> Arc<Constraint> {
    Arc::new(
        Constraint::builder()
            .allowed_values(
                values.iter().map(|v| AllowedValue::new(v.as_str(), "")),
                false,
                extensible,
            )
            .unwrap(),
    )
}

fn status_node() -> NodeId {
    let catalog = Definition::builder("catalog", DefinitionKind::Assembly)
        .build()
        .unwrap();
    let mut doc = Document::new();
    doc.add_assembly(doc.root(), &catalog)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // Without a closed scope a value conforms exactly when some set lists it
    #[test]
    fn open_scopes_accept_the_union(
        sets in prop::collection::vec(arb_values(), 1..4),
        value in "[a-g]",
    ) {
        let mut status = ValueStatus::new(status_node());
        for set in &sets {
            status.register(&constraint(set, Extensible::Model), String::new).unwrap();
        }
        let listed = sets.iter().any(|s| s.contains(&value));
        match status.resolve(&value) {
            None => prop_assert!(listed),
            Some(failed) => {
                prop_assert!(!listed);
                prop_assert_eq!(failed.len(), sets.len());
            }
        }
    }

    // Registration only ever tightens the recorded scope
    #[test]
    fn scopes_only_tighten(scopes in prop::collection::vec(arb_extensible(), 1..6)) {
        let set: BTreeSet<String> = ["a".to_string()].into();
        let mut status = ValueStatus::new(status_node());
        let mut recorded = Extensible::External;
        for scope in scopes {
            let result = status.register(&constraint(&set, scope), String::new);
            let conflict = scope == Extensible::None && recorded == Extensible::None;
            if scope < recorded || conflict {
                prop_assert!(result.is_err());
                break;
            }
            prop_assert!(result.is_ok());
            recorded = recorded.max(scope);
            prop_assert_eq!(status.extensible(), recorded);
        }
    }

    // A closed constraint that rejects a value is the only one reported
    #[test]
    fn closed_rejection_is_reported_alone(
        open in arb_values(),
        closed in arb_values(),
        value in "[a-g]",
    ) {
        let mut status = ValueStatus::new(status_node());
        status.register(&constraint(&open, Extensible::Model), String::new).unwrap();
        let closed_constraint = constraint(&closed, Extensible::None);
        status.register(&closed_constraint, String::new).unwrap();

        let result = status.resolve(&value);
        if !closed.contains(&value) {
            let failed = result.unwrap();
            prop_assert_eq!(failed.len(), 1);
            prop_assert!(Arc::ptr_eq(&failed[0], &closed_constraint));
        } else {
            prop_assert!(result.is_none());
        }
    }
}
