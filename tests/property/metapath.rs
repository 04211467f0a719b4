use metaschema_constraints::metapath::{PathExpr, parse};
use proptest::prelude::*;

fn arb_step() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(".".to_string()),
        Just("..".to_string()),
        Just("*".to_string()),
        Just("@*".to_string()),
        "[a-z][a-z0-9-]{0,6}",
        "@[a-z][a-z0-9]{0,4}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    // Arbitrary input yields a result or an error, never a panic
    #[test]
    fn parse_never_panics(input in "\\PC{0,40}") {
        let _ = parse(&input);
    }

    // Well-formed relative paths always parse to a single branch
    #[test]
    fn well_formed_paths_parse(steps in prop::collection::vec(arb_step(), 1..5)) {
        let text = steps.join("/");
        match parse(&text) {
            Ok(PathExpr::Union(paths)) => {
                prop_assert_eq!(paths.len(), 1);
                prop_assert_eq!(paths[0].steps.len(), steps.len());
            }
            other => prop_assert!(false, "unexpected {:?} for {}", other, text),
        }
    }

    // Each union branch becomes one path
    #[test]
    fn unions_split_on_bars(branches in prop::collection::vec(arb_step(), 1..4)) {
        let text = branches.join(" | ");
        match parse(&text) {
            Ok(PathExpr::Union(paths)) => prop_assert_eq!(paths.len(), branches.len()),
            other => prop_assert!(false, "unexpected {:?} for {}", other, text),
        }
    }
}
