use metaschema_constraints::serialize::{to_json, to_yaml};
use metaschema_constraints::*;

use super::common::*;

fn expect_on_catalog(level: Level, message: Option<&str>) -> Document {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .id("has-title")
                .level(level)
                .target("party")
                .expect("title", message)
                .unwrap(),
        ],
    );
    catalog_of_parties(&catalog, &["p1"]).0
}

#[test]
fn severity_follows_constraint_level() {
    for level in [
        Level::Informational,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ] {
        let result = run(&expect_on_catalog(level, None));
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].severity, level);
        assert_eq!(result.highest_severity, Some(level));
        assert_eq!(result.is_valid(), level < Level::Error);
    }
}

#[test]
fn expect_messages_interpolate_expressions() {
    let result = run(&expect_on_catalog(
        Level::Error,
        Some("party { @id } has no title"),
    ));
    assert_eq!(result.findings[0].message, "party p1 has no title");

    let result = run(&expect_on_catalog(Level::Error, None));
    assert_eq!(
        result.findings[0].message,
        "expect test 'title' did not pass for '/catalog[1]/party[1]'"
    );
}

#[test]
fn unparseable_template_segments_are_kept() {
    let result = run(&expect_on_catalog(Level::Error, Some("see { a// }")));
    assert_eq!(result.findings[0].message, "see { a// }");
}

#[test]
fn json_pointer_paths() {
    let options = ValidationOptions {
        path_format: PathFormat::JsonPointer,
        ..ValidationOptions::default()
    };
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .target("party")
                .index("ids", key("@id"))
                .unwrap(),
        ],
    );
    let (doc, _) = catalog_of_parties(&catalog, &["a", "a"]);
    let result = validate::validate_with_options(&doc, options).unwrap();
    let finding = &result.findings[0];
    assert_eq!(finding.node, "/catalog");
    assert_eq!(finding.targets, vec!["/catalog/party/0", "/catalog/party/1"]);
    assert!(finding.message.contains("'/catalog/party/1'"));
}

#[test]
fn reports_serialize_to_json_and_yaml() {
    let result = run(&expect_on_catalog(Level::Warning, None));

    let json: serde_json::Value = serde_json::from_str(&to_json(&result).unwrap()).unwrap();
    assert_eq!(json["highest_severity"], "warning");
    let finding = &json["findings"][0];
    assert_eq!(finding["kind"], "expect");
    assert_eq!(finding["severity"], "warning");
    assert_eq!(finding["constraints"][0], "has-title");
    assert_eq!(finding["node"], "/catalog[1]");
    assert_eq!(finding["targets"][0], "/catalog[1]/party[1]");
    assert!(finding.get("cause").is_none());
    assert!(finding.get("node_id").is_none());

    let yaml = to_yaml(&result).unwrap();
    assert!(yaml.contains("kind: expect"));
    assert!(yaml.contains("has-title"));
}

#[test]
fn anonymous_constraints_serialize_by_kind_and_target() {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .target("party")
                .cardinality(None, Some(0))
                .unwrap(),
        ],
    );
    let (doc, _) = catalog_of_parties(&catalog, &["a"]);
    let result = run(&doc);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["findings"][0]["constraints"][0], "cardinality(party)");
}

#[test]
fn empty_results_are_valid() {
    let catalog = assembly("catalog", vec![]);
    let (doc, _) = catalog_of_parties(&catalog, &["a"]);
    let result = run(&doc);
    assert!(result.is_valid());
    assert_eq!(result.highest_severity, None);
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("highest_severity").is_none());
    assert_eq!(json["findings"], serde_json::json!([]));
}

#[test]
fn findings_can_be_filtered_by_kind() {
    let catalog = assembly(
        "catalog",
        vec![
            Constraint::builder()
                .target("party")
                .cardinality(None, Some(1))
                .unwrap(),
            Constraint::builder()
                .target("party")
                .index("ids", key("@id"))
                .unwrap(),
        ],
    );
    let (doc, _) = catalog_of_parties(&catalog, &["a", "a", "b"]);
    let result = run(&doc);
    assert_eq!(result.findings_of(ViolationKind::IndexDuplicateKey).count(), 1);
    assert_eq!(result.findings_of(ViolationKind::CardinalityMaximum).count(), 1);
    assert_eq!(result.findings_of(ViolationKind::Expect).count(), 0);
}
