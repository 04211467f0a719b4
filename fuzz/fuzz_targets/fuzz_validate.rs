#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use metaschema_constraints::*;

/// A catalog of parties validated against fuzzer-chosen constraint inputs.
#[derive(Debug, Arbitrary)]
struct Input {
    target: String,
    key: String,
    pattern: Option<String>,
    test: String,
    allowed: Vec<String>,
    ids: Vec<String>,
}

fn constraints(input: &Input) -> Vec<Constraint> {
    let mut out = Vec::new();
    if let Ok(field) = KeyField::new(&input.key, input.pattern.as_deref()) {
        if let Ok(c) = Constraint::builder()
            .target(input.target.as_str())
            .index("ids", vec![field.clone()])
        {
            out.push(c);
        }
        if let Ok(c) = Constraint::builder()
            .target(input.target.as_str())
            .index_has_key("ids", vec![field])
        {
            out.push(c);
        }
    }
    if let Ok(c) = Constraint::builder()
        .target(input.target.as_str())
        .expect(&input.test, Some("{ @id }"))
    {
        out.push(c);
    }
    out
}

fuzz_target!(|input: Input| {
    let values = input
        .allowed
        .iter()
        .take(4)
        .map(|v| AllowedValue::new(v.as_str(), ""));
    let Ok(allowed) = Constraint::builder().allowed_values(values, false, Extensible::Model) else {
        return;
    };
    let (Ok(catalog), Ok(party), Ok(id)) = (
        Definition::builder("catalog", DefinitionKind::Assembly)
            .constraints(constraints(&input))
            .build(),
        Definition::builder("party", DefinitionKind::Assembly).build(),
        Definition::builder("id", DefinitionKind::Flag)
            .constraint(allowed)
            .build(),
    ) else {
        return;
    };
    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), &catalog);
    for value in input.ids.iter().take(8) {
        let p = doc.add_assembly(root, &party);
        doc.add_flag(p, &id, value.as_str());
    }
    let mut handler = FindingCollectingHandler::new();
    let _ = validate_document(
        &doc,
        &CelEvaluator::new(),
        &mut handler,
        ValidationOptions::default(),
    );
});
