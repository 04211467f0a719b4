#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use metaschema_constraints::metapath::parse;
use metaschema_constraints::*;

#[derive(Debug, Arbitrary)]
struct Input {
    expression: String,
    ids: Vec<String>,
}

fuzz_target!(|input: Input| {
    let Ok(expr) = parse(&input.expression) else {
        return;
    };
    let (Ok(catalog), Ok(party), Ok(id)) = (
        Definition::builder("catalog", DefinitionKind::Assembly).build(),
        Definition::builder("party", DefinitionKind::Assembly).build(),
        Definition::builder("id", DefinitionKind::Flag).build(),
    ) else {
        return;
    };
    let mut doc = Document::new();
    let root = doc.add_assembly(doc.root(), &catalog);
    for value in input.ids.iter().take(8) {
        let p = doc.add_assembly(root, &party);
        doc.add_flag(p, &id, value.as_str());
    }
    let ctx = EvaluationContext::new();
    let _ = expr.evaluate(doc.node(root), &ctx);
});
