//! Node path rendering for findings and messages.

use std::sync::Arc;

use crate::enums::{NodeKind, PathFormat};
use crate::node::NodeRef;

/// Renders the location of a node as text.
pub trait PathFormatter: Send + Sync {
    fn format(&self, node: NodeRef<'_>) -> String;
}

/// Renders `/catalog[1]/party[2]/@id`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetapathFormatter;

impl PathFormatter for MetapathFormatter {
    fn format(&self, node: NodeRef<'_>) -> String {
        let mut segments: Vec<String> = node
            .ancestors_or_self()
            .filter_map(|n| match n.kind() {
                NodeKind::Document => None,
                NodeKind::Flag => Some(format!("@{}", n.name())),
                NodeKind::Assembly | NodeKind::Field => {
                    Some(format!("{}[{}]", n.name(), n.position()))
                }
            })
            .collect();
        if segments.is_empty() {
            return "/".to_string();
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }
}

/// Renders RFC 6901 style pointers, `/catalog/party/1/id`.
///
/// A zero-based index segment follows any node that has same-named siblings.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonPointerFormatter;

impl PathFormatter for JsonPointerFormatter {
    fn format(&self, node: NodeRef<'_>) -> String {
        let mut segments = Vec::new();
        for n in node.ancestors_or_self() {
            if n.kind() == NodeKind::Document {
                continue;
            }
            let repeated = n.kind() != NodeKind::Flag
                && n.parent().is_some_and(|p| {
                    p.children().filter(|c| c.name() == n.name()).count() > 1
                });
            if repeated {
                segments.push((n.position() - 1).to_string());
            }
            segments.push(escape_pointer(n.name()));
        }
        if segments.is_empty() {
            return String::new();
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// The formatter selected by a [`PathFormat`].
pub fn formatter_for(format: PathFormat) -> Arc<dyn PathFormatter> {
    match format {
        PathFormat::Metapath => Arc::new(MetapathFormatter),
        PathFormat::JsonPointer => Arc::new(JsonPointerFormatter),
    }
}
