// dot.rs — Graphviz DOT output for reference graphs
//
// Transforms a RefGraph into DOT format suitable for rendering with `dot`,
// `neato`, or other Graphviz layout engines. Type vertices render as boxes,
// operand slots as ellipses; slots whose refs are heap-indirected after
// cycle breaking render dashed.
//
// Preconditions: `graph` was built from `schema`; run after cycle breaking
//                if box styling should reflect the final model.
// Postconditions: returns a valid DOT string representing the graph.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::graph::{RefGraph, VertexKind};
use crate::model::Schema;

/// Emit the reference graph as a Graphviz DOT string.
pub fn emit_dot(schema: &Schema, graph: &RefGraph) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph schema {{").unwrap();
    writeln!(buf, "    rankdir=LR;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();
    writeln!(buf).unwrap();

    for vertex in graph.vertices() {
        let name = sanitize(&vertex.label);
        match &vertex.kind {
            VertexKind::Type { .. } => {
                writeln!(
                    buf,
                    "    {} [shape=box, label=\"{}\"];",
                    name, vertex.label
                )
                .unwrap();
            }
            VertexKind::Field { slot } | VertexKind::CaseOperand { slot, .. } => {
                let boxed = schema.slot(*slot).is_boxed;
                let style = if boxed { "dashed" } else { "solid" };
                writeln!(
                    buf,
                    "    {} [shape=ellipse, style={}, label=\"{}\"];",
                    name, style, vertex.label
                )
                .unwrap();
            }
        }
    }

    writeln!(buf).unwrap();
    for (from, to) in graph.edges() {
        writeln!(
            buf,
            "    {} -> {};",
            sanitize(&graph.vertex(*from).label),
            sanitize(&graph.vertex(*to).label)
        )
        .unwrap();
    }
    writeln!(buf, "}}").unwrap();
    buf
}

/// Replace characters DOT identifiers cannot carry.
fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxing::break_cycles;
    use crate::graph::build_graph;
    use crate::parse::parse_document;

    fn dot_of(yaml: &str) -> String {
        let doc: serde_yaml::Value = serde_yaml::from_str(yaml).expect("test yaml decodes");
        let mut schema = parse_document(&doc).schema.expect("schema");
        let graph = build_graph(&schema).graph;
        break_cycles(&mut schema, &graph);
        emit_dot(&schema, &graph)
    }

    #[test]
    fn emits_valid_dot_skeleton() {
        let dot = dot_of("models:\n  Identifier: String\n");
        assert!(dot.starts_with("digraph schema {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("Identifier [shape=box"));
        assert!(dot.contains("Identifier_0 [shape=ellipse"));
        assert!(dot.contains("Identifier_0 -> String;"));
    }

    #[test]
    fn boxed_slots_render_dashed() {
        let dot = dot_of(concat!(
            "models:\n",
            "  Datum:\n",
            "    - { Quotation: Datum }\n",
            "    - { EmptyList: [] }\n",
        ));
        assert!(dot.contains("Datum__Quotation_1 [shape=ellipse, style=dashed"), "{dot}");
    }
}
