// boxing.rs — Recursion breaking over the reference graph
//
// Finds strongly connected components in the reference graph and marks every
// operand slot on a cycle as heap-indirected, so each schema type ends with
// a statically known size. Also forces the unsized-string primitive behind a
// box wherever it surfaces. This pass is the sole mutator of the schema
// after parsing; running it twice yields no further changes.
//
// Preconditions: `graph` was built from this `schema` and neither has been
//                modified since.
// Postconditions: every cycle in the reference graph crosses a boxed slot;
//                 every `str` leaf is unsized and boxed.
// Failure modes: a cycle with no slot left to box (not constructible under
//                the current shape rules) is reported, never looped on.
// Side effects: mutates `is_boxed`/`is_sized` flags in `schema`.

use crate::diag::{codes, Diagnostic, Locus};
use crate::graph::{RefGraph, VertexId};
use crate::model::{Schema, SlotId, Target, TypeRef, UNSIZED_PRIMITIVE};

// ── Public types ────────────────────────────────────────────────────────────

/// Result of cycle breaking.
#[derive(Debug)]
pub struct BoxingResult {
    /// Slots whose refs gained a box in this run, in schema order per SCC.
    pub boxed_slots: Vec<SlotId>,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Break every reference cycle by boxing all participating operand slots,
/// then force sizing rules for the unsized string primitive.
pub fn break_cycles(schema: &mut Schema, graph: &RefGraph) -> BoxingResult {
    let mut boxed_slots = Vec::new();
    let mut diagnostics = Vec::new();

    for component in strongly_connected_components(graph) {
        let nontrivial = component.len() > 1
            || component.iter().any(|&v| graph.has_self_loop(v));
        if !nontrivial {
            continue;
        }

        let mut boxed_any = false;
        let mut has_slot = false;
        for &vid in &component {
            let Some(slot) = graph.vertex(vid).slot() else { continue };
            has_slot = true;
            let r = schema.slot_mut(slot);
            if r.is_array || r.is_boxed {
                boxed_any = true;
                continue;
            }
            r.is_boxed = true;
            boxed_any = true;
            boxed_slots.push(slot);
        }

        if !has_slot || !boxed_any {
            let labels: Vec<&str> = component
                .iter()
                .map(|&v| graph.vertex(v).label.as_str())
                .collect();
            diagnostics.push(
                Diagnostic::error(
                    Locus::root().key("models"),
                    format!("reference cycle cannot be broken: {}", labels.join(" -> ")),
                )
                .with_code(codes::E0100),
            );
        }
    }

    force_unsized_leaves(schema, &mut boxed_slots);

    BoxingResult { boxed_slots, diagnostics }
}

// ── Unsized leaves ──────────────────────────────────────────────────────────

/// Mark every `str` leaf unsized and box it if nothing wraps it yet, so the
/// emitted form is always the sized wrapper.
fn force_unsized_leaves(schema: &mut Schema, boxed_slots: &mut Vec<SlotId>) {
    let mut slots = Vec::new();
    schema.for_each_ref(|slot, _| {
        if slots.last() != Some(&slot) {
            slots.push(slot);
        }
    });
    for slot in slots {
        if force_unsized(schema.slot_mut(slot)) {
            boxed_slots.push(slot);
        }
    }
}

fn force_unsized(r: &mut TypeRef) -> bool {
    match &mut r.target {
        Target::Name(name) if name == UNSIZED_PRIMITIVE => {
            r.is_sized = false;
            if r.is_boxed {
                false
            } else {
                r.is_boxed = true;
                true
            }
        }
        Target::Elem(inner) => force_unsized(inner),
        _ => false,
    }
}

// ── Tarjan's SCC enumeration ────────────────────────────────────────────────

/// Enumerate strongly connected components in deterministic vertex order.
pub fn strongly_connected_components(graph: &RefGraph) -> Vec<Vec<VertexId>> {
    let n = graph.vertex_count();
    let mut state = Tarjan {
        graph,
        counter: 0,
        index: vec![None; n],
        lowlink: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        components: Vec::new(),
    };
    for v in 0..n {
        if state.index[v].is_none() {
            state.strongconnect(VertexId(v as u32));
        }
    }
    state.components
}

struct Tarjan<'g> {
    graph: &'g RefGraph,
    counter: u32,
    index: Vec<Option<u32>>,
    lowlink: Vec<u32>,
    on_stack: Vec<bool>,
    stack: Vec<VertexId>,
    components: Vec<Vec<VertexId>>,
}

impl Tarjan<'_> {
    fn strongconnect(&mut self, v: VertexId) {
        let vi = v.0 as usize;
        self.index[vi] = Some(self.counter);
        self.lowlink[vi] = self.counter;
        self.counter += 1;
        self.stack.push(v);
        self.on_stack[vi] = true;

        for &w in self.graph.out_neighbors(v) {
            let wi = w.0 as usize;
            match self.index[wi] {
                None => {
                    self.strongconnect(w);
                    self.lowlink[vi] = self.lowlink[vi].min(self.lowlink[wi]);
                }
                Some(w_index) if self.on_stack[wi] => {
                    self.lowlink[vi] = self.lowlink[vi].min(w_index);
                }
                Some(_) => {}
            }
        }

        if self.lowlink[vi] == self.index[vi].expect("indexed above") {
            let mut component = Vec::new();
            loop {
                let w = self.stack.pop().expect("stack holds the component");
                self.on_stack[w.0 as usize] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            component.reverse();
            self.components.push(component);
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::model::Decl;
    use crate::parse::parse_document;

    fn schema_of(yaml: &str) -> Schema {
        let doc: serde_yaml::Value = serde_yaml::from_str(yaml).expect("test yaml decodes");
        let parsed = parse_document(&doc);
        assert!(
            !crate::diag::has_errors(&parsed.diagnostics),
            "parse errors: {:#?}",
            parsed.diagnostics
        );
        parsed.schema.expect("schema")
    }

    fn broken(yaml: &str) -> (Schema, BoxingResult) {
        let mut schema = schema_of(yaml);
        let graph = build_graph(&schema).graph;
        let result = break_cycles(&mut schema, &graph);
        assert!(
            !crate::diag::has_errors(&result.diagnostics),
            "boxing errors: {:#?}",
            result.diagnostics
        );
        (schema, result)
    }

    fn sum_operand<'s>(schema: &'s Schema, ty: &str, case: &str) -> &'s TypeRef {
        match schema.decl(ty).expect("type declared") {
            Decl::Sum(d) => {
                let c = d.cases.iter().find(|c| c.name == case).expect("case exists");
                &c.operands[0]
            }
            other => panic!("expected sum, got {:?}", other.name()),
        }
    }

    // ── Cycle breaking ──────────────────────────────────────────────────

    #[test]
    fn self_cycle_boxes_the_operand() {
        let (schema, result) = broken(concat!(
            "models:\n",
            "  Datum:\n",
            "    - { Quotation: Datum }\n",
            "    - { EmptyList: [] }\n",
        ));
        assert!(sum_operand(&schema, "Datum", "Quotation").is_boxed);
        assert_eq!(result.boxed_slots.len(), 1);
    }

    #[test]
    fn cross_cycle_boxes_every_participating_slot() {
        let (schema, _) = broken(concat!(
            "models:\n",
            "  A:\n",
            "    - { WrapB: B }\n",
            "    - { Stop: [] }\n",
            "  B:\n",
            "    - { WrapA: A }\n",
            "    - { Stop: [] }\n",
        ));
        assert!(sum_operand(&schema, "A", "WrapB").is_boxed);
        assert!(sum_operand(&schema, "B", "WrapA").is_boxed);
    }

    #[test]
    fn record_field_cycle_boxes_the_field() {
        let (schema, _) = broken(concat!(
            "models:\n",
            "  Expression:\n",
            "    - { Conditional: Conditional }\n",
            "    - { Stop: [] }\n",
            "  Conditional:\n",
            "    test: Expression\n",
        ));
        match schema.decl("Conditional").unwrap() {
            Decl::Record(d) => assert!(d.fields[0].ty.is_boxed),
            other => panic!("expected record, got {:?}", other.name()),
        }
        assert!(sum_operand(&schema, "Expression", "Conditional").is_boxed);
    }

    #[test]
    fn array_recursion_needs_no_box() {
        // The array already imposes a heap boundary; the slot is not in the
        // graph, so no cycle exists to break.
        let (schema, result) = broken(concat!(
            "models:\n",
            "  Datum:\n",
            "    - { Compound: [Datum] }\n",
            "    - { EmptyList: [] }\n",
        ));
        assert!(!sum_operand(&schema, "Datum", "Compound").is_boxed);
        assert!(result.boxed_slots.is_empty());
    }

    #[test]
    fn acyclic_schema_unchanged() {
        let (schema, result) = broken("models:\n  Identifier: String\n");
        match schema.decl("Identifier").unwrap() {
            Decl::Newtype(d) => assert!(!d.operands[0].is_boxed),
            other => panic!("expected newtype, got {:?}", other.name()),
        }
        assert!(result.boxed_slots.is_empty());
    }

    #[test]
    fn pre_boxed_slot_is_not_recorded_again() {
        let (schema, result) = broken(concat!(
            "models:\n",
            "  Datum:\n",
            "    - { Quotation: \"~Datum\" }\n",
            "    - { EmptyList: [] }\n",
        ));
        assert!(sum_operand(&schema, "Datum", "Quotation").is_boxed);
        assert!(result.boxed_slots.is_empty(), "already boxed by the `~` decorator");
    }

    #[test]
    fn rerun_is_idempotent() {
        let mut schema = schema_of(concat!(
            "models:\n",
            "  Datum:\n",
            "    - { Quotation: Datum }\n",
            "    - { EmptyList: [] }\n",
        ));
        let graph = build_graph(&schema).graph;
        let first = break_cycles(&mut schema, &graph);
        assert_eq!(first.boxed_slots.len(), 1);
        let after_first = schema.clone();

        let graph = build_graph(&schema).graph;
        let second = break_cycles(&mut schema, &graph);
        assert!(second.boxed_slots.is_empty());
        assert_eq!(schema, after_first);
    }

    // ── Unsized leaves ──────────────────────────────────────────────────

    #[test]
    fn pre_boxed_str_is_marked_unsized() {
        let (schema, result) = broken("models:\n  Identifier: \"~str\"\n");
        match schema.decl("Identifier").unwrap() {
            Decl::Newtype(d) => {
                assert!(d.operands[0].is_boxed);
                assert!(!d.operands[0].is_sized);
            }
            other => panic!("expected newtype, got {:?}", other.name()),
        }
        assert!(result.boxed_slots.is_empty(), "the `~` decorator already boxed it");
    }

    #[test]
    fn bare_str_gains_a_box() {
        let (schema, result) = broken("models:\n  Identifier: str\n");
        match schema.decl("Identifier").unwrap() {
            Decl::Newtype(d) => {
                assert!(d.operands[0].is_boxed);
                assert!(!d.operands[0].is_sized);
            }
            other => panic!("expected newtype, got {:?}", other.name()),
        }
        assert_eq!(result.boxed_slots.len(), 1);
    }

    #[test]
    fn str_array_element_gains_a_box() {
        let (schema, _) = broken("models:\n  Names: [str]\n");
        match schema.decl("Names").unwrap() {
            Decl::Newtype(d) => {
                let op = &d.operands[0];
                assert!(op.is_array);
                match &op.target {
                    Target::Elem(inner) => {
                        assert!(inner.is_boxed);
                        assert!(!inner.is_sized);
                    }
                    other => panic!("expected element target, got {:?}", other),
                }
            }
            other => panic!("expected newtype, got {:?}", other.name()),
        }
    }

    // ── SCC enumeration ─────────────────────────────────────────────────

    #[test]
    fn scc_groups_mutual_references() {
        let schema = schema_of(concat!(
            "models:\n",
            "  A:\n",
            "    - { WrapB: B }\n",
            "    - { Stop: [] }\n",
            "  B:\n",
            "    - { WrapA: A }\n",
            "    - { Stop: [] }\n",
            "  C: String\n",
        ));
        let graph = build_graph(&schema).graph;
        let sccs = strongly_connected_components(&graph);
        let big = sccs.iter().find(|c| c.len() > 1).expect("one nontrivial SCC");
        // A, B, and both wrapping slots sit in a single component.
        assert_eq!(big.len(), 4);
        let total: usize = sccs.iter().map(|c| c.len()).sum();
        assert_eq!(total, graph.vertex_count(), "components partition the graph");
    }
}
