// Property-based tests for generator invariants.
//
// Three categories:
// 1. Parse round-trip: generated schema documents keep names, arities, and
//    case order through the shape-directed parser
// 2. Cycle breaking: sizing closure, completeness, and idempotence over
//    arbitrary reference topologies
// 3. Path inference and emission: hop chains are well-formed and the
//    output is deterministic
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use proptest::prelude::*;
use serde_yaml::{Mapping, Value};

use astgen::boxing::{break_cycles, strongly_connected_components};
use astgen::codegen::CodegenOptions;
use astgen::graph::build_graph;
use astgen::model::{Decl, Schema, Target};
use astgen::parse::parse_document;
use astgen::pipeline::compile_to_rust;

// ── Schema generator ────────────────────────────────────────────────────────

const PRIMS: &[&str] = &["u8", "char", "bool", "usize", "String", "str"];

/// A generated type reference: index into type names then primitives,
/// plus decoration flags.
#[derive(Debug, Clone)]
struct RefSpec {
    target: usize,
    boxed: bool,
    optional: bool,
    array: bool,
}

#[derive(Debug, Clone)]
enum ShapePlan {
    /// `None` renders as the empty sequence (unit type).
    Newtype(Option<RefSpec>),
    Record(Vec<RefSpec>),
    /// Cases `C0..Ck`, each with 0 to 2 operands.
    Sum(Vec<Vec<RefSpec>>),
}

fn type_name(i: usize) -> String {
    format!("T{}", i)
}

fn target_name(plans_len: usize, target: usize) -> String {
    if target < plans_len {
        type_name(target)
    } else {
        PRIMS[target - plans_len].to_string()
    }
}

fn arb_ref(n: usize) -> impl Strategy<Value = RefSpec> {
    (0..n + PRIMS.len(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(target, boxed, optional, array)| RefSpec { target, boxed, optional, array },
    )
}

fn arb_shape(n: usize) -> impl Strategy<Value = ShapePlan> {
    prop_oneof![
        proptest::option::of(arb_ref(n)).prop_map(ShapePlan::Newtype),
        prop::collection::vec(arb_ref(n), 1..=3).prop_map(ShapePlan::Record),
        prop::collection::vec(prop::collection::vec(arb_ref(n), 0..=2), 2..=4)
            .prop_map(ShapePlan::Sum),
    ]
}

fn arb_schema() -> impl Strategy<Value = Vec<ShapePlan>> {
    (1usize..6).prop_flat_map(|n| prop::collection::vec(arb_shape(n), n..=n))
}

/// Render the plan as the loosely-typed document the parser consumes.
fn document_of(plans: &[ShapePlan]) -> Value {
    let n = plans.len();
    let ref_value = |r: &RefSpec| -> Value {
        let mut s = String::new();
        if r.boxed {
            s.push('~');
        }
        s.push_str(&target_name(n, r.target));
        if r.optional {
            s.push('?');
        }
        let scalar = Value::String(s);
        if r.array {
            Value::Sequence(vec![scalar])
        } else {
            scalar
        }
    };

    let mut models = Mapping::new();
    for (i, plan) in plans.iter().enumerate() {
        let value = match plan {
            ShapePlan::Newtype(None) => Value::Sequence(Vec::new()),
            ShapePlan::Newtype(Some(r)) => ref_value(r),
            ShapePlan::Record(fields) => {
                let mut map = Mapping::new();
                for (fi, r) in fields.iter().enumerate() {
                    map.insert(Value::String(format!("f{}", fi)), ref_value(r));
                }
                Value::Mapping(map)
            }
            ShapePlan::Sum(cases) => {
                let alts = cases
                    .iter()
                    .enumerate()
                    .map(|(ci, operands)| {
                        let payload = match operands.len() {
                            0 => Value::Sequence(Vec::new()),
                            1 => ref_value(&operands[0]),
                            _ => Value::Sequence(operands.iter().map(ref_value).collect()),
                        };
                        let mut alt = Mapping::new();
                        alt.insert(Value::String(format!("C{}", ci)), payload);
                        Value::Mapping(alt)
                    })
                    .collect();
                Value::Sequence(alts)
            }
        };
        models.insert(Value::String(type_name(i)), value);
    }

    let mut doc = Mapping::new();
    doc.insert(Value::String("models".to_string()), Value::Mapping(models));
    Value::Mapping(doc)
}

fn parse_plan(plans: &[ShapePlan]) -> Schema {
    let doc = document_of(plans);
    let result = parse_document(&doc);
    assert!(
        !astgen::diag::has_errors(&result.diagnostics),
        "generated schema failed to parse: {:#?}",
        result.diagnostics
    );
    result.schema.expect("schema")
}

fn yaml_text(plans: &[ShapePlan]) -> String {
    serde_yaml::to_string(&document_of(plans)).expect("document serializes")
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Names, shapes, arities, and case order survive parsing.
    #[test]
    fn parse_round_trip_skeleton(plans in arb_schema()) {
        let schema = parse_plan(&plans);
        prop_assert_eq!(schema.decls.len(), plans.len());
        for (i, (decl, plan)) in schema.decls.iter().zip(&plans).enumerate() {
            prop_assert_eq!(decl.name(), type_name(i));
            match (decl, plan) {
                (Decl::Newtype(d), ShapePlan::Newtype(None)) => {
                    prop_assert!(d.operands.is_empty());
                }
                (Decl::Newtype(d), ShapePlan::Newtype(Some(r))) => {
                    prop_assert_eq!(d.operands.len(), 1);
                    prop_assert_eq!(d.operands[0].is_array, r.array);
                }
                (Decl::Record(d), ShapePlan::Record(fields)) => {
                    prop_assert_eq!(d.fields.len(), fields.len());
                }
                (Decl::Sum(d), ShapePlan::Sum(cases)) => {
                    prop_assert_eq!(d.cases.len(), cases.len());
                    for (ci, (case, ops)) in d.cases.iter().zip(cases).enumerate() {
                        prop_assert_eq!(case.name.as_str(), format!("C{}", ci));
                        prop_assert_eq!(case.operands.len(), ops.len());
                    }
                }
                (decl, plan) => {
                    prop_assert!(false, "shape mismatch: {:?} vs {:?}", decl.name(), plan);
                }
            }
        }
    }

    /// After cycle breaking, every ref is array-wrapped, boxed, or sized,
    /// and no unsized leaf is left bare.
    #[test]
    fn sizing_closure_holds(plans in arb_schema()) {
        let mut schema = parse_plan(&plans);
        let graph = build_graph(&schema).graph;
        let result = break_cycles(&mut schema, &graph);
        prop_assert!(!astgen::diag::has_errors(&result.diagnostics));

        let mut violations = Vec::new();
        schema.for_each_ref(|slot, r| {
            if !(r.is_array || r.is_boxed || r.is_sized) {
                violations.push((slot, r.clone()));
            }
            if let Target::Name(name) = &r.target {
                if name == "str" && !r.is_boxed {
                    violations.push((slot, r.clone()));
                }
            }
        });
        prop_assert!(violations.is_empty(), "bare unsized refs: {:?}", violations);
    }

    /// Every nontrivial strongly connected component crosses a boxed or
    /// array slot after cycle breaking.
    #[test]
    fn cycle_breaking_is_complete(plans in arb_schema()) {
        let mut schema = parse_plan(&plans);
        let graph = build_graph(&schema).graph;
        break_cycles(&mut schema, &graph);

        for component in strongly_connected_components(&graph) {
            let nontrivial = component.len() > 1
                || component.iter().any(|&v| graph.has_self_loop(v));
            if !nontrivial {
                continue;
            }
            let broken = component.iter().any(|&v| {
                graph
                    .vertex(v)
                    .slot()
                    .map(|slot| {
                        let r = schema.slot(slot);
                        r.is_boxed || r.is_array
                    })
                    .unwrap_or(false)
            });
            prop_assert!(broken, "unbroken component: {:?}", component);
        }
    }

    /// Re-running cycle breaking on its own output changes nothing.
    #[test]
    fn cycle_breaking_is_idempotent(plans in arb_schema()) {
        let mut schema = parse_plan(&plans);
        let graph = build_graph(&schema).graph;
        break_cycles(&mut schema, &graph);
        let settled = schema.clone();

        let graph = build_graph(&schema).graph;
        let second = break_cycles(&mut schema, &graph);
        prop_assert!(second.boxed_slots.is_empty(), "second run boxed: {:?}", second.boxed_slots);
        prop_assert_eq!(schema, settled);
    }

    /// Every inferred path is a chain of single-operand sum cases whose
    /// payloads name the next hop, ending at the destination type.
    #[test]
    fn inferred_paths_are_well_formed_chains(plans in arb_schema()) {
        let mut schema = parse_plan(&plans);
        let graph = build_graph(&schema).graph;
        break_cycles(&mut schema, &graph);
        let cast_plans = astgen::casts::infer_casts(&schema, &graph).plans;

        for plan in &cast_plans {
            prop_assert!(!plan.hops.is_empty());
            prop_assert_ne!(&plan.from, &plan.to);
            prop_assert_eq!(plan.hops[0].sum.as_str(), plan.from.as_str());
            for (i, hop) in plan.hops.iter().enumerate() {
                match schema.decl(&hop.sum) {
                    Some(Decl::Sum(d)) => {
                        let case = d.cases.iter().find(|c| c.name == hop.case);
                        prop_assert!(case.is_some(), "unknown case {:?}", hop);
                        prop_assert_eq!(case.unwrap().operands.len(), 1);
                    }
                    other => prop_assert!(false, "hop through non-sum {:?}: {:?}", other.map(|d| d.name()), hop),
                }
                prop_assert!(!hop.payload.is_array, "array hop: {:?}", hop);
                let next = if i + 1 < plan.hops.len() {
                    plan.hops[i + 1].sum.as_str()
                } else {
                    plan.to.as_str()
                };
                prop_assert_eq!(hop.payload.leaf_name(), Some(next));
            }
        }
    }

    /// The emitted module is a pure function of the schema.
    #[test]
    fn output_is_deterministic(plans in arb_schema()) {
        let source = yaml_text(&plans);
        let options = CodegenOptions::default();
        let first = compile_to_rust(&source, &options).expect("decodes");
        let second = compile_to_rust(&source, &options).expect("decodes");
        prop_assert!(!first.has_error, "{:#?}", first.diagnostics);
        let a = &first.artifacts.generated.as_ref().expect("generated").rust_source;
        let b = &second.artifacts.generated.as_ref().expect("generated").rust_source;
        prop_assert_eq!(a, b);
    }
}
