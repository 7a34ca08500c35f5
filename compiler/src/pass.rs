// pass.rs — Pass descriptor module: metadata, dependency resolution, artifact IDs
//
// Declares the generator's 5 semantic passes (YAML decoding is outside the
// runner), their dependency edges, and the artifacts they produce. Used by
// the pipeline runner to compute minimal pass subsets for each --emit
// target.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each generator pass (YAML decode excluded — handled before
/// the runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    BuildModel,
    BuildGraph,
    BreakCycles,
    InferCasts,
    Codegen,
}

/// Machine-readable artifact identifiers. Each maps to a concrete type in
/// the compilation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Model,     // Schema
    Graph,     // RefGraph
    BoxedRefs, // Vec<SlotId>
    Casts,     // Vec<CastPlan>
    Generated, // GeneratedCode
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a generator pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::BuildModel => PassDescriptor {
            name: "build_model",
            inputs: &[],
            outputs: &[ArtifactId::Model],
            invariants: "declaration, field, and case order match the document",
        },
        PassId::BuildGraph => PassDescriptor {
            name: "build_graph",
            inputs: &[PassId::BuildModel],
            outputs: &[ArtifactId::Graph],
            invariants: "edges alternate type -> slot -> type; array slots absent",
        },
        PassId::BreakCycles => PassDescriptor {
            name: "break_cycles",
            inputs: &[PassId::BuildGraph],
            outputs: &[ArtifactId::BoxedRefs],
            invariants: "every cycle crosses a boxed slot; str leaves boxed",
        },
        PassId::InferCasts => PassDescriptor {
            name: "infer_casts",
            inputs: &[PassId::BreakCycles],
            outputs: &[ArtifactId::Casts],
            invariants: "hops are single-operand sum cases; no self pairs",
        },
        PassId::Codegen => PassDescriptor {
            name: "codegen",
            inputs: &[PassId::InferCasts],
            outputs: &[ArtifactId::Generated],
            invariants: "valid Rust emitted, byte-stable per schema",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All 5 pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 5] = [
    PassId::BuildModel,
    PassId::BuildGraph,
    PassId::BreakCycles,
    PassId::InferCasts,
    PassId::Codegen,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_passes_model_is_minimal() {
        assert_eq!(required_passes(PassId::BuildModel), vec![PassId::BuildModel]);
    }

    #[test]
    fn required_passes_graph_skips_downstream() {
        let passes = required_passes(PassId::BuildGraph);
        assert_eq!(passes, vec![PassId::BuildModel, PassId::BuildGraph]);
        assert!(!passes.contains(&PassId::InferCasts));
    }

    #[test]
    fn required_passes_codegen_includes_all() {
        let passes = required_passes(PassId::Codegen);
        assert_eq!(passes, ALL_PASSES.to_vec());
    }

    #[test]
    fn all_descriptors_have_outputs() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            assert!(
                !desc.outputs.is_empty(),
                "pass {:?} has no outputs declared",
                pass
            );
        }
    }

    #[test]
    fn dependency_edges_are_consistent() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            for dep in desc.inputs {
                let dep_passes = required_passes(*pass);
                let dep_pos = dep_passes.iter().position(|p| p == dep);
                let self_pos = dep_passes.iter().position(|p| p == pass);
                assert!(
                    dep_pos.unwrap() < self_pos.unwrap(),
                    "{:?} depends on {:?} but it comes later in topological order",
                    pass,
                    dep
                );
            }
        }
    }

    #[test]
    fn no_decode_in_pass_id() {
        // YAML decoding is handled outside the runner; PassId has no
        // decode variant.
        for pass in &ALL_PASSES {
            assert_ne!(descriptor(*pass).name, "decode");
        }
    }
}
